//! Request filters applied ahead of the route table.

use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, HOST, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use services::PortalDecision;

use crate::handlers::portal;
use crate::state::SharedState;

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Captive-portal classification for every request: foreign hosts are
/// bounced to the device, probes get the landing page.
pub async fn captive_portal(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let host = req.headers().get(HOST).and_then(|h| h.to_str().ok());
    let path = req.uri().path();

    match state.portal.classify(host, path) {
        PortalDecision::Redirect(location) => {
            tracing::debug!(host, path, %location, "redirecting to portal");
            let location = HeaderValue::from_str(&location).unwrap_or_else(|_| HeaderValue::from_static("/"));
            (
                StatusCode::FOUND,
                [(LOCATION, location), (CACHE_CONTROL, HeaderValue::from_static(NO_CACHE))],
            )
                .into_response()
        }
        PortalDecision::Landing => portal::landing(State(state)).await.into_response(),
        PortalDecision::Route => next.run(req).await,
    }
}

/// Transfer endpoints fail outright when the medium did not come up.
pub async fn require_storage(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    if state.storage_ready {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "storage unavailable");
    (StatusCode::INTERNAL_SERVER_ERROR, "Storage not available").into_response()
}

/// Browsing pages send the visitor to the terminal page, which shows the
/// storage state.
pub async fn storage_or_library(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    if state.storage_ready {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "storage unavailable; redirecting to library");
    Redirect::to("/library").into_response()
}
