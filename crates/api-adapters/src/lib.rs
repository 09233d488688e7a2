//! # api-adapters
//!
//! The HTTP surface of the library node: the axum router, the captive-portal
//! and storage gates, the handlers and their askama pages.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod views;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, SharedState};

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use handlers::{files, forum, portal};

/// Builds the complete route table. Every request passes the captive-portal
/// filter first; unmatched paths get the landing page.
pub fn router(state: SharedState) -> Router {
    let transfers = Router::new()
        .route("/download", get(files::download))
        .route(
            "/upload",
            post(files::upload).layer(DefaultBodyLimit::max(state.upload_limit)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_storage));

    let browsing = Router::new()
        .route("/node-files", get(files::node_files))
        .route("/forum", get(forum::index))
        .route("/forum/new", get(forum::new_thread_form).post(forum::create_thread))
        .route("/forum/thread", get(forum::thread))
        .route("/thread", get(forum::thread_fragment))
        .route("/forum/post", post(forum::add_post).get(forum::post_via_get))
        .route_layer(from_fn_with_state(state.clone(), middleware::storage_or_library));

    Router::new()
        .route("/", get(portal::landing))
        .route("/library", get(portal::library))
        .route("/list", get(portal::node_list))
        .route("/disclaimer", get(portal::disclaimer))
        .route("/toggle", get(portal::toggle))
        .route("/uploadpage", get(files::upload_page))
        .merge(transfers)
        .merge(browsing)
        .fallback(portal::landing)
        .layer(from_fn_with_state(state.clone(), middleware::captive_portal))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use configs::Settings;
    use services::{LogIndicator, SystemClock};
    use std::sync::Arc;
    use storage_adapters::MemoryStorage;
    use tower::ServiceExt;

    fn app(storage_ready: bool) -> Router {
        let state = AppState::new(
            &Settings::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(SystemClock::new()),
            Arc::new(LogIndicator),
            storage_ready,
        );
        router(state)
    }

    fn get(uri: &str, host: &str) -> Request<Body> {
        Request::builder().uri(uri).header(header::HOST, host).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn foreign_hosts_are_sent_to_the_device() {
        let res = app(true).oneshot(get("/generate_204", "connectivitycheck.gstatic.com")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "http://192.168.4.1/");
    }

    #[tokio::test]
    async fn unavailable_storage_is_gated_per_surface() {
        let res = app(false).oneshot(get("/download?file=B/Bob.pdf", "192.168.4.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = app(false).oneshot(get("/forum", "192.168.4.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/library");

        let res = app(false).oneshot(get("/library", "192.168.4.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
