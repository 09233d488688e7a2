//! Landing, terminal and static pages.

use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::render;
use crate::error::ApiResult;
use crate::middleware::NO_CACHE;
use crate::state::SharedState;
use crate::views::{DisclaimerPage, LandingPage, LibraryPage, NodeListPage};

/// Served for `/`, connectivity probes and every unmatched path. Never cached.
pub async fn landing(State(state): State<SharedState>) -> ApiResult<Response> {
    let page = render(LandingPage { node_name: &state.node_name })?;
    Ok(([(CACHE_CONTROL, NO_CACHE)], page).into_response())
}

pub async fn library(State(state): State<SharedState>) -> ApiResult<Html<String>> {
    render(LibraryPage {
        node_name: &state.node_name,
        device_ip: state.portal.device_ip().to_string(),
        storage_ready: state.storage_ready,
        indicator_on: state.indicator_on(),
    })
}

pub async fn node_list(State(state): State<SharedState>) -> ApiResult<Html<String>> {
    render(NodeListPage {
        node_name: &state.node_name,
        node_link: format!("/node-files?node={}", services::catalog::url_encode_path(&state.node_name)),
    })
}

pub async fn disclaimer() -> ApiResult<Html<String>> {
    render(DisclaimerPage)
}

pub async fn toggle(State(state): State<SharedState>) -> Redirect {
    let on = state.toggle_indicator();
    tracing::info!(on, "status indicator toggled");
    Redirect::to("/")
}
