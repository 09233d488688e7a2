//! Forum pages and form submissions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use domains::DomainError;
use serde::Deserialize;
use services::forum::is_valid_thread_id;

use super::render;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::views::{countdown, ForumIndexPage, MessagePage, NewThreadPage, PostRow, PostsFragment, ThreadPage, ThreadRow};

pub async fn index(State(state): State<SharedState>) -> ApiResult<Html<String>> {
    let now = state.clock.unix_millis();
    let threads = state.forum.list_threads().await;
    render(ForumIndexPage {
        threads: threads.into_iter().map(|t| ThreadRow::new(t, now)).collect(),
        countdown: countdown(state.janitor.remaining_millis()),
    })
}

pub async fn new_thread_form() -> ApiResult<Html<String>> {
    render(NewThreadPage)
}

#[derive(Debug, Deserialize)]
pub struct NewThreadForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
}

/// Failures come back as a small page that refreshes to the forum index.
pub async fn create_thread(State(state): State<SharedState>, Form(form): Form<NewThreadForm>) -> ApiResult<Response> {
    match state.forum.create_thread(&form.title, &form.author, &form.content).await {
        Ok(thread) => Ok(Redirect::to(&format!("/forum/thread?id={}", thread.id)).into_response()),
        Err(DomainError::Validation(reason)) => {
            tracing::debug!(%reason, "thread rejected");
            let page = render(MessagePage {
                title: "M1551NG F13LD5",
                message: "A thread needs a title, a name and a message.",
                refresh_to: "/forum",
            })?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to create thread");
            let page = render(MessagePage {
                title: "5T0R4G3 3RR0R",
                message: "The thread could not be saved.",
                refresh_to: "/forum",
            })?;
            Ok((StatusCode::INTERNAL_SERVER_ERROR, page).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThreadParams {
    pub id: Option<String>,
    pub scroll: Option<String>,
    pub ajax: Option<String>,
}

impl ThreadParams {
    fn thread_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| is_valid_thread_id(id))
    }
}

pub async fn thread(State(state): State<SharedState>, Query(params): Query<ThreadParams>) -> ApiResult<Response> {
    let Some(id) = params.thread_id() else {
        return Ok(Redirect::to("/forum").into_response());
    };
    let now = state.clock.unix_millis();
    let title = state.forum.thread_title(id).await;
    let posts = state.forum.list_posts(id).await;
    let page = render(ThreadPage {
        thread_id: id,
        title: &title,
        posts: posts.into_iter().map(|p| PostRow::new(p, now)).collect(),
        scroll: params.scroll.as_deref() == Some("true"),
    })?;
    Ok(page.into_response())
}

/// `ajax=true` answers with the post list only, for in-page refresh.
pub async fn thread_fragment(
    State(state): State<SharedState>,
    Query(params): Query<ThreadParams>,
) -> ApiResult<Response> {
    if params.ajax.as_deref() != Some("true") {
        return thread(State(state), Query(params)).await;
    }
    let Some(id) = params.thread_id() else {
        return Ok(Redirect::to("/forum").into_response());
    };
    let now = state.clock.unix_millis();
    let posts = state.forum.list_posts(id).await;
    let page = render(PostsFragment { posts: posts.into_iter().map(|p| PostRow::new(p, now)).collect() })?;
    Ok(page.into_response())
}

#[derive(Debug, Deserialize)]
pub struct NewPostForm {
    #[serde(rename = "threadId", default)]
    pub thread_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
}

pub async fn add_post(State(state): State<SharedState>, Form(form): Form<NewPostForm>) -> ApiResult<Redirect> {
    if form.thread_id.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing thread id".to_string()));
    }
    let post = state.forum.add_post(&form.thread_id, &form.author, &form.content).await?;
    tracing::debug!(thread_id = %form.thread_id, post_id = %post.id, "reply stored");
    Ok(Redirect::to(&format!("/forum/thread?id={}&scroll=true#bottom", form.thread_id)))
}

pub async fn post_via_get() -> Redirect {
    Redirect::to("/forum")
}
