//! Route handlers, grouped by the surface they serve.

pub mod files;
pub mod forum;
pub mod portal;

use askama::Template;
use axum::response::Html;

use crate::error::ApiResult;

pub(crate) fn render<T: Template>(page: T) -> ApiResult<Html<String>> {
    Ok(Html(page.render()?))
}
