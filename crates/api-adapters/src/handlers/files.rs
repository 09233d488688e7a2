//! Document listing, download and upload.

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header::{CONNECTION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use domains::{Bucket, DomainError, ReadHandle};
use futures_util::stream;
use serde::Deserialize;
use services::catalog::{human_readable_size, url_encode_path, ALLOWED_EXTENSIONS};
use services::Catalog;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::render;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::views::{UploadPage, UploadResultPage};

/// Read size for streamed downloads.
const DOWNLOAD_CHUNK: usize = 4096;
/// Listing chunks buffered ahead of the socket.
const LISTING_BACKLOG: usize = 8;

const LISTING_HEAD: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>N0D3 F1L35</title>\
<style>body{background:#000;color:#0f0;font-family:monospace;margin:0 auto;max-width:48rem;padding:1rem}\
a{color:#0ff}ul{list-style:none;padding-left:0}.dim{color:#070}</style></head><body>";
const LISTING_TAIL: &str = "<p class=\"dim\"><a href=\"/library\">[M41N M3NU]</a></p></body></html>";

#[derive(Debug, Deserialize)]
pub struct NodeFilesParams {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub section: String,
}

/// Streams the bucket menu, or the files of one bucket, as a chunked body.
/// The header goes out before the medium is touched.
pub async fn node_files(State(state): State<SharedState>, Query(params): Query<NodeFilesParams>) -> Response {
    let (tx, rx) = mpsc::channel::<String>(LISTING_BACKLOG);
    let catalog = Arc::clone(&state.catalog);
    let node = if params.node.is_empty() { state.node_name.clone() } else { params.node };
    let batch = state.yield_batch;

    tokio::spawn(async move {
        let section = params.section.trim();
        let outcome = if section.is_empty() {
            render_bucket_menu(&tx, &node, batch).await
        } else {
            render_bucket(&tx, &catalog, &node, section, batch).await
        };
        if outcome.is_err() {
            tracing::debug!(node = %node, "listing client went away");
        }
    });

    let body = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        Body::from_stream(body),
    )
        .into_response()
}

type Sink = mpsc::Sender<String>;
type Sent = std::result::Result<(), mpsc::error::SendError<String>>;

fn node_query(node: &str) -> String {
    format!("/node-files?node={}", url_encode_path(node))
}

async fn render_bucket_menu(tx: &Sink, node: &str, batch: usize) -> Sent {
    tx.send(format!(
        "{LISTING_HEAD}<h1>[{}]</h1><p>53L3C7 4 53C710N</p><ul>",
        html_escape::encode_text(node)
    ))
    .await?;
    let base = node_query(node);
    for (i, bucket) in Bucket::all().enumerate() {
        tx.send(format!(
            "<li><a href=\"{base}&amp;section={}\">[{}]</a></li>",
            bucket.section(),
            html_escape::encode_text(&bucket.dir_name())
        ))
        .await?;
        if (i + 1) % batch == 0 {
            tokio::task::yield_now().await;
        }
    }
    tx.send(format!("</ul>{LISTING_TAIL}")).await
}

async fn render_bucket(tx: &Sink, catalog: &Catalog, node: &str, section: &str, batch: usize) -> Sent {
    let back = format!("<p><a href=\"{}\">&lt; B4CK 70 53C710N5</a></p>", node_query(node));
    let Some(bucket) = Bucket::parse(section) else {
        tx.send(format!(
            "{LISTING_HEAD}<h1>[{}]</h1><ul><li>[D1R3C70RY N07 F0UND]</li></ul>{back}{LISTING_TAIL}",
            html_escape::encode_text(section)
        ))
        .await?;
        return Ok(());
    };
    tx.send(format!(
        "{LISTING_HEAD}<h1>[{} / {}]</h1><ul>",
        html_escape::encode_text(node),
        html_escape::encode_text(&bucket.dir_name())
    ))
    .await?;

    let total = match catalog.count_bucket(bucket, batch).await {
        Ok(total) => total,
        Err(e) => {
            tracing::info!(bucket = %bucket, error = %e, "bucket directory unavailable");
            return tx.send(format!("<li>[D1R3C70RY N07 F0UND]</li></ul>{back}{LISTING_TAIL}")).await;
        }
    };
    if total == 0 {
        return tx.send(format!("<li>[N0 F1L35 F0UND]</li></ul>{back}{LISTING_TAIL}")).await;
    }

    let mut cursor = match catalog.open_bucket(bucket).await {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!(bucket = %bucket, error = %e, "bucket vanished between passes");
            return tx.send(format!("<li>[D1R3C70RY N07 F0UND]</li></ul>{back}{LISTING_TAIL}")).await;
        }
    };
    let mut listed = 0usize;
    loop {
        let doc = match cursor.next_document().await {
            Ok(Some(doc)) => doc,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(bucket = %bucket, error = %e, "listing interrupted");
                break;
            }
        };
        listed += 1;
        tx.send(format!(
            "<li><a href=\"/download?file={}\">{}</a> <span class=\"dim\">{}</span></li>",
            url_encode_path(&doc.relative_path()),
            html_escape::encode_text(&doc.name),
            human_readable_size(doc.size)
        ))
        .await?;
        if listed % batch == 0 {
            tokio::task::yield_now().await;
        }
    }
    tx.send(format!("</ul><p class=\"dim\">[{listed} F1L35]</p>{back}{LISTING_TAIL}")).await
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub file: Option<String>,
}

pub async fn download(
    State(state): State<SharedState>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    let requested = params.file.filter(|f| !f.is_empty());
    let Some(requested) = requested else {
        return Err(ApiError::BadRequest("Missing file parameter".to_string()));
    };

    let download = state.catalog.open_download(&requested).await?;
    let disposition = format!("attachment; filename=\"{}\"", download.file_name.replace(['"', '\\'], "_"));
    let disposition = HeaderValue::from_bytes(disposition.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(download.content_type)),
        (CONTENT_DISPOSITION, disposition),
        (CONTENT_LENGTH, HeaderValue::from(download.size)),
        (CONNECTION, HeaderValue::from_static("close")),
    ];
    Ok((headers, Body::from_stream(read_stream(download.reader))).into_response())
}

fn read_stream(
    reader: Box<dyn ReadHandle>,
) -> impl futures_util::Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send {
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        match reader.read_chunk(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => {
                tracing::error!(error = %e, "download interrupted");
                Some((Err(std::io::Error::other(e)), None))
            }
        }
    })
}

pub async fn upload_page() -> ApiResult<Html<String>> {
    render(UploadPage { allowed: ALLOWED_EXTENSIONS.join(", ") })
}

/// Receives the first multipart field that carries a file name. The
/// transfer is aborted (partial file deleted) when the body breaks off.
pub async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> ApiResult<Response> {
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::BadRequest("No file uploaded".to_string())),
            Err(e) => return Err(ApiError::BadRequest(format!("Malformed upload: {e}"))),
        };
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let mut session = state.uploader.start(&file_name).await?;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = session.write(&chunk).await {
                        session.abort().await;
                        return Err(e.into());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "upload stream broke off");
                    session.abort().await;
                    return Err(ApiError::BadRequest(format!("Upload aborted: {e}")));
                }
            }
        }

        return match session.finish().await {
            Ok(receipt) => {
                let page = render(UploadResultPage {
                    success: true,
                    file_name: &receipt.file_name,
                    size: human_readable_size(receipt.size),
                    message: String::new(),
                })?;
                Ok(page.into_response())
            }
            Err(DomainError::Verification { reason, .. }) => {
                let page = render(UploadResultPage {
                    success: false,
                    file_name: &file_name,
                    size: String::new(),
                    message: format!("verification failed: {reason}"),
                })?;
                Ok((StatusCode::INTERNAL_SERVER_ERROR, page).into_response())
            }
            Err(e) => Err(e.into()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn bucket_menu_yields_between_batches() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(64);
        render_bucket_menu(&tx, "Alexandria", 1).await.unwrap();
        let seen = ticks.load(Ordering::SeqCst);
        ticker.abort();
        assert!(seen > 0, "the other task never ran during the listing");

        drop(tx);
        let mut chunks = 0;
        while rx.recv().await.is_some() {
            chunks += 1;
        }
        assert_eq!(chunks, 30);
    }
}
