mod common;

use axum::http::StatusCode;
use common::{form, node};

#[tokio::test]
async fn new_threads_redirect_to_their_page() {
    let node = node().await;
    let reply = node.send(form("/forum/new", "title=Hello+there&author=Ann&content=First+post")).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let location = reply.location().to_string();
    assert!(location.starts_with("/forum/thread?id="));

    let page = node.get(&location).await.text();
    assert!(page.contains("Hello there"));
    assert!(page.contains("First post"));

    let index = node.get("/forum").await.text();
    assert!(index.contains("Hello there"));
    assert!(index.contains("by Ann"));
    assert!(index.contains("reset in"));
}

#[tokio::test]
async fn incomplete_threads_get_a_refreshing_error_page() {
    let node = node().await;
    let reply = node.send(form("/forum/new", "title=&author=Ann&content=text")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.text().contains("http-equiv=\"refresh\""));
    assert!(node.state.forum.list_threads().await.is_empty());
}

#[tokio::test]
async fn replies_are_appended_in_order() {
    let node = node().await;
    let thread = node.state.forum.create_thread("Topic", "Ann", "opening").await.unwrap();

    for reply in ["one", "two", "three"] {
        let res = node
            .send(form("/forum/post", &format!("threadId={}&author=Bo&content={reply}", thread.id)))
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), format!("/forum/thread?id={}&scroll=true#bottom", thread.id));
    }

    let fragment = node.get(&format!("/thread?id={}&ajax=true", thread.id)).await.text();
    assert!(!fragment.contains("<html"));
    let positions: Vec<usize> = ["opening", "one", "two", "three"]
        .iter()
        .map(|needle| fragment.find(needle).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let full = node.get(&format!("/thread?id={}", thread.id)).await.text();
    assert!(full.contains("<html"));
}

#[tokio::test]
async fn reply_failures_are_plain_statuses() {
    let node = node().await;
    let thread = node.state.forum.create_thread("Topic", "Ann", "opening").await.unwrap();

    let missing = node.send(form("/forum/post", "threadId=999&author=Bo&content=hi")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let blank = node.send(form("/forum/post", &format!("threadId={}&author=Bo&content=", thread.id))).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let traversal = node.send(form("/forum/post", "threadId=..%2Fthreads&author=Bo&content=hi")).await;
    assert_eq!(traversal.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stray_gets_go_back_to_the_index() {
    let node = node().await;
    let reply = node.get("/forum/post").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/forum");

    let reply = node.get("/forum/thread").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/forum");
}

#[tokio::test]
async fn unknown_threads_render_with_a_placeholder_title() {
    let node = node().await;
    let page = node.get("/forum/thread?id=12345").await.text();
    assert!(page.contains("Unknown Thread"));
}

#[tokio::test]
async fn cleanup_empties_the_forum() {
    let node = node().await;
    node.send(form("/forum/new", "title=Doomed&author=Ann&content=bye")).await;
    assert!(node.get("/forum").await.text().contains("Doomed"));

    node.state.janitor.cleanup().await.unwrap();
    let index = node.get("/forum").await.text();
    assert!(!index.contains("Doomed"));
    assert!(index.contains("No threads yet"));
}
