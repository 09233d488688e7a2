//! Askama page templates. Markup lives in `templates/`.

use askama::Template;
use domains::{ForumPost, ForumThread};
use services::forum::format_age;

#[derive(Template)]
#[template(path = "landing.html")]
pub struct LandingPage<'a> {
    pub node_name: &'a str,
}

#[derive(Template)]
#[template(path = "library.html")]
pub struct LibraryPage<'a> {
    pub node_name: &'a str,
    pub device_ip: String,
    pub storage_ready: bool,
    pub indicator_on: bool,
}

#[derive(Template)]
#[template(path = "node_list.html")]
pub struct NodeListPage<'a> {
    pub node_name: &'a str,
    pub node_link: String,
}

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadPage {
    pub allowed: String,
}

#[derive(Template)]
#[template(path = "upload_result.html")]
pub struct UploadResultPage<'a> {
    pub success: bool,
    pub file_name: &'a str,
    pub size: String,
    pub message: String,
}

#[derive(Template)]
#[template(path = "disclaimer.html")]
pub struct DisclaimerPage;

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessagePage<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub refresh_to: &'a str,
}

pub struct ThreadRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub age: String,
}

impl ThreadRow {
    pub fn new(thread: ForumThread, now: u64) -> Self {
        Self {
            age: format_age(now, thread.timestamp),
            id: thread.id,
            title: thread.title,
            author: thread.author,
        }
    }
}

pub struct PostRow {
    pub author: String,
    pub content: String,
    pub age: String,
}

impl PostRow {
    pub fn new(post: ForumPost, now: u64) -> Self {
        Self { age: format_age(now, post.timestamp), author: post.author, content: post.content }
    }
}

#[derive(Template)]
#[template(path = "forum_index.html")]
pub struct ForumIndexPage {
    pub threads: Vec<ThreadRow>,
    pub countdown: String,
}

#[derive(Template)]
#[template(path = "forum_new.html")]
pub struct NewThreadPage;

#[derive(Template)]
#[template(path = "forum_thread.html")]
pub struct ThreadPage<'a> {
    pub thread_id: &'a str,
    pub title: &'a str,
    pub posts: Vec<PostRow>,
    pub scroll: bool,
}

#[derive(Template)]
#[template(path = "posts.html")]
pub struct PostsFragment {
    pub posts: Vec<PostRow>,
}

/// `HH:MM:SS` countdown for the forum reset banner.
pub fn countdown(remaining_millis: u64) -> String {
    let secs = remaining_millis / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
