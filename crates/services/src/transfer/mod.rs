//! # Transfer Pipeline
//!
//! Streaming upload with staged write and verification, and streaming
//! download with content-type negotiation. The chunked listing renderer
//! lives with the HTTP layer and drives [`crate::catalog::BucketCursor`].

pub mod download;
pub mod upload;
