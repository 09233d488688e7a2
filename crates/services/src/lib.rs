//! roaming-library/crates/services/src/lib.rs
//!
//! Application logic over the `domains` ports: the document catalog, the
//! captive-portal classifier, the transfer pipeline and the forum store.
//! Everything here talks to the medium through `Arc<dyn Storage>` only.

pub mod catalog;
pub mod forum;
pub mod portal;
pub mod storage;
pub mod system;
pub mod transfer;

pub use catalog::Catalog;
pub use forum::cleanup::{CleanupReport, CleanupSchedule, ForumJanitor};
pub use forum::ForumStore;
pub use portal::{CaptivePortal, PortalDecision};
pub use system::{LogIndicator, SystemClock};
pub use transfer::download::Download;
pub use transfer::upload::{UploadReceipt, UploadSession, Uploader};
