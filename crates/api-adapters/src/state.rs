//! Process-wide state shared by every handler.

use configs::Settings;
use domains::{Clock, StatusIndicator, Storage};
use services::{CaptivePortal, Catalog, ForumJanitor, ForumStore, Uploader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub forum: ForumStore,
    pub janitor: Arc<ForumJanitor>,
    pub uploader: Uploader,
    pub portal: CaptivePortal,
    pub clock: Arc<dyn Clock>,
    /// Result of the startup layout check; fixed for the life of the process.
    pub storage_ready: bool,
    pub node_name: String,
    pub yield_batch: usize,
    pub upload_limit: usize,
    indicator: Arc<dyn StatusIndicator>,
    indicator_on: AtomicBool,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        indicator: Arc<dyn StatusIndicator>,
        storage_ready: bool,
    ) -> SharedState {
        let catalog = Arc::new(Catalog::new(Arc::clone(&storage), settings.storage.collection_root()));
        let forum = ForumStore::new(storage, Arc::clone(&clock));
        let janitor = forum.janitor(Duration::from_secs(settings.forum.cleanup_interval_secs), storage_ready);
        Arc::new(Self {
            forum,
            janitor: Arc::new(janitor),
            uploader: Uploader::new(Arc::clone(&catalog)),
            catalog,
            portal: CaptivePortal::new(settings.server.device_ip),
            clock,
            storage_ready,
            node_name: settings.server.node_name.clone(),
            yield_batch: settings.listing.yield_batch.max(1),
            upload_limit: settings.upload.max_bytes,
            indicator,
            indicator_on: AtomicBool::new(false),
        })
    }

    pub fn indicator_on(&self) -> bool {
        self.indicator_on.load(Ordering::Relaxed)
    }

    /// Flips the status indicator and returns the new state.
    pub fn toggle_indicator(&self) -> bool {
        let on = !self.indicator_on.fetch_xor(true, Ordering::Relaxed);
        self.indicator.set(on);
        on
    }
}
