//! Periodic destructive reset of the forum.

use domains::{Clock, Storage, StorageError, StorageResult};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{WriteGate, CLEANUP_LOG, FORUM_DIR, INDEX_PATH, POSTS_DIR};
use crate::storage::{join, remove_tree, EMPTY_INDEX};

/// Interval trigger over a wrapping monotonic millisecond counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSchedule {
    pub last: u64,
    pub interval: u64,
}

impl CleanupSchedule {
    pub fn new(now: u64, interval: Duration) -> Self {
        let interval = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self { last: now, interval }
    }

    /// A reading below `last` means the counter wrapped; that counts as due.
    pub fn is_due(&self, now: u64) -> bool {
        now < self.last || now - self.last >= self.interval
    }

    /// Milliseconds until the next run, zero when already due.
    pub fn remaining(&self, now: u64) -> u64 {
        if self.is_due(now) {
            0
        } else {
            self.interval - (now - self.last)
        }
    }

    pub fn mark(&mut self, now: u64) {
        self.last = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted from the forum tree, not counting the log.
    pub removed_files: usize,
    pub cleaned_at: u64,
}

/// Built with [`super::ForumStore::janitor`].
pub struct ForumJanitor {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    gate: WriteGate,
    schedule: Mutex<CleanupSchedule>,
    storage_ready: bool,
}

impl ForumJanitor {
    pub(super) fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        gate: WriteGate,
        interval: Duration,
        storage_ready: bool,
    ) -> Self {
        let schedule = CleanupSchedule::new(clock.monotonic_millis(), interval);
        Self { storage, clock, gate, schedule: Mutex::new(schedule), storage_ready }
    }

    fn schedule(&self) -> MutexGuard<'_, CleanupSchedule> {
        self.schedule.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn remaining_millis(&self) -> u64 {
        self.schedule().remaining(self.clock.monotonic_millis())
    }

    /// Runs a cleanup when the interval has elapsed. The schedule advances
    /// even when the run is skipped or fails, so a broken card is retried
    /// once per interval rather than once per tick.
    pub async fn tick(&self) -> Option<CleanupReport> {
        let now = self.clock.monotonic_millis();
        {
            let mut schedule = self.schedule();
            if !schedule.is_due(now) {
                return None;
            }
            schedule.mark(now);
        }

        if !self.storage_ready {
            tracing::warn!("skipping forum cleanup: storage unavailable");
            return None;
        }
        match self.cleanup().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "forum cleanup failed");
                None
            }
        }
    }

    /// Wipes threads and posts, keeping only the cleanup log, and appends
    /// one line to that log.
    pub async fn cleanup(&self) -> StorageResult<CleanupReport> {
        let _writer = self.gate.lock().await;
        tracing::info!("starting forum cleanup");

        let mut entries = Vec::new();
        match self.storage.list(FORUM_DIR).await {
            Ok(mut cursor) => {
                while let Some(entry) = cursor.next_entry().await? {
                    entries.push(entry);
                }
            }
            Err(StorageError::NotFound(_)) => self.storage.mkdir(FORUM_DIR).await?,
            Err(e) => return Err(e),
        }

        let log_name = CLEANUP_LOG.rsplit('/').next().unwrap_or_default();
        let mut removed_files = 0;
        for entry in entries.into_iter().filter(|e| e.name != log_name) {
            let path = join(FORUM_DIR, &entry.name);
            if entry.is_dir {
                removed_files += remove_tree(self.storage.as_ref(), &path).await?;
            } else {
                self.storage.remove(&path).await?;
                removed_files += 1;
            }
        }

        self.storage.mkdir(POSTS_DIR).await?;
        self.storage.write_all(INDEX_PATH, EMPTY_INDEX).await?;

        let cleaned_at = self.clock.unix_millis();
        self.storage
            .append(CLEANUP_LOG, format!("Forum cleaned at: {cleaned_at}\n").as_bytes())
            .await?;

        tracing::info!(removed_files, cleaned_at, "forum cleanup complete");
        Ok(CleanupReport { removed_files, cleaned_at })
    }
}
