// Published dataset shared by the menu handlers.
//
// A refresh takes a token before it starts fetching and hands it back with
// the finished snapshot. Only a token newer than the one already published
// is accepted, so a slow fetch that started earlier cannot replace newer data.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::loader::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshToken(u64);

#[derive(Default)]
struct Published {
    token: u64,
    snapshot: Option<Arc<Snapshot>>,
}

#[derive(Default)]
pub struct SnapshotStore {
    issued: AtomicU64,
    published: Mutex<Published>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&self) -> RefreshToken {
        RefreshToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns `false` (and keeps the current snapshot) when `token` is not
    /// newer than the published one.
    pub fn publish(&self, token: RefreshToken, snapshot: Snapshot) -> bool {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if token.0 <= published.token {
            warn!(token = token.0, current = published.token, "stale refresh discarded");
            return false;
        }
        debug!(token = token.0, records = snapshot.records.len(), "snapshot published");
        published.token = token.0;
        published.snapshot = Some(Arc::new(snapshot));
        true
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }
}
