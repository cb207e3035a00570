use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::library::PlaylistId;

/// One mutex per playlist, created on first use.
#[derive(Debug, Default)]
pub(super) struct PlaylistLocks {
    inner: Mutex<HashMap<PlaylistId, Arc<Mutex<()>>>>,
}

impl PlaylistLocks {
    pub(super) fn lock_for(&self, id: &PlaylistId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(id.clone()).or_default())
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop the entry for a deleted playlist.
    pub(super) fn forget(&self, id: &PlaylistId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}
