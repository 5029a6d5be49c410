//! Per-file async locking.

use std::sync::Arc;

use cirrus_core::FileId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A mutex keyed by file id.
///
/// Work on one file is serialized while different files proceed independently.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedMutex {
    locks: Arc<DashMap<FileId, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    /// Acquires the lock for `id`. Released when the guard is dropped.
    pub async fn lock(&self, id: FileId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Drops the lock of `id` unless a task still holds or awaits it.
    pub fn remove(&self, id: FileId) {
        self.locks
            .remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Drops every lock no task holds or awaits.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_file_is_serialized() {
        let locks = KeyedMutex::default();
        let guard = locks.lock(FileId::new(1)).await;

        let other = locks.clone();
        let pending = tokio::spawn(async move {
            let _guard = other.lock(FileId::new(1)).await;
        });

        // A different file is not blocked.
        let unrelated = locks.lock(FileId::new(2)).await;

        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(guard);
        pending.await.unwrap();

        locks.cleanup();
        assert_eq!(locks.len(), 1);

        locks.remove(FileId::new(2));
        assert_eq!(locks.len(), 1);
        drop(unrelated);
        locks.remove(FileId::new(2));
        assert_eq!(locks.len(), 0);
    }
}
