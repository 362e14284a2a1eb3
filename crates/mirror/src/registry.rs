//! Registry of running transfers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::ActiveTransfer;

struct Entry {
    filename: String,
    started_at: Instant,
    cancel: CancellationToken,
}

/// Running transfers keyed by id.
///
/// The lock is never held across an await.
#[derive(Default)]
pub struct TransferRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, id: Uuid, filename: String, cancel: CancellationToken) {
        self.lock().insert(
            id,
            Entry {
                filename,
                started_at: Instant::now(),
                cancel,
            },
        );
    }

    /// Removes `id`; returns `false` if it was not registered.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Cancels `id`; returns `false` if it is not running.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.lock().get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running transfer and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let entries = self.lock();
        for entry in entries.values() {
            entry.cancel.cancel();
        }
        entries.len()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.lock().contains_key(id)
    }

    pub fn list(&self) -> Vec<ActiveTransfer> {
        let mut active: Vec<ActiveTransfer> = self
            .lock()
            .iter()
            .map(|(id, entry)| ActiveTransfer {
                id: *id,
                filename: entry.filename.clone(),
                started_at: entry.started_at,
            })
            .collect();
        active.sort_by_key(|t| t.started_at);
        active
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Removes its transfer from the registry when dropped.
///
/// Held by the transfer task, so removal happens once on every exit path.
pub(crate) struct RegistryGuard {
    registry: Arc<TransferRegistry>,
    id: Uuid,
}

impl RegistryGuard {
    pub(crate) fn new(registry: Arc<TransferRegistry>, id: Uuid) -> Self {
        Self { registry, id }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_list_remove() {
        let registry = TransferRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, "a.iso".into(), CancellationToken::new());

        let active = registry.list();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].filename, "a.iso");

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_known_and_unknown() {
        let registry = TransferRegistry::new();
        let token = CancellationToken::new();
        let id = Uuid::new_v4();
        registry.insert(id, "b".into(), token.clone());

        assert!(!registry.cancel(&Uuid::new_v4()));
        assert!(!token.is_cancelled());

        assert!(registry.cancel(&id));
        assert!(token.is_cancelled());
        // Cancelling does not unregister; the task does.
        assert!(registry.contains(&id));
    }

    #[test]
    fn cancel_all_hits_every_entry() {
        let registry = TransferRegistry::new();
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        for (i, token) in tokens.iter().enumerate() {
            registry.insert(Uuid::new_v4(), format!("f{i}"), token.clone());
        }

        assert_eq!(registry.cancel_all(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }

    #[test]
    fn guard_removes_once() {
        let registry = Arc::new(TransferRegistry::new());
        let id = Uuid::new_v4();
        registry.insert(id, "c".into(), CancellationToken::new());

        let guard = RegistryGuard::new(registry.clone(), id);
        assert_eq!(registry.len(), 1);
        drop(guard);
        assert!(registry.is_empty());
    }
}
