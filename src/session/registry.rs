//! Active-session registry.
//!
//! The only process-wide mutable state in the core: a per-target map of the
//! sessions currently alive. It is an explicit object rather than ambient
//! global state, so multiple registries (e.g. in tests) can coexist. All
//! mutation goes through the session manager's transition functions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ZoomcastError, ZoomcastResult};

struct RegistryInner<T> {
    /// target key -> session id (enforces one active session per target).
    by_target: HashMap<String, String>,
    /// session id -> (target key, entry).
    by_id: HashMap<String, (String, Arc<T>)>,
}

/// Per-target registry of live sessions.
pub struct SessionRegistry<T> {
    inner: RwLock<RegistryInner<T>>,
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_target: HashMap::new(),
                by_id: HashMap::new(),
            }),
        }
    }

    /// Register a session for a target. Fails with `AlreadyActive` when the
    /// target already has a live session; the check and insert are one
    /// atomic step under the registry lock.
    pub fn register(
        &self,
        target_key: &str,
        session_id: &str,
        entry: Arc<T>,
    ) -> ZoomcastResult<()> {
        let mut inner = self.inner.write();
        if inner.by_target.contains_key(target_key) {
            return Err(ZoomcastError::AlreadyActive {
                target: target_key.to_string(),
            });
        }
        inner
            .by_target
            .insert(target_key.to_string(), session_id.to_string());
        inner
            .by_id
            .insert(session_id.to_string(), (target_key.to_string(), entry));
        Ok(())
    }

    /// Look up a live session by id.
    pub fn get(&self, session_id: &str) -> Option<Arc<T>> {
        self.inner
            .read()
            .by_id
            .get(session_id)
            .map(|(_, entry)| Arc::clone(entry))
    }

    /// Look up the live session for a capture target.
    pub fn get_by_target(&self, target_key: &str) -> Option<Arc<T>> {
        let inner = self.inner.read();
        let session_id = inner.by_target.get(target_key)?;
        inner
            .by_id
            .get(session_id)
            .map(|(_, entry)| Arc::clone(entry))
    }

    /// Remove a session (terminal states leave the registry). Returns the
    /// entry if it was present.
    pub fn remove(&self, session_id: &str) -> Option<Arc<T>> {
        let mut inner = self.inner.write();
        let (target_key, entry) = inner.by_id.remove(session_id)?;
        inner.by_target.remove(&target_key);
        Some(entry)
    }

    /// All live sessions, in unspecified order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner
            .read()
            .by_id
            .values()
            .map(|(_, entry)| Arc::clone(entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry: SessionRegistry<String> = SessionRegistry::new();
        registry
            .register("tab:1", "rec_a", Arc::new("a".to_string()))
            .unwrap();

        assert_eq!(registry.get("rec_a").as_deref(), Some(&"a".to_string()));
        assert_eq!(
            registry.get_by_target("tab:1").as_deref(),
            Some(&"a".to_string())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let registry: SessionRegistry<String> = SessionRegistry::new();
        registry
            .register("tab:1", "rec_a", Arc::new("a".to_string()))
            .unwrap();

        let err = registry
            .register("tab:1", "rec_b", Arc::new("b".to_string()))
            .unwrap_err();
        assert!(matches!(err, ZoomcastError::AlreadyActive { .. }));

        // A different target is fine.
        registry
            .register("tab:2", "rec_b", Arc::new("b".to_string()))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_frees_the_target() {
        let registry: SessionRegistry<String> = SessionRegistry::new();
        registry
            .register("tab:1", "rec_a", Arc::new("a".to_string()))
            .unwrap();

        assert!(registry.remove("rec_a").is_some());
        assert!(registry.remove("rec_a").is_none());
        assert!(registry.get("rec_a").is_none());
        assert!(registry.get_by_target("tab:1").is_none());

        // The target is reusable after removal.
        registry
            .register("tab:1", "rec_b", Arc::new("b".to_string()))
            .unwrap();
    }

    #[test]
    fn test_snapshot() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        registry.register("tab:1", "rec_a", Arc::new(1)).unwrap();
        registry.register("tab:2", "rec_b", Arc::new(2)).unwrap();

        let mut values: Vec<u32> = registry.snapshot().iter().map(|v| **v).collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }
}
