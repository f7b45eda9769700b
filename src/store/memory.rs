//! In-memory context store for tests and token-less local runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::{ContextStore, RootId};

/// In-memory store. Supports restricting which roots `ensure_root`
/// accepts and injecting read/write failures, so turn-boundary error
/// handling can be exercised without a remote backend.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<(String, String), String>>,
    /// When `Some`, only these roots validate; when `None`, any
    /// non-empty candidate is accepted.
    valid_roots: Option<HashSet<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// A store that accepts any non-empty root candidate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only accepts the given root candidates.
    pub fn with_roots<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_roots: Some(roots.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Make every subsequent `get` fail with `StoreError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put` fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot all documents under a root, for before/after comparisons.
    pub fn snapshot(&self, root: &RootId) -> HashMap<String, String> {
        let docs = self.docs.read().expect("store lock poisoned");
        docs.iter()
            .filter(|((r, _), _)| r == root.as_str())
            .map(|((_, name), text)| (name.clone(), text.clone()))
            .collect()
    }

    /// Seed a document directly, bypassing the trait (test setup).
    pub fn seed(&self, root: &RootId, name: &str, text: &str) {
        let mut docs = self.docs.write().expect("store lock poisoned");
        docs.insert((root.as_str().to_string(), name.to_string()), text.to_string());
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn get(&self, root: &RootId, name: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                operation: format!("get {name}"),
                reason: "injected read failure".into(),
            });
        }
        let docs = self.docs.read().expect("store lock poisoned");
        Ok(docs
            .get(&(root.as_str().to_string(), name.to_string()))
            .cloned())
    }

    async fn put(&self, root: &RootId, name: &str, text: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                operation: format!("put {name}"),
                reason: "injected write failure".into(),
            });
        }
        let mut docs = self.docs.write().expect("store lock poisoned");
        docs.insert(
            (root.as_str().to_string(), name.to_string()),
            text.to_string(),
        );
        Ok(())
    }

    async fn list(&self, root: &RootId) -> Result<Vec<String>, StoreError> {
        let docs = self.docs.read().expect("store lock poisoned");
        let mut names: Vec<String> = docs
            .keys()
            .filter(|(r, _)| r == root.as_str())
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn ensure_root(&self, candidate: &str) -> Result<RootId, StoreError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(StoreError::RootInvalid {
                candidate: candidate.into(),
                reason: "empty reference".into(),
            });
        }
        if let Some(ref valid) = self.valid_roots
            && !valid.contains(candidate)
        {
            return Err(StoreError::RootInvalid {
                candidate: candidate.into(),
                reason: "unknown folder".into(),
            });
        }
        Ok(RootId::new(candidate))
    }
}
