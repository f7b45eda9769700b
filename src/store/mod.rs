//! Context store abstraction for per-user durable documents.

pub mod drive;
pub mod memory;

pub use drive::DriveStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Validated reference to a user's storage root (a folder/container).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootId(String);

impl RootId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three named documents kept under each user root.
pub mod documents {
    pub const PROFILE: &str = "profile.md";
    pub const PLAN: &str = "reading_plan.md";
    pub const HISTORY: &str = "chat_history.md";

    pub const ALL: &[&str] = &[PROFILE, PLAN, HISTORY];
}

/// Uniform get/put/list access to a remote document store.
///
/// Every `put` is a full-document overwrite; the codec always produces a
/// complete document, so no partial-patch path exists.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Fetch a document. `Ok(None)` means the document does not exist yet
    /// (a fresh user), which is not an error.
    async fn get(&self, root: &RootId, name: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite (or create) a document with complete new content.
    async fn put(&self, root: &RootId, name: &str, text: &str) -> Result<(), StoreError>;

    /// List document names under the root.
    async fn list(&self, root: &RootId) -> Result<Vec<String>, StoreError>;

    /// Validate that a candidate root reference is reachable and writable
    /// before accepting it as a user's linked root.
    async fn ensure_root(&self, candidate: &str) -> Result<RootId, StoreError>;
}
