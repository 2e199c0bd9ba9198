//! Storage module for persisted projects and blob payloads.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs (key layout + shared helpers)
//!   |
//!   +-- types.rs (record type definitions)
//!   +-- store.rs (RecordStore trait, memory + filesystem backends)
//!   +-- lifecycle.rs (persist / evict / project operations)
//!   +-- tests.rs (unit tests)
//! ```
//!
//! ## Key layout
//!
//! | key | value |
//! |---|---|
//! | `project_{id}` | [`types::Project`] |
//! | `blob_{sessionId}_{segmentIndex}` | [`types::BlobRecord`] |
//! | `recent_projects` | [`types::RecentProjects`] (most-recent-first, capped) |
//! | `cleanup_stats` | [`types::CleanupStats`] |

pub mod lifecycle;
pub mod store;
pub mod types;

pub use lifecycle::StorageLifecycleManager;
pub use store::{FsRecordStore, MemoryRecordStore, RecordStore};

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Record store key of the recent-projects index.
pub const RECENT_PROJECTS_KEY: &str = "recent_projects";

/// Record store key of the persisted eviction counters.
pub const CLEANUP_STATS_KEY: &str = "cleanup_stats";

pub(crate) const PROJECT_KEY_PREFIX: &str = "project_";
pub(crate) const BLOB_KEY_PREFIX: &str = "blob_";

/// Store key for a project record.
pub(crate) fn project_key(project_id: &str) -> String {
    format!("{}{}", PROJECT_KEY_PREFIX, project_id)
}

/// Store key for a blob record (`blob_id` is `{sessionId}_{segmentIndex}`).
pub(crate) fn blob_key(blob_id: &str) -> String {
    format!("{}{}", BLOB_KEY_PREFIX, blob_id)
}

/// Generate a unique ID for a session or duplicated project.
pub(crate) fn generate_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0))
        .as_millis();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}{:06x}", timestamp, random & 0xFFFFFF)
}
