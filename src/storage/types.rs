//! Type definitions for persisted storage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ts_rs::TS;

use crate::session::types::RecordingSettings;
use crate::timeline::Timeline;

/// Current project record format version. Bumped on breaking layout changes
/// so older builds can refuse records they do not understand.
pub const PROJECT_SCHEMA_VERSION: u32 = 1;

/// Serde adapter storing binary payloads as base64 strings inside JSON
/// records.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded SHA-256 of a payload, used for blob integrity checks.
pub fn checksum_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Project
// ============================================================================

/// A persisted, user-facing recording.
///
/// The timeline inside holds blob-id references only, never raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Project {
    /// Record format version for safe future migration.
    pub schema_version: u32,
    /// Unique project identifier (the originating session's id).
    pub id: String,
    /// Display name; user-editable.
    pub name: String,
    /// Creation timestamp.
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp; drives age-based eviction ordering.
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    /// Recorded duration (wall span minus pauses).
    #[ts(type = "number")]
    pub duration_ms: u64,
    /// Settings snapshot from the originating session.
    pub settings: RecordingSettings,
    /// The sealed timeline with blob references.
    pub timeline: Timeline,
    /// True when the recording finished without any video chunks.
    pub no_video_data: bool,
}

impl Project {
    /// Lightweight summary for list displays and the recent-projects index.
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            duration_ms: self.duration_ms,
            no_video_data: self.no_video_data,
        }
    }
}

/// Lightweight project descriptor for list display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "number")]
    pub duration_ms: u64,
    pub no_video_data: bool,
}

/// Bounded most-recent-first index of project summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProjects {
    pub entries: Vec<ProjectSummary>,
}

impl RecentProjects {
    /// Insert or refresh a summary at the front, keeping at most `cap`
    /// entries.
    pub fn push(&mut self, summary: ProjectSummary, cap: usize) {
        self.entries.retain(|e| e.id != summary.id);
        self.entries.insert(0, summary);
        self.entries.truncate(cap);
    }

    /// Drop the entry for a deleted project, if present.
    pub fn remove(&mut self, project_id: &str) {
        self.entries.retain(|e| e.id != project_id);
    }
}

// ============================================================================
// Blob Records
// ============================================================================

/// Persisted binary payload for one video segment.
///
/// The id keeps the `{sessionId}_{segmentIndex}` composite convention for
/// key-layout compatibility, but ownership is resolved through the explicit
/// `owner_project_id` foreign key; substring matching on ids is not used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    /// Composite identifier: `{sessionId}_{segmentIndex}`.
    pub id: String,
    /// The project this blob belongs to.
    pub owner_project_id: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Payload size in bytes.
    pub byte_length: u64,
    /// Hex SHA-256 of the payload, verified on export.
    pub checksum: String,
    /// The encoded bytes, stored as base64 in the record.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    pub fn new(
        id: String,
        owner_project_id: String,
        mime_type: String,
        data: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            checksum: checksum_hex(&data),
            byte_length: data.len() as u64,
            id,
            owner_project_id,
            mime_type,
            data,
            created_at,
        }
    }

    /// True when the stored payload still matches its recorded checksum.
    pub fn verify(&self) -> bool {
        checksum_hex(&self.data) == self.checksum
    }
}

// ============================================================================
// Cleanup & Stats
// ============================================================================

/// Persisted eviction counters, accumulated across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CleanupStats {
    #[ts(type = "number")]
    pub runs: u64,
    #[ts(type = "number")]
    pub orphan_blobs_removed: u64,
    #[ts(type = "number")]
    pub aged_projects_removed: u64,
    #[ts(type = "number")]
    pub overflow_projects_removed: u64,
    #[ts(type = "string | null")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Result of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EvictionReport {
    #[ts(type = "number")]
    pub orphan_blobs_removed: u64,
    #[ts(type = "number")]
    pub aged_projects_removed: u64,
    #[ts(type = "number")]
    pub overflow_projects_removed: u64,
}

impl EvictionReport {
    pub fn is_noop(&self) -> bool {
        self.orphan_blobs_removed == 0
            && self.aged_projects_removed == 0
            && self.overflow_projects_removed == 0
    }
}

/// Storage usage snapshot.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StorageStats {
    #[ts(type = "number")]
    pub used_bytes: u64,
    #[ts(type = "number")]
    pub capacity_bytes: u64,
    #[ts(type = "number")]
    pub project_count: u32,
    #[ts(type = "number")]
    pub blob_count: u32,
}

// ============================================================================
// Export
// ============================================================================

/// Output format for project exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ExportFormat {
    /// Full JSON bundle: project record plus base64 segment payloads.
    Json,
    /// Raw concatenated segment bytes in sequence order.
    Raw,
}

/// One segment inside a JSON export bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSegment {
    pub blob_id: String,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Self-contained export document for the JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub project: Project,
    pub segments: Vec<ExportSegment>,
}

/// A finished export: suggested file name plus the encoded bytes.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExportBundle {
    pub format: ExportFormat,
    pub file_name: String,
    /// Export payload, base64 when crossing the control surface.
    #[serde(with = "base64_bytes")]
    #[ts(type = "string")]
    pub data: Vec<u8>,
}
