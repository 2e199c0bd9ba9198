//! Command and response types for the control surface.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ZoomcastError;
use crate::session::manager::{RecordingStateReport, StopOutcome};
use crate::session::types::{CaptureTarget, RecordingSettings};
use crate::storage::types::{
    CleanupStats, ExportBundle, ExportFormat, Project, ProjectSummary, StorageStats,
};

/// A control-surface request, keyed by action name.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Command {
    /// Begin a recording session for a capture target.
    #[serde(rename_all = "camelCase")]
    StartRecording {
        target: CaptureTarget,
        settings: RecordingSettings,
    },
    /// Pause an active recording.
    #[serde(rename_all = "camelCase")]
    PauseRecording { session_id: String },
    /// Resume a paused recording.
    #[serde(rename_all = "camelCase")]
    ResumeRecording { session_id: String },
    /// Stop a recording and persist its timeline.
    #[serde(rename_all = "camelCase")]
    StopRecording { session_id: String },
    /// Snapshot all live sessions.
    GetRecordingState,
    /// Persist caller-side edits to a project (rename, settings).
    #[serde(rename_all = "camelCase")]
    SaveProject { project: Box<Project> },
    /// Load a persisted project.
    #[serde(rename_all = "camelCase")]
    LoadProject { project_id: String },
    /// Delete a project and its blobs.
    #[serde(rename_all = "camelCase")]
    DeleteProject { project_id: String },
    /// Export a project with its segment payloads.
    #[serde(rename_all = "camelCase")]
    ExportProject {
        project_id: String,
        format: ExportFormat,
    },
    /// All persisted project summaries, most recently updated first.
    ListProjects,
    /// Copy a project together with its blobs.
    #[serde(rename_all = "camelCase")]
    DuplicateProject { project_id: String },
    /// Storage usage and eviction counters.
    GetStorageStats,
}

/// Typed payload of a successful response.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum ResponsePayload {
    #[serde(rename_all = "camelCase")]
    Started { session_id: String },
    #[serde(rename_all = "camelCase")]
    StateChanged {
        session_id: String,
        state: crate::session::types::SessionState,
    },
    Stopped(StopOutcome),
    RecordingState(RecordingStateReport),
    Project(Box<Project>),
    #[serde(rename_all = "camelCase")]
    Projects { projects: Vec<ProjectSummary> },
    Export(ExportBundle),
    #[serde(rename_all = "camelCase")]
    Deleted { project_id: String },
    #[serde(rename_all = "camelCase")]
    Storage {
        stats: StorageStats,
        cleanup: CleanupStats,
    },
}

/// Envelope for every control-surface reply.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommandResponse {
    pub success: bool,
    /// Short human-readable reason, present only on failure.
    pub error: Option<String>,
    /// Result payload, present only on success.
    pub payload: Option<ResponsePayload>,
}

impl CommandResponse {
    pub fn ok(payload: ResponsePayload) -> Self {
        Self {
            success: true,
            error: None,
            payload: Some(payload),
        }
    }

    pub fn failure(error: &ZoomcastError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            payload: None,
        }
    }
}
