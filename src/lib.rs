//! Zoomcast recording-session core.
//!
//! Captures a screen recording alongside a synchronized stream of
//! input-device telemetry so a later renderer can reproduce
//! cursor-following zoom effects in lock-step with playback. The heavy
//! lifting is not video encoding (an external collaborator's job) but:
//!
//! - the session lifecycle state machine, tolerant of pause/resume and
//!   partial failure ([`session`]);
//! - merging two independently-arriving streams (binary chunks and cursor
//!   events) into one pause-aware, time-addressable timeline
//!   ([`timeline`]);
//! - persisting timelines plus chunk payloads under a hard storage quota
//!   with deterministic eviction ([`storage`]).
//!
//! UI/CLI callers drive everything through the typed request/response
//! protocol in [`commands`].

pub mod capture;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod storage;
pub mod timeline;

pub use commands::{Command, CommandHandler, CommandResponse, ResponsePayload};
pub use config::{RetentionConfig, SessionConfig};
pub use error::{ZoomcastError, ZoomcastResult};
pub use session::{
    CaptureTarget, RecordingSessionManager, RecordingSettings, SessionState, StopOutcome,
};
pub use storage::{FsRecordStore, MemoryRecordStore, RecordStore, StorageLifecycleManager};
pub use timeline::{Timeline, TimelineSynchronizer};
