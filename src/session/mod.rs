//! Recording sessions: the lifecycle state machine, the per-target
//! registry, and the manager orchestrating the capture and input
//! collaborators.

pub mod manager;
pub mod registry;
pub mod types;

pub use manager::{RecordingSessionManager, RecordingStateReport, SessionSnapshot, StopOutcome};
pub use registry::SessionRegistry;
pub use types::{
    CaptureTarget, CursorEvent, CursorEventKind, MouseButton, RecordingSettings, Session,
    SessionState, VideoChunk, ZoomMode, ZoomSettings,
};
