//! Type definitions for recording sessions.
//!
//! A Session is one recording attempt: an identity, a strict lifecycle state
//! machine, pause accounting, and an immutable settings snapshot taken at
//! start. Cursor events and video chunks are the two telemetry streams a
//! session forwards into its timeline.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ZoomcastError, ZoomcastResult};

// ============================================================================
// Capture Target
// ============================================================================

/// What is being recorded. At most one session may be active per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum CaptureTarget {
    /// A whole display.
    Screen {
        #[serde(rename = "displayIndex")]
        display_index: u32,
    },
    /// A single window.
    Window {
        #[serde(rename = "windowId")]
        window_id: u32,
    },
    /// A browser tab.
    Tab {
        #[serde(rename = "tabId")]
        tab_id: u32,
    },
}

impl CaptureTarget {
    /// Stable registry key for the one-active-session-per-target rule.
    pub fn key(&self) -> String {
        match self {
            CaptureTarget::Screen { display_index } => format!("screen:{}", display_index),
            CaptureTarget::Window { window_id } => format!("window:{}", window_id),
            CaptureTarget::Tab { tab_id } => format!("tab:{}", tab_id),
        }
    }
}

// ============================================================================
// Recording Settings
// ============================================================================

/// Zoom behaviour requested for the eventual rendering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ZoomMode {
    /// No zoom effects.
    Off,
    /// Automatically zoom to click locations.
    Auto,
    /// Only manually placed zoom regions.
    Manual,
    /// Both auto-generated and manual zooms.
    Both,
}

/// Zoom configuration captured with the session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ZoomSettings {
    pub mode: ZoomMode,
    /// Default zoom scale for auto-generated zooms (e.g. 2.0 = 2x).
    pub scale: f32,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            mode: ZoomMode::Auto,
            scale: 2.0,
        }
    }
}

/// Settings for a recording session.
///
/// Snapshotted immutably at `start`; the session keeps this copy even if the
/// caller's configuration changes mid-recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecordingSettings {
    /// Frames per second requested from the capture collaborator (10-60).
    pub fps: u32,
    /// Quality setting (1-100). Forwarded to the capture collaborator.
    pub quality: u32,
    /// Zoom configuration for the renderer.
    pub zoom: ZoomSettings,
    /// Whether cursor telemetry is tracked alongside the video.
    pub capture_cursor: bool,
    /// Maximum recording duration in seconds. None = unlimited.
    pub max_duration_secs: Option<u32>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            quality: 80,
            zoom: ZoomSettings::default(),
            capture_cursor: true,
            max_duration_secs: None,
        }
    }
}

impl RecordingSettings {
    /// Validate and clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.fps = self.fps.clamp(10, 60);
        self.quality = self.quality.clamp(1, 100);
        if !self.zoom.scale.is_finite() {
            self.zoom.scale = 2.0;
        }
        self.zoom.scale = self.zoom.scale.clamp(1.0, 4.0);
    }
}

// ============================================================================
// Cursor Events
// ============================================================================

/// Mouse button identity for click events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Type of cursor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum CursorEventKind {
    /// Pointer moved.
    Move,
    /// Button event.
    Click {
        button: MouseButton,
        /// True = button pressed, False = button released.
        pressed: bool,
    },
    /// Scroll gesture (e.g. trackpad or scrollbar driven).
    Scroll {
        #[serde(rename = "deltaX")]
        delta_x: i32,
        #[serde(rename = "deltaY")]
        delta_y: i32,
    },
    /// Discrete wheel event.
    Wheel {
        #[serde(rename = "deltaX")]
        delta_x: i32,
        #[serde(rename = "deltaY")]
        delta_y: i32,
    },
    /// Key event.
    Key {
        code: String,
        /// True = key down, False = key up.
        pressed: bool,
    },
    /// Capture surface resized.
    Resize { width: u32, height: u32 },
}

/// A single cursor-telemetry sample as emitted by the input collaborator.
///
/// Immutable once created. `absolute_ms` is the capture-time reading of the
/// session clock; the pause-adjusted relative offset is computed by the
/// timeline synchronizer at arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CursorEvent {
    /// Capture-time clock reading in milliseconds.
    #[ts(type = "number")]
    pub absolute_ms: u64,
    /// Screen X position in pixels.
    pub x: i32,
    /// Screen Y position in pixels.
    pub y: i32,
    /// Type of event.
    pub kind: CursorEventKind,
    /// Descriptor of the element under the cursor, when known.
    pub target: Option<String>,
}

// ============================================================================
// Video Chunks
// ============================================================================

/// One binary segment from the capture collaborator.
///
/// Ownership is transient: consumed by the timeline synchronizer, handed to
/// the storage lifecycle manager for persistence, then released. Arrival
/// order is not guaranteed to equal capture order; `sequence_index` is the
/// authoritative ordering.
#[derive(Debug, Clone)]
pub struct VideoChunk {
    /// Monotonic per-session index assigned at capture time.
    pub sequence_index: u32,
    /// MIME type of the encoded data (e.g. "video/webm;codecs=vp9").
    pub mime_type: String,
    /// Opaque encoded bytes.
    pub data: Vec<u8>,
}

impl VideoChunk {
    pub fn byte_length(&self) -> u64 {
        self.data.len() as u64
    }
}

// ============================================================================
// Session
// ============================================================================

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SessionState {
    /// Waiting for capture + tracking acknowledgments.
    Starting,
    /// Actively recording.
    Recording,
    /// Paused; elapsed time is not accumulating.
    Paused,
    /// Finalizing the chunk stream.
    Stopping,
    /// Terminal: finished and persisted.
    Stopped,
    /// Terminal: aborted or degraded shutdown.
    Failed,
}

impl SessionState {
    /// Terminal sessions are removed from the active-session registry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single recording attempt.
///
/// Owned exclusively by the session manager for its lifetime; collaborators
/// only ever see the id. All timestamps are session-clock readings in
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    /// Opaque unique identifier, generated at creation.
    pub id: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// What is being recorded.
    pub target: CaptureTarget,
    /// Immutable settings snapshot taken at start.
    pub settings: RecordingSettings,
    /// Clock reading when the session was created.
    #[ts(type = "number")]
    pub started_at_ms: u64,
    /// Clock reading when the current pause began, if paused.
    #[ts(type = "number | null")]
    pub paused_at_ms: Option<u64>,
    /// Accumulated paused time across all pause/resume cycles.
    #[ts(type = "number")]
    pub total_paused_ms: u64,
    /// Clock reading when the session reached a terminal state.
    #[ts(type = "number | null")]
    pub ended_at_ms: Option<u64>,
}

impl Session {
    /// Create a session in `Starting` for the given target.
    pub fn new(
        id: String,
        target: CaptureTarget,
        mut settings: RecordingSettings,
        started_at_ms: u64,
    ) -> Self {
        settings.validate();
        Self {
            id,
            state: SessionState::Starting,
            target,
            settings,
            started_at_ms,
            paused_at_ms: None,
            total_paused_ms: 0,
            ended_at_ms: None,
        }
    }

    /// `Starting -> Recording` once capture and tracking both acknowledged.
    pub fn mark_recording(&mut self) -> ZoomcastResult<()> {
        match self.state {
            SessionState::Starting => {
                self.state = SessionState::Recording;
                Ok(())
            }
            actual => Err(ZoomcastError::invalid_state("start", actual)),
        }
    }

    /// `Recording -> Paused`. Invalid transitions never mutate state.
    pub fn pause(&mut self, now_ms: u64) -> ZoomcastResult<()> {
        match self.state {
            SessionState::Recording => {
                self.state = SessionState::Paused;
                self.paused_at_ms = Some(now_ms);
                Ok(())
            }
            actual => Err(ZoomcastError::invalid_state("pause", actual)),
        }
    }

    /// `Paused -> Recording`, folding the pause into `total_paused_ms`.
    pub fn resume(&mut self, now_ms: u64) -> ZoomcastResult<()> {
        match self.state {
            SessionState::Paused => {
                let paused_at = self.paused_at_ms.take().unwrap_or(now_ms);
                self.total_paused_ms += now_ms.saturating_sub(paused_at);
                self.state = SessionState::Recording;
                Ok(())
            }
            actual => Err(ZoomcastError::invalid_state("resume", actual)),
        }
    }

    /// `Recording|Paused -> Stopping`. Stopping while paused is legal; the
    /// open pause interval is folded into the accumulated total so duration
    /// math needs no special case afterwards.
    pub fn begin_stop(&mut self, now_ms: u64) -> ZoomcastResult<()> {
        match self.state {
            SessionState::Recording => {
                self.state = SessionState::Stopping;
                Ok(())
            }
            SessionState::Paused => {
                let paused_at = self.paused_at_ms.take().unwrap_or(now_ms);
                self.total_paused_ms += now_ms.saturating_sub(paused_at);
                self.state = SessionState::Stopping;
                Ok(())
            }
            actual => Err(ZoomcastError::invalid_state("stop", actual)),
        }
    }

    /// `Stopping -> Stopped`.
    pub fn mark_stopped(&mut self, now_ms: u64) -> ZoomcastResult<()> {
        match self.state {
            SessionState::Stopping => {
                self.state = SessionState::Stopped;
                self.ended_at_ms = Some(now_ms);
                Ok(())
            }
            actual => Err(ZoomcastError::invalid_state("finish", actual)),
        }
    }

    /// Any non-terminal state -> `Failed`. Terminal states stay put.
    pub fn mark_failed(&mut self, now_ms: u64) {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
            if self.ended_at_ms.is_none() {
                self.ended_at_ms = Some(now_ms);
            }
        }
    }

    /// Recorded duration: wall span minus accumulated pauses. While paused,
    /// the duration is frozen at the pause point.
    pub fn duration_ms(&self, now_ms: u64) -> u64 {
        let end = self.ended_at_ms.unwrap_or(match self.paused_at_ms {
            Some(paused_at) => paused_at,
            None => now_ms,
        });
        end.saturating_sub(self.started_at_ms)
            .saturating_sub(self.total_paused_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "rec_test01".to_string(),
            CaptureTarget::Tab { tab_id: 1 },
            RecordingSettings::default(),
            1_000,
        )
    }

    #[test]
    fn test_target_keys() {
        assert_eq!(CaptureTarget::Screen { display_index: 0 }.key(), "screen:0");
        assert_eq!(CaptureTarget::Window { window_id: 77 }.key(), "window:77");
        assert_eq!(CaptureTarget::Tab { tab_id: 3 }.key(), "tab:3");
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = RecordingSettings {
            fps: 144,
            quality: 0,
            zoom: ZoomSettings {
                mode: ZoomMode::Auto,
                scale: 99.0,
            },
            ..Default::default()
        };
        settings.validate();
        assert_eq!(settings.fps, 60);
        assert_eq!(settings.quality, 1);
        assert!((settings.zoom.scale - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = session();
        assert_eq!(s.state, SessionState::Starting);

        s.mark_recording().unwrap();
        assert_eq!(s.state, SessionState::Recording);

        s.pause(5_000).unwrap();
        assert_eq!(s.state, SessionState::Paused);
        assert_eq!(s.paused_at_ms, Some(5_000));

        s.resume(7_000).unwrap();
        assert_eq!(s.state, SessionState::Recording);
        assert_eq!(s.total_paused_ms, 2_000);
        assert_eq!(s.paused_at_ms, None);

        s.begin_stop(10_000).unwrap();
        assert_eq!(s.state, SessionState::Stopping);

        s.mark_stopped(10_100).unwrap();
        assert_eq!(s.state, SessionState::Stopped);
        assert!(s.state.is_terminal());
    }

    #[test]
    fn test_stop_while_paused_folds_open_pause() {
        let mut s = session();
        s.mark_recording().unwrap();
        s.pause(4_000).unwrap();
        s.begin_stop(6_500).unwrap();

        assert_eq!(s.total_paused_ms, 2_500);
        assert_eq!(s.paused_at_ms, None);
    }

    #[test]
    fn test_invalid_transitions_do_not_mutate() {
        let mut s = session();

        // Pause before recording
        let before = s.clone();
        assert!(matches!(
            s.pause(2_000),
            Err(ZoomcastError::InvalidState { .. })
        ));
        assert_eq!(s.state, before.state);
        assert_eq!(s.paused_at_ms, before.paused_at_ms);

        s.mark_recording().unwrap();

        // Resume without a pause
        assert!(matches!(
            s.resume(3_000),
            Err(ZoomcastError::InvalidState { .. })
        ));
        assert_eq!(s.state, SessionState::Recording);
        assert_eq!(s.total_paused_ms, 0);

        // Double stop
        s.begin_stop(4_000).unwrap();
        assert!(matches!(
            s.begin_stop(4_100),
            Err(ZoomcastError::InvalidState { .. })
        ));
        assert_eq!(s.state, SessionState::Stopping);
    }

    #[test]
    fn test_duration_excludes_pauses() {
        let mut s = session();
        s.mark_recording().unwrap();
        s.pause(5_000).unwrap();

        // Frozen at the pause point.
        assert_eq!(s.duration_ms(6_500), 4_000);

        s.resume(7_000).unwrap();
        // 9000 elapsed, 2000 paused.
        assert_eq!(s.duration_ms(10_000), 7_000);

        s.begin_stop(11_000).unwrap();
        s.mark_stopped(11_000).unwrap();
        assert_eq!(s.duration_ms(99_999), 8_000);
    }

    #[test]
    fn test_mark_failed_is_sticky_on_terminal() {
        let mut s = session();
        s.mark_recording().unwrap();
        s.begin_stop(2_000).unwrap();
        s.mark_stopped(2_000).unwrap();

        s.mark_failed(3_000);
        assert_eq!(s.state, SessionState::Stopped);
    }

    #[test]
    fn test_cursor_event_serialization() {
        let event = CursorEvent {
            absolute_ms: 1_000,
            x: 100,
            y: 200,
            kind: CursorEventKind::Click {
                button: MouseButton::Left,
                pressed: true,
            },
            target: Some("button#save".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("click"));
        assert!(json.contains("pressed"));

        let restored: CursorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_string(&SessionState::Recording).unwrap();
        assert_eq!(json, "\"recording\"");
    }
}
