//! External collaborator contracts.
//!
//! The media-capture facility and the input-telemetry source are opaque
//! capabilities consumed through these traits. Both are modeled as explicit
//! futures plus channel-delivered streams, so acknowledgment failures and
//! timeouts are observable and testable rather than silently swallowed.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::ZoomcastResult;
use crate::session::types::{CaptureTarget, CursorEvent, RecordingSettings, VideoChunk};

/// Receiving side of the capture collaborator's chunk stream.
pub type ChunkReceiver = mpsc::UnboundedReceiver<VideoChunk>;

/// Receiving side of the input collaborator's cursor-event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<CursorEvent>;

/// Deferred finalize call handed out with a capture acknowledgment.
///
/// Invoking it asks the collaborator to flush and close its chunk stream;
/// after the returned future resolves no further chunks are emitted (the
/// stream's sender is dropped).
pub type FinalizeFn = Box<dyn FnOnce() -> BoxFuture<'static, ZoomcastResult<()>> + Send>;

/// Successful capture initialization: the chunk stream plus the finalizer.
pub struct CaptureAck {
    /// Stream of encoded chunks, closed after finalize completes.
    pub chunks: ChunkReceiver,
    /// One-shot finalizer for the capture pipeline.
    pub finalize: FinalizeFn,
}

/// The media-capture collaborator.
///
/// `initialize` must resolve with an acknowledgment or an error; the session
/// manager bounds the wait with a deadline and treats expiry as a hard
/// cancellation of the acknowledgment wait (not of the collaborator itself).
pub trait CaptureSource: Send + Sync + 'static {
    fn initialize(
        &self,
        target: &CaptureTarget,
        settings: &RecordingSettings,
    ) -> BoxFuture<'static, ZoomcastResult<CaptureAck>>;
}

/// The input-telemetry collaborator.
///
/// Emits typed cursor events carrying absolute session-clock timestamps.
/// `stop_tracking` closes the event stream.
pub trait InputTracker: Send + Sync + 'static {
    fn start_tracking(&self, session_id: &str) -> BoxFuture<'static, ZoomcastResult<EventReceiver>>;

    fn stop_tracking(&self, session_id: &str) -> BoxFuture<'static, ZoomcastResult<()>>;
}
