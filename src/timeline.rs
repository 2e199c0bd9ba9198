//! Timeline synchronization for recording sessions.
//!
//! Two independently-arriving streams feed a session: binary video chunks
//! from the capture collaborator and discrete cursor events from the input
//! collaborator. The synchronizer merges them into one session-relative,
//! pause-aware timeline:
//!
//! - every arrival is stamped with a relative time computed *at arrival*
//!   (`(arrival - session start) - paused-so-far`), so pause/resume cycles
//!   interleaved with buffered arrivals cannot retroactively shift samples;
//! - the event lane is ordered by arrival, the chunk lane by sequence index
//!   (network transport may reorder chunks);
//! - `seal` produces the immutable [`Timeline`] exactly once.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ZoomcastError, ZoomcastResult};
use crate::session::types::{CursorEvent, VideoChunk};

// ============================================================================
// Timeline Types
// ============================================================================

/// A cursor event stamped with its pause-adjusted offset from session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TimelineEvent {
    /// Pause-adjusted milliseconds from session start.
    #[ts(type = "number")]
    pub relative_ms: u64,
    /// The underlying telemetry sample.
    pub event: CursorEvent,
}

/// Descriptor of one persisted video segment: metadata plus the storage
/// reference, never raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VideoSegment {
    /// Capture-order index of the segment.
    pub sequence_index: u32,
    /// Identifier of the blob record holding the bytes
    /// (`{sessionId}_{segmentIndex}`).
    pub blob_id: String,
    /// Size of the encoded payload.
    #[ts(type = "number")]
    pub byte_length: u64,
    /// MIME type of the encoded payload.
    pub mime_type: String,
    /// Pause-adjusted arrival offset from session start.
    #[ts(type = "number")]
    pub relative_ms: u64,
}

/// The sealed, ordered merge of a session's chunks and cursor events.
///
/// Created once at session stop; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Timeline {
    /// Back-reference to the owning session.
    pub session_id: String,
    /// Wall-clock span of the recording minus total paused time.
    #[ts(type = "number")]
    pub duration_ms: u64,
    /// Cursor events in arrival order.
    pub events: Vec<TimelineEvent>,
    /// Video segments ordered by sequence index.
    pub segments: Vec<VideoSegment>,
    /// True when the session produced no video chunks at all.
    pub no_video_data: bool,
    /// Arrivals rejected because the timeline was already sealed.
    #[ts(type = "number")]
    pub dropped_late_events: u64,
    #[ts(type = "number")]
    pub dropped_late_chunks: u64,
}

/// A sealed timeline together with the chunk payloads that back its
/// segments, handed to the storage lifecycle manager for persistence. The
/// payloads are in segment order and released after the blobs are written.
pub struct SealedTimeline {
    pub timeline: Timeline,
    pub payloads: Vec<VideoChunk>,
}

// ============================================================================
// Synchronizer
// ============================================================================

struct PendingChunk {
    chunk: VideoChunk,
    relative_ms: u64,
}

/// Merges chunk arrivals and cursor events into one ordered, pause-aware
/// timeline for a single session.
///
/// Holds only the owning session's id, never a mutable session handle; pause
/// bookkeeping is mirrored in by the session manager under the session's
/// exclusion domain.
pub struct TimelineSynchronizer {
    session_id: String,
    started_at_ms: u64,
    total_paused_ms: u64,
    paused_at_ms: Option<u64>,
    events: Vec<TimelineEvent>,
    chunks: Vec<PendingChunk>,
    last_event_relative_ms: u64,
    sealed: bool,
    dropped_late_events: u64,
    dropped_late_chunks: u64,
}

impl TimelineSynchronizer {
    pub fn new(session_id: impl Into<String>, started_at_ms: u64) -> Self {
        Self {
            session_id: session_id.into(),
            started_at_ms,
            total_paused_ms: 0,
            paused_at_ms: None,
            events: Vec::new(),
            chunks: Vec::new(),
            last_event_relative_ms: 0,
            sealed: false,
            dropped_late_events: 0,
            dropped_late_chunks: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Arrivals rejected after sealing, for diagnostics.
    pub fn dropped_late(&self) -> (u64, u64) {
        (self.dropped_late_events, self.dropped_late_chunks)
    }

    /// Note a pause beginning at `now_ms`. Relative time freezes here until
    /// the matching resume.
    pub fn record_pause(&mut self, now_ms: u64) {
        if self.paused_at_ms.is_none() {
            self.paused_at_ms = Some(now_ms);
        }
    }

    /// Note a resume at `now_ms`, folding the closed pause interval into the
    /// accumulated total.
    pub fn record_resume(&mut self, now_ms: u64) {
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.total_paused_ms += now_ms.saturating_sub(paused_at);
        }
    }

    /// Pause-adjusted offset for an arrival at `arrival_ms`, snapshotting the
    /// paused total as of right now. While paused, arrivals are pinned to the
    /// pause point so relative time does not advance.
    fn relative_at(&self, arrival_ms: u64) -> u64 {
        let effective = match self.paused_at_ms {
            Some(paused_at) => arrival_ms.min(paused_at),
            None => arrival_ms,
        };
        effective
            .saturating_sub(self.started_at_ms)
            .saturating_sub(self.total_paused_ms)
    }

    /// Append a cursor event. The event's capture-time clock reading is its
    /// arrival reading for relative-time purposes.
    pub fn push_event(&mut self, event: CursorEvent) -> ZoomcastResult<()> {
        if self.sealed {
            self.dropped_late_events += 1;
            return Err(ZoomcastError::AlreadySealed {
                session_id: self.session_id.clone(),
            });
        }

        // The lane is ordered by arrival; an event whose capture timestamp
        // predates a pause fold-in is clamped up to keep the lane monotonic.
        let relative_ms = self.relative_at(event.absolute_ms).max(self.last_event_relative_ms);
        self.last_event_relative_ms = relative_ms;
        self.events.push(TimelineEvent { relative_ms, event });
        Ok(())
    }

    /// Append a video chunk that arrived at `arrival_ms`.
    pub fn push_chunk(&mut self, chunk: VideoChunk, arrival_ms: u64) -> ZoomcastResult<()> {
        if self.sealed {
            self.dropped_late_chunks += 1;
            return Err(ZoomcastError::AlreadySealed {
                session_id: self.session_id.clone(),
            });
        }

        let relative_ms = self.relative_at(arrival_ms);
        self.chunks.push(PendingChunk { chunk, relative_ms });
        Ok(())
    }

    /// Seal the timeline, producing the immutable merge result.
    ///
    /// Chunks are ordered by `sequence_index`, not arrival; duplicate
    /// indices keep the first arrival. Called exactly once; a second call
    /// is a programming error.
    pub fn seal(&mut self, end_ms: u64) -> ZoomcastResult<SealedTimeline> {
        if self.sealed {
            return Err(ZoomcastError::AlreadySealed {
                session_id: self.session_id.clone(),
            });
        }
        self.sealed = true;

        // A stop issued mid-pause folds the open interval here if the
        // manager has not already done so.
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.total_paused_ms += end_ms.saturating_sub(paused_at);
        }

        let duration_ms = end_ms
            .saturating_sub(self.started_at_ms)
            .saturating_sub(self.total_paused_ms);

        let mut pending = std::mem::take(&mut self.chunks);
        pending.sort_by_key(|p| p.chunk.sequence_index);
        let before = pending.len();
        pending.dedup_by_key(|p| p.chunk.sequence_index);
        if pending.len() != before {
            log::warn!(
                "[TIMELINE] {} duplicate chunk indices dropped for session {}",
                before - pending.len(),
                self.session_id
            );
        }

        // Transport reordering can leave arrival stamps non-monotonic in
        // sequence order; clamp each segment up to the running maximum.
        let mut segments = Vec::with_capacity(pending.len());
        let mut payloads = Vec::with_capacity(pending.len());
        let mut floor = 0u64;
        for p in pending {
            floor = floor.max(p.relative_ms);
            segments.push(VideoSegment {
                sequence_index: p.chunk.sequence_index,
                blob_id: format!("{}_{}", self.session_id, p.chunk.sequence_index),
                byte_length: p.chunk.byte_length(),
                mime_type: p.chunk.mime_type.clone(),
                relative_ms: floor,
            });
            payloads.push(p.chunk);
        }

        let no_video_data = segments.is_empty();
        if no_video_data {
            log::warn!(
                "[TIMELINE] Sealed session {} with no video data",
                self.session_id
            );
        }

        log::info!(
            "[TIMELINE] Sealed session {}: {} events, {} segments, {}ms",
            self.session_id,
            self.events.len(),
            segments.len(),
            duration_ms
        );

        Ok(SealedTimeline {
            timeline: Timeline {
                session_id: self.session_id.clone(),
                duration_ms,
                events: std::mem::take(&mut self.events),
                segments,
                no_video_data,
                dropped_late_events: self.dropped_late_events,
                dropped_late_chunks: self.dropped_late_chunks,
            },
            payloads,
        })
    }
}
