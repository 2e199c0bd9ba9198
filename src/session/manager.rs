//! Recording session lifecycle management.
//!
//! The manager owns at most one active session per capture target and
//! drives each session through the strict state machine:
//!
//! ```text
//! Starting -> Recording | Failed
//! Recording -> Paused | Stopping
//! Paused -> Recording | Stopping
//! Stopping -> Stopped | Failed
//! ```
//!
//! Each session lives behind its own async mutex, so no two transitions for
//! the same session ever run concurrently while distinct sessions proceed
//! fully in parallel. A `stop` issued while `start` is still awaiting the
//! capture acknowledgment simply queues on that mutex and is applied once
//! `start` resolves.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use ts_rs::TS;

use super::registry::SessionRegistry;
use super::types::{CaptureTarget, RecordingSettings, Session, SessionState};
use crate::capture::{CaptureSource, ChunkReceiver, EventReceiver, FinalizeFn, InputTracker};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{ZoomcastError, ZoomcastResult};
use crate::storage::{generate_id, StorageLifecycleManager};
use crate::timeline::TimelineSynchronizer;

// ============================================================================
// Public Result Types
// ============================================================================

/// Result of stopping a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StopOutcome {
    pub session_id: String,
    /// Recorded duration (wall span minus pauses).
    #[ts(type = "number")]
    pub duration_ms: u64,
    /// Persisted project id; None when the session failed before anything
    /// could be recorded.
    pub project_id: Option<String>,
    /// True when the recording finished without usable video chunks.
    pub no_video_data: bool,
}

/// Snapshot of one live session for state reporting.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSnapshot {
    pub id: String,
    pub target: CaptureTarget,
    pub state: SessionState,
    #[ts(type = "number")]
    pub duration_ms: u64,
    #[ts(type = "number")]
    pub total_paused_ms: u64,
}

/// Full status of the recording system.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecordingStateReport {
    pub is_recording: bool,
    pub sessions: Vec<SessionSnapshot>,
}

// ============================================================================
// Active Session
// ============================================================================

/// Mutable per-session state, guarded by the session's exclusion domain.
struct ActiveState {
    session: Session,
    synchronizer: TimelineSynchronizer,
    finalize: Option<FinalizeFn>,
    forwarders: Vec<JoinHandle<()>>,
}

/// One registered session: identity plus its mutual-exclusion domain.
pub struct ActiveSession {
    id: String,
    state: tokio::sync::Mutex<ActiveState>,
}

// ============================================================================
// Session Manager
// ============================================================================

/// Owns session identity and the start/pause/resume/stop transitions, and
/// orchestrates the capture and input collaborators.
pub struct RecordingSessionManager {
    registry: SessionRegistry<ActiveSession>,
    clock: Arc<dyn Clock>,
    capture: Arc<dyn CaptureSource>,
    tracker: Arc<dyn InputTracker>,
    storage: Arc<StorageLifecycleManager>,
    config: SessionConfig,
}

impl RecordingSessionManager {
    pub fn new(
        clock: Arc<dyn Clock>,
        capture: Arc<dyn CaptureSource>,
        tracker: Arc<dyn InputTracker>,
        storage: Arc<StorageLifecycleManager>,
        mut config: SessionConfig,
    ) -> Self {
        config.validate();
        Self {
            registry: SessionRegistry::new(),
            clock,
            capture,
            tracker,
            storage,
            config,
        }
    }

    pub fn storage(&self) -> &Arc<StorageLifecycleManager> {
        &self.storage
    }

    /// Start a recording for a target.
    ///
    /// Fails with `AlreadyActive` when the target has a live session,
    /// `PermissionDenied` when the source declines, and `Timeout` when the
    /// capture collaborator does not acknowledge within the configured
    /// deadline. A failed start leaves no trace in the registry.
    pub async fn start(
        self: Arc<Self>,
        target: CaptureTarget,
        settings: RecordingSettings,
    ) -> ZoomcastResult<String> {
        let session_id = format!("rec_{}", generate_id());
        let now = self.clock.now_ms();
        let target_key = target.key();

        let session = Session::new(session_id.clone(), target.clone(), settings, now);
        let capture_cursor = session.settings.capture_cursor;
        let max_duration_secs = session.settings.max_duration_secs;
        let active = Arc::new(ActiveSession {
            id: session_id.clone(),
            state: tokio::sync::Mutex::new(ActiveState {
                synchronizer: TimelineSynchronizer::new(&session_id, now),
                session,
                finalize: None,
                forwarders: Vec::new(),
            }),
        });

        // Registered while Starting so a concurrent start on the same target
        // is rejected and a concurrent stop queues behind the session lock.
        self.registry
            .register(&target_key, &session_id, Arc::clone(&active))?;

        // Hold the session lock for the whole start so queued operations see
        // the resolved state.
        let mut guard = active.state.lock().await;

        let timeout = self.config.start_ack_timeout();
        let init = self.capture.initialize(&target, &guard.session.settings);
        let ack = match tokio::time::timeout(timeout, init).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => {
                log::warn!("[SESSION] capture initialization failed for {}: {}", session_id, e);
                guard.session.mark_failed(self.clock.now_ms());
                drop(guard);
                self.registry.remove(&session_id);
                return Err(e);
            }
            Err(_) => {
                log::warn!(
                    "[SESSION] capture initialization timed out after {}ms for {}",
                    self.config.start_ack_timeout_ms,
                    session_id
                );
                guard.session.mark_failed(self.clock.now_ms());
                drop(guard);
                self.registry.remove(&session_id);
                return Err(ZoomcastError::Timeout {
                    waiting_for: "capture initialization".to_string(),
                    millis: self.config.start_ack_timeout_ms,
                });
            }
        };

        let events = if capture_cursor {
            match tokio::time::timeout(timeout, self.tracker.start_tracking(&session_id)).await {
                Ok(Ok(rx)) => Some(rx),
                Ok(Err(e)) => {
                    log::warn!("[SESSION] input tracking failed for {}: {}", session_id, e);
                    // The capture pipeline already started; shut it down.
                    let _ = (ack.finalize)().await;
                    guard.session.mark_failed(self.clock.now_ms());
                    drop(guard);
                    self.registry.remove(&session_id);
                    return Err(e);
                }
                Err(_) => {
                    let _ = (ack.finalize)().await;
                    guard.session.mark_failed(self.clock.now_ms());
                    drop(guard);
                    self.registry.remove(&session_id);
                    return Err(ZoomcastError::Timeout {
                        waiting_for: "input tracking acknowledgment".to_string(),
                        millis: self.config.start_ack_timeout_ms,
                    });
                }
            }
        } else {
            None
        };

        guard.session.mark_recording()?;
        guard.finalize = Some(ack.finalize);
        guard
            .forwarders
            .push(self.spawn_chunk_forwarder(Arc::clone(&active), ack.chunks));
        if let Some(rx) = events {
            guard
                .forwarders
                .push(Self::spawn_event_forwarder(Arc::clone(&active), rx));
        }
        drop(guard);

        if let Some(max_secs) = max_duration_secs {
            Self::spawn_max_duration_watchdog(Arc::clone(&self), &session_id, max_secs);
        }

        log::info!(
            "[SESSION] Started {} for target {} (cursor tracking: {})",
            session_id,
            target_key,
            capture_cursor
        );
        Ok(session_id)
    }

    /// Pause a recording session.
    pub async fn pause(&self, session_id: &str) -> ZoomcastResult<SessionState> {
        let active = self.lookup(session_id)?;
        let mut guard = active.state.lock().await;

        let now = self.clock.now_ms();
        guard.session.pause(now)?;
        guard.synchronizer.record_pause(now);

        log::info!("[SESSION] Paused {} at {}ms", session_id, now);
        Ok(guard.session.state)
    }

    /// Resume a paused session, folding the pause into the accumulated total.
    pub async fn resume(&self, session_id: &str) -> ZoomcastResult<SessionState> {
        let active = self.lookup(session_id)?;
        let mut guard = active.state.lock().await;

        let now = self.clock.now_ms();
        guard.session.resume(now)?;
        guard.synchronizer.record_resume(now);

        log::info!(
            "[SESSION] Resumed {} at {}ms (total paused {}ms)",
            session_id,
            now,
            guard.session.total_paused_ms
        );
        Ok(guard.session.state)
    }

    /// Stop a session: finalize capture, wait the trailing-chunk grace
    /// period, seal the timeline and persist it.
    ///
    /// Stopping never fails just because no video arrived: a chunk-less
    /// session is persisted with an empty segment list and the
    /// `no_video_data` flag. A finalization error degrades the session to
    /// `Failed` with a metadata-only project, but the session always reaches
    /// a terminal state.
    pub async fn stop(&self, session_id: &str) -> ZoomcastResult<StopOutcome> {
        let active = self.lookup(session_id)?;

        // Phase 1: transition to Stopping under the session lock. Queued
        // behind a pending start; a start that resolved to Failed makes this
        // stop a no-op.
        let (finalize, capture_cursor) = {
            let mut guard = active.state.lock().await;
            if guard.session.state == SessionState::Failed {
                log::debug!("[SESSION] stop on failed session {} is a no-op", session_id);
                return Ok(StopOutcome {
                    session_id: session_id.to_string(),
                    duration_ms: 0,
                    project_id: None,
                    no_video_data: true,
                });
            }

            let now = self.clock.now_ms();
            guard.session.begin_stop(now)?;
            // A stop from Paused folded the open interval in the session;
            // mirror it in the synchronizer.
            guard.synchronizer.record_resume(now);
            (guard.finalize.take(), guard.session.settings.capture_cursor)
        };

        // Phase 2: finalize and drain, without holding the lock so buffered
        // chunks and events can still be forwarded.
        let grace = self.config.stop_grace();
        let mut finalize_failed = false;
        if let Some(finalize) = finalize {
            match tokio::time::timeout(grace, finalize()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("[SESSION] finalize failed for {}: {}", session_id, e);
                    finalize_failed = true;
                }
                Err(_) => {
                    log::warn!(
                        "[SESSION] finalize timed out after {}ms for {}",
                        self.config.stop_grace_ms,
                        session_id
                    );
                    finalize_failed = true;
                }
            }
        }

        if capture_cursor {
            if let Err(e) = self.tracker.stop_tracking(session_id).await {
                log::warn!("[SESSION] stop_tracking failed for {}: {}", session_id, e);
            }
        }

        // Trailing-chunk grace: the forwarders exit once the collaborator
        // closes its streams; cap the wait and abort stragglers.
        let forwarders = {
            let mut guard = active.state.lock().await;
            std::mem::take(&mut guard.forwarders)
        };
        for mut handle in forwarders {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        // Phase 3: seal and persist, then leave the registry.
        let mut guard = active.state.lock().await;
        let now = self.clock.now_ms();
        let mut sealed = guard.synchronizer.seal(now)?;

        if finalize_failed {
            // Metadata-only fallback: the chunk stream cannot be trusted.
            sealed.payloads.clear();
            sealed.timeline.segments.clear();
            sealed.timeline.no_video_data = true;
        }
        let no_video_data = sealed.timeline.no_video_data;

        let persisted = self.storage.persist(&guard.session, sealed);
        let outcome = match persisted {
            Ok(project_id) => {
                if finalize_failed {
                    guard.session.mark_failed(now);
                } else if guard.session.mark_stopped(now).is_err() {
                    guard.session.mark_failed(now);
                }
                Ok(StopOutcome {
                    session_id: session_id.to_string(),
                    duration_ms: guard.session.duration_ms(now),
                    project_id: Some(project_id),
                    no_video_data,
                })
            }
            Err(e) => {
                log::error!("[SESSION] persist failed for {}: {}", session_id, e);
                guard.session.mark_failed(now);
                Err(e)
            }
        };
        drop(guard);
        self.registry.remove(session_id);

        if let Ok(ref outcome) = outcome {
            log::info!(
                "[SESSION] Stopped {} ({}ms, project {:?}, noVideoData={})",
                session_id,
                outcome.duration_ms,
                outcome.project_id,
                outcome.no_video_data
            );
        }
        outcome
    }

    /// Implicit stop when a capture target disappears mid-session (tab or
    /// window closed). Best-effort: failures are logged, never surfaced, and
    /// the session is guaranteed to leave the registry.
    pub async fn handle_target_closed(&self, target: &CaptureTarget) {
        let target_key = target.key();
        let Some(active) = self.registry.get_by_target(&target_key) else {
            return;
        };
        let session_id = active.id.clone();

        log::info!(
            "[SESSION] Target {} closed, stopping {} implicitly",
            target_key,
            session_id
        );
        if let Err(e) = self.stop(&session_id).await {
            log::warn!(
                "[SESSION] implicit stop of {} failed: {} (discarding session)",
                session_id,
                e
            );
            if let Some(active) = self.registry.remove(&session_id) {
                let mut guard = active.state.lock().await;
                guard.session.mark_failed(self.clock.now_ms());
            }
        }
    }

    /// Snapshot of all live sessions.
    pub async fn state_report(&self) -> RecordingStateReport {
        let now = self.clock.now_ms();
        let mut sessions = Vec::new();
        for active in self.registry.snapshot() {
            let guard = active.state.lock().await;
            sessions.push(SessionSnapshot {
                id: guard.session.id.clone(),
                target: guard.session.target.clone(),
                state: guard.session.state,
                duration_ms: guard.session.duration_ms(now),
                total_paused_ms: guard.session.total_paused_ms,
            });
        }
        RecordingStateReport {
            is_recording: !sessions.is_empty(),
            sessions,
        }
    }

    /// Number of live sessions (for diagnostics).
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Id of the live session for a target, if any. Does not touch the
    /// session's exclusion domain, so it is safe to call while a start is
    /// still pending.
    pub fn session_for_target(&self, target: &CaptureTarget) -> Option<String> {
        self.registry
            .get_by_target(&target.key())
            .map(|active| active.id.clone())
    }

    // ========================================================================
    // Forwarding Tasks
    // ========================================================================

    fn spawn_chunk_forwarder(
        &self,
        active: Arc<ActiveSession>,
        mut chunks: ChunkReceiver,
    ) -> JoinHandle<()> {
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                let arrival_ms = clock.now_ms();
                let mut guard = active.state.lock().await;
                if let Err(e) = guard.synchronizer.push_chunk(chunk, arrival_ms) {
                    log::debug!("[TIMELINE] late chunk dropped for {}: {}", active.id, e);
                }
            }
        })
    }

    fn spawn_event_forwarder(
        active: Arc<ActiveSession>,
        mut events: EventReceiver,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let mut guard = active.state.lock().await;
                if let Err(e) = guard.synchronizer.push_event(event) {
                    log::debug!("[TIMELINE] late event dropped for {}: {}", active.id, e);
                }
            }
        })
    }

    /// Detached watchdog enforcing `max_duration_secs`. If the session was
    /// already stopped when the timer fires, the stop resolves to NotFound
    /// and is ignored.
    fn spawn_max_duration_watchdog(manager: Arc<Self>, session_id: &str, max_secs: u32) {
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_secs as u64)).await;
            match manager.stop(&session_id).await {
                Ok(_) => log::info!(
                    "[SESSION] {} stopped after reaching max duration ({}s)",
                    session_id,
                    max_secs
                ),
                Err(ZoomcastError::NotFound { .. }) | Err(ZoomcastError::InvalidState { .. }) => {}
                Err(e) => log::warn!("[SESSION] max-duration stop of {} failed: {}", session_id, e),
            }
        });
    }

    fn lookup(&self, session_id: &str) -> ZoomcastResult<Arc<ActiveSession>> {
        self.registry
            .get(session_id)
            .ok_or_else(|| ZoomcastError::not_found("Session", session_id))
    }
}
