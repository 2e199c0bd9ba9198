//! Command dispatch.

use std::sync::Arc;

use super::types::{Command, CommandResponse, ResponsePayload};
use crate::error::ZoomcastResult;
use crate::session::manager::RecordingSessionManager;

/// Dispatches control-surface commands to the session and storage managers.
pub struct CommandHandler {
    manager: Arc<RecordingSessionManager>,
}

impl CommandHandler {
    pub fn new(manager: Arc<RecordingSessionManager>) -> Self {
        Self { manager }
    }

    /// Handle one command. Never panics and never returns partial payloads:
    /// failures collapse to a success flag plus a short reason.
    pub async fn handle(&self, command: Command) -> CommandResponse {
        match self.dispatch(command).await {
            Ok(payload) => CommandResponse::ok(payload),
            Err(e) => {
                log::debug!("[COMMANDS] request failed: {}", e);
                CommandResponse::failure(&e)
            }
        }
    }

    async fn dispatch(&self, command: Command) -> ZoomcastResult<ResponsePayload> {
        match command {
            Command::StartRecording { target, settings } => {
                let session_id = Arc::clone(&self.manager).start(target, settings).await?;
                Ok(ResponsePayload::Started { session_id })
            }
            Command::PauseRecording { session_id } => {
                let state = self.manager.pause(&session_id).await?;
                Ok(ResponsePayload::StateChanged { session_id, state })
            }
            Command::ResumeRecording { session_id } => {
                let state = self.manager.resume(&session_id).await?;
                Ok(ResponsePayload::StateChanged { session_id, state })
            }
            Command::StopRecording { session_id } => {
                let outcome = self.manager.stop(&session_id).await?;
                Ok(ResponsePayload::Stopped(outcome))
            }
            Command::GetRecordingState => {
                Ok(ResponsePayload::RecordingState(self.manager.state_report().await))
            }
            Command::SaveProject { project } => {
                let saved = self.manager.storage().save_project(*project)?;
                Ok(ResponsePayload::Project(Box::new(saved)))
            }
            Command::LoadProject { project_id } => {
                let project = self.manager.storage().load_project(&project_id)?;
                Ok(ResponsePayload::Project(Box::new(project)))
            }
            Command::DeleteProject { project_id } => {
                self.manager.storage().delete_project(&project_id)?;
                Ok(ResponsePayload::Deleted { project_id })
            }
            Command::ExportProject { project_id, format } => {
                let bundle = self.manager.storage().export_project(&project_id, format)?;
                Ok(ResponsePayload::Export(bundle))
            }
            Command::ListProjects => {
                let projects = self.manager.storage().list_projects()?;
                Ok(ResponsePayload::Projects { projects })
            }
            Command::DuplicateProject { project_id } => {
                let copy = self.manager.storage().duplicate_project(&project_id)?;
                Ok(ResponsePayload::Project(Box::new(copy)))
            }
            Command::GetStorageStats => Ok(ResponsePayload::Storage {
                stats: self.manager.storage().storage_stats()?,
                cleanup: self.manager.storage().cleanup_stats()?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{CaptureScript, ScriptedCapture, ScriptedTracker};
    use crate::clock::ManualClock;
    use crate::config::{RetentionConfig, SessionConfig};
    use crate::session::types::{CaptureTarget, RecordingSettings};
    use crate::storage::types::ExportFormat;
    use crate::storage::{MemoryRecordStore, StorageLifecycleManager};

    struct Harness {
        handler: CommandHandler,
        capture: Arc<ScriptedCapture>,
        clock: Arc<ManualClock>,
    }

    fn harness(script: CaptureScript) -> Harness {
        let clock = ManualClock::new();
        let capture = ScriptedCapture::new(script);
        let tracker = ScriptedTracker::new();
        let store = Arc::new(MemoryRecordStore::new(1 << 24));
        let storage = Arc::new(StorageLifecycleManager::new(
            store,
            RetentionConfig::default(),
            clock.clone(),
        ));
        let manager = Arc::new(RecordingSessionManager::new(
            clock.clone(),
            capture.clone(),
            tracker,
            storage,
            SessionConfig::default(),
        ));
        Harness {
            handler: CommandHandler::new(manager),
            capture,
            clock,
        }
    }

    fn started_id(response: &CommandResponse) -> String {
        match response.payload {
            Some(ResponsePayload::Started { ref session_id }) => session_id.clone(),
            ref other => panic!("expected Started payload, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_command_round_trip() {
        let h = harness(CaptureScript::Accept);

        let started = h
            .handler
            .handle(Command::StartRecording {
                target: CaptureTarget::Tab { tab_id: 1 },
                settings: RecordingSettings::default(),
            })
            .await;
        assert!(started.success);
        assert!(started.error.is_none());
        let session_id = started_id(&started);

        h.capture.emit_chunk(0, &[5; 24]);
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let state = h.handler.handle(Command::GetRecordingState).await;
        match state.payload {
            Some(ResponsePayload::RecordingState(ref report)) => {
                assert!(report.is_recording);
                assert_eq!(report.sessions.len(), 1);
            }
            ref other => panic!("expected RecordingState payload, got {:?}", other),
        }

        h.clock.set(6_000);
        let stopped = h
            .handler
            .handle(Command::StopRecording {
                session_id: session_id.clone(),
            })
            .await;
        assert!(stopped.success);
        let project_id = match stopped.payload {
            Some(ResponsePayload::Stopped(ref outcome)) => {
                assert_eq!(outcome.duration_ms, 6_000);
                outcome.project_id.clone().unwrap()
            }
            ref other => panic!("expected Stopped payload, got {:?}", other),
        };

        // Round trip through the project commands.
        let loaded = h
            .handler
            .handle(Command::LoadProject {
                project_id: project_id.clone(),
            })
            .await;
        assert!(loaded.success);

        let listed = h.handler.handle(Command::ListProjects).await;
        match listed.payload {
            Some(ResponsePayload::Projects { ref projects }) => {
                assert_eq!(projects.len(), 1);
                assert_eq!(projects[0].id, project_id);
            }
            ref other => panic!("expected Projects payload, got {:?}", other),
        }

        let exported = h
            .handler
            .handle(Command::ExportProject {
                project_id: project_id.clone(),
                format: ExportFormat::Raw,
            })
            .await;
        assert!(exported.success);
        match exported.payload {
            Some(ResponsePayload::Export(ref bundle)) => assert_eq!(bundle.data.len(), 24),
            ref other => panic!("expected Export payload, got {:?}", other),
        }

        let deleted = h
            .handler
            .handle(Command::DeleteProject {
                project_id: project_id.clone(),
            })
            .await;
        assert!(deleted.success);

        let reloaded = h.handler.handle(Command::LoadProject { project_id }).await;
        assert!(!reloaded.success);
        assert!(reloaded.payload.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_return_flag_and_reason_without_payload() {
        let h = harness(CaptureScript::Deny);

        let denied = h
            .handler
            .handle(Command::StartRecording {
                target: CaptureTarget::Tab { tab_id: 2 },
                settings: RecordingSettings::default(),
            })
            .await;
        assert!(!denied.success);
        assert!(denied.payload.is_none());
        assert!(denied.error.as_deref().unwrap().contains("permission denied"));

        let missing = h
            .handler
            .handle(Command::PauseRecording {
                session_id: "rec_nope".to_string(),
            })
            .await;
        assert!(!missing.success);
        assert!(missing.error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_stats_command() {
        let h = harness(CaptureScript::Accept);

        let response = h.handler.handle(Command::GetStorageStats).await;
        assert!(response.success);
        match response.payload {
            Some(ResponsePayload::Storage { ref stats, ref cleanup }) => {
                assert_eq!(stats.project_count, 0);
                assert_eq!(cleanup.runs, 0);
            }
            ref other => panic!("expected Storage payload, got {:?}", other),
        }
    }

    #[test]
    fn test_command_wire_format() {
        let json = r#"{
            "action": "STOP_RECORDING",
            "sessionId": "rec_abc123"
        }"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(
            command,
            Command::StopRecording { ref session_id } if session_id == "rec_abc123"
        ));

        let start = r#"{
            "action": "START_RECORDING",
            "target": { "type": "tab", "tabId": 4 },
            "settings": {
                "fps": 30,
                "quality": 80,
                "zoom": { "mode": "auto", "scale": 2.0 },
                "captureCursor": true,
                "maxDurationSecs": null
            }
        }"#;
        let command: Command = serde_json::from_str(start).unwrap();
        assert!(matches!(command, Command::StartRecording { .. }));
    }

    #[test]
    fn test_response_wire_format() {
        let response = CommandResponse::ok(ResponsePayload::Started {
            session_id: "rec_x".to_string(),
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"sessionId\":\"rec_x\""));

        let failure = CommandResponse::failure(&crate::error::ZoomcastError::not_found(
            "Project", "p1",
        ));
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("Project not found: p1"));
    }
}
