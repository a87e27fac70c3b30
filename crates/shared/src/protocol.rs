use serde::{Deserialize, Serialize};

use crate::domain::{FileDownload, LogEntry, ProgressUpdate};

/// Named events pushed by the backend over the event channel. Wire form is
/// a JSON text frame `{"type": "<name>", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    LogMessage(LogEntry),
    ProgressUpdate(ProgressUpdate),
    FilesReady { files: Vec<FileDownload> },
    LogsCleared,
}

/// The narrow client-to-server emit surface of the event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    ClearLogs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogLevel, StepStatus};

    #[test]
    fn server_events_use_snake_case_names_and_payload_envelope() {
        let event = ServerEvent::LogMessage(LogEntry {
            timestamp: "12:00:01".to_string(),
            message: "questionnaire parsed".to_string(),
            level: LogLevel::Info,
            step: Some(2),
        });
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "log_message");
        assert_eq!(value["payload"]["message"], "questionnaire parsed");
        assert_eq!(value["payload"]["level"], "info");

        let event = ServerEvent::ProgressUpdate(ProgressUpdate {
            step: 5,
            status: StepStatus::Completed,
            progress: 100.0,
        });
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "progress_update");
        assert_eq!(value["payload"]["status"], "completed");
    }

    #[test]
    fn logs_cleared_carries_no_payload() {
        let value = serde_json::to_value(ServerEvent::LogsCleared).expect("serialize");
        assert_eq!(value["type"], "logs_cleared");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn files_ready_payload_wraps_file_list() {
        let raw = r#"{
            "type": "files_ready",
            "payload": {
                "files": [{
                    "name": "policy.docx",
                    "path": "output/policy.docx",
                    "size": "48 KB",
                    "type": "docx",
                    "artifact_id": "123"
                }]
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
        match event {
            ServerEvent::FilesReady { files } => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].file_type, "docx");
                assert_eq!(files[0].artifact_id.as_deref(), Some("123"));
                assert!(files[0].download_url.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn clear_logs_request_wire_name() {
        let text = serde_json::to_string(&ClientRequest::ClearLogs).expect("serialize");
        assert_eq!(text, r#"{"type":"clear_logs"}"#);
    }
}
