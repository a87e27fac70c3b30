use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

/// One line of the session log. Immutable once appended; ordering is
/// append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

/// Current position in the automation's fixed step sequence. Each update
/// fully replaces the previous one; no history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub step: u32,
    pub status: StepStatus,
    pub progress: f64,
}

impl ProgressUpdate {
    /// A completed terminal step ends the run from the client's
    /// perspective.
    pub fn is_terminal(&self, final_step: u32) -> bool {
        self.step == final_step && self.status == StepStatus::Completed
    }
}

/// One generated artifact ready for retrieval. `size` is the backend's
/// human-readable rendering, not a byte count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDownload {
    pub name: String,
    pub path: String,
    pub size: String,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

/// Snapshot of backend readiness returned by `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub policy_exists: bool,
    pub questionnaire_exists: bool,
    pub api_key_configured: bool,
    pub skip_api: bool,
    pub automation_running: bool,
    pub policy_file: String,
    pub questionnaire_file: String,
}

impl SystemStatus {
    /// Start is allowed only when every input the automation needs is
    /// present and no run is already active. A missing API key is
    /// acceptable in skip-api mode.
    pub fn start_allowed(&self) -> bool {
        self.policy_exists
            && self.questionnaire_exists
            && (self.api_key_configured || self.skip_api)
            && !self.automation_running
    }
}
