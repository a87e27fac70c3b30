//! Session view model: the single fold of channel events and user actions
//! into the dashboard's local state.

use shared::domain::{FileDownload, LogEntry, ProgressUpdate};

/// Client-local approximation of the backend's run state. It can drift
/// from backend truth when events are lost; a `status()` poll reconciles
/// it.
///
/// Transitions:
///   Idle    --start accepted-------------------> Running
///   Running --stop accepted--------------------> Idle
///   Running --progress(final step, completed)--> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running)
    }
}

/// All state derived from the event channel and user actions. Owned by one
/// `DashboardClient`; the render layer only ever sees clones.
#[derive(Debug, Clone)]
pub struct SessionState {
    connected: bool,
    logs: Vec<LogEntry>,
    progress: Option<ProgressUpdate>,
    files: Vec<FileDownload>,
    run_state: RunState,
    final_step: u32,
    log_capacity: usize,
}

impl SessionState {
    pub(crate) fn new(final_step: u32, log_capacity: usize) -> Self {
        Self {
            connected: false,
            logs: Vec::new(),
            progress: None,
            files: Vec::new(),
            run_state: RunState::Idle,
            final_step,
            log_capacity,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn progress(&self) -> Option<ProgressUpdate> {
        self.progress
    }

    pub fn files(&self) -> &[FileDownload] {
        &self.files
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn final_step(&self) -> u32 {
        self.final_step
    }

    /// Returns true when the flag actually flipped.
    pub(crate) fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }

    /// Appends in arrival order. Growth is bounded by the retention cap;
    /// the oldest entries go first.
    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > self.log_capacity {
            let excess = self.logs.len() - self.log_capacity;
            self.logs.drain(..excess);
        }
    }

    pub(crate) fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// Replaces the current progress wholesale. A completed final step
    /// while running is the only push-driven run-state transition; returns
    /// true when it fired.
    pub(crate) fn set_progress(&mut self, update: ProgressUpdate) -> bool {
        let finished = self.run_state.is_running() && update.is_terminal(self.final_step);
        self.progress = Some(update);
        if finished {
            self.run_state = RunState::Idle;
        }
        finished
    }

    pub(crate) fn replace_files(&mut self, files: Vec<FileDownload>) {
        self.files = files;
    }

    /// Returns true when the flag actually flipped.
    pub(crate) fn start_accepted(&mut self) -> bool {
        let changed = !self.run_state.is_running();
        self.run_state = RunState::Running;
        changed
    }

    /// Returns true when the flag actually flipped.
    pub(crate) fn stop_accepted(&mut self) -> bool {
        let changed = self.run_state.is_running();
        self.run_state = RunState::Idle;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{LogLevel, StepStatus};

    fn state() -> SessionState {
        SessionState::new(5, 100)
    }

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: "10:00:00".to_string(),
            message: message.to_string(),
            level: LogLevel::Info,
            step: None,
        }
    }

    fn file(name: &str) -> FileDownload {
        FileDownload {
            name: name.to_string(),
            path: format!("output/{name}"),
            size: "1 KB".to_string(),
            file_type: "docx".to_string(),
            download_url: None,
            artifact_id: None,
        }
    }

    #[test]
    fn logs_append_in_order_without_drops() {
        let mut state = state();
        for i in 0..10 {
            state.push_log(entry(&format!("line {i}")));
        }
        assert_eq!(state.logs().len(), 10);
        assert_eq!(state.logs()[0].message, "line 0");
        assert_eq!(state.logs()[9].message, "line 9");
    }

    #[test]
    fn clear_empties_logs_regardless_of_length() {
        let mut state = state();
        state.push_log(entry("a"));
        state.push_log(entry("b"));
        state.clear_logs();
        assert!(state.logs().is_empty());
        state.clear_logs();
        assert!(state.logs().is_empty());
    }

    #[test]
    fn retention_cap_evicts_oldest_first() {
        let mut state = SessionState::new(5, 3);
        for i in 0..5 {
            state.push_log(entry(&format!("line {i}")));
        }
        assert_eq!(state.logs().len(), 3);
        assert_eq!(state.logs()[0].message, "line 2");
        assert_eq!(state.logs()[2].message, "line 4");
    }

    #[test]
    fn progress_is_replaced_wholesale() {
        let mut state = state();
        state.set_progress(ProgressUpdate {
            step: 1,
            status: StepStatus::Active,
            progress: 10.0,
        });
        state.set_progress(ProgressUpdate {
            step: 3,
            status: StepStatus::Active,
            progress: 55.0,
        });
        let current = state.progress().expect("progress");
        assert_eq!(current.step, 3);
        assert_eq!(current.progress, 55.0);
    }

    #[test]
    fn completed_final_step_ends_the_run() {
        let mut state = state();
        state.start_accepted();
        let finished = state.set_progress(ProgressUpdate {
            step: 5,
            status: StepStatus::Completed,
            progress: 100.0,
        });
        assert!(finished);
        assert_eq!(state.run_state(), RunState::Idle);
    }

    #[test]
    fn non_terminal_progress_leaves_run_state_alone() {
        let mut state = state();
        state.start_accepted();

        let finished = state.set_progress(ProgressUpdate {
            step: 5,
            status: StepStatus::Active,
            progress: 90.0,
        });
        assert!(!finished);
        assert!(state.run_state().is_running());

        let finished = state.set_progress(ProgressUpdate {
            step: 4,
            status: StepStatus::Completed,
            progress: 80.0,
        });
        assert!(!finished);
        assert!(state.run_state().is_running());
    }

    #[test]
    fn terminal_progress_while_idle_does_not_report_a_transition() {
        let mut state = state();
        let finished = state.set_progress(ProgressUpdate {
            step: 5,
            status: StepStatus::Completed,
            progress: 100.0,
        });
        assert!(!finished);
        assert_eq!(state.run_state(), RunState::Idle);
    }

    #[test]
    fn files_ready_replaces_the_list() {
        let mut state = state();
        state.replace_files(vec![file("a.docx"), file("b.docx")]);
        state.replace_files(vec![file("c.docx")]);
        assert_eq!(state.files().len(), 1);
        assert_eq!(state.files()[0].name, "c.docx");
    }

    #[test]
    fn connection_flag_is_independent_of_run_state() {
        let mut state = state();
        state.start_accepted();
        state.set_connected(true);
        assert!(state.set_connected(false));
        assert!(state.run_state().is_running());
    }

    #[test]
    fn stop_accepted_only_reports_a_flip_when_running() {
        let mut state = state();
        assert!(!state.stop_accepted());
        assert!(state.start_accepted());
        assert!(!state.start_accepted());
        assert!(state.stop_accepted());
        assert_eq!(state.run_state(), RunState::Idle);
    }
}
