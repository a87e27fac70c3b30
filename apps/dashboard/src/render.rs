//! Pure snapshot renderers for the terminal front-end. No state of their
//! own: every function maps plain view-model data to a printable string.

use shared::domain::{LogEntry, LogLevel, ProgressUpdate, StepStatus, SystemStatus};

pub fn format_log_entry(entry: &LogEntry) -> String {
    let level = match entry.level {
        LogLevel::Info => "INFO",
        LogLevel::Success => "OK",
        LogLevel::Error => "ERROR",
        LogLevel::Warning => "WARN",
    };
    match entry.step {
        Some(step) => format!("[{}] {:5} (step {step}) {}", entry.timestamp, level, entry.message),
        None => format!("[{}] {:5} {}", entry.timestamp, level, entry.message),
    }
}

/// One-line stepper: done steps are filled, the current step shows its
/// status, later steps are hollow.
pub fn format_stepper(progress: Option<ProgressUpdate>, final_step: u32) -> String {
    let Some(current) = progress else {
        return format!("[{}] not started", "○ ".repeat(final_step as usize).trim_end());
    };

    let mut marks = Vec::with_capacity(final_step as usize);
    for step in 1..=final_step {
        let mark = if step < current.step {
            '●'
        } else if step == current.step {
            match current.status {
                StepStatus::Completed => '●',
                StepStatus::Active => '◐',
                StepStatus::Error => '✗',
                StepStatus::Pending => '○',
            }
        } else {
            '○'
        };
        marks.push(mark.to_string());
    }

    format!(
        "[{}] step {}/{final_step} ({:.0}%)",
        marks.join(" "),
        current.step,
        current.progress
    )
}

pub fn format_status(status: &SystemStatus) -> String {
    let flag = |present: bool| if present { "yes" } else { "no" };
    [
        format!("policy template:  {} ({})", flag(status.policy_exists), status.policy_file),
        format!(
            "questionnaire:    {} ({})",
            flag(status.questionnaire_exists),
            status.questionnaire_file
        ),
        format!("api key:          {}", flag(status.api_key_configured)),
        format!("skip-api mode:    {}", flag(status.skip_api)),
        format!("automation:       {}", if status.automation_running { "running" } else { "idle" }),
        format!("start available:  {}", flag(status.start_allowed())),
    ]
    .join("\n")
}
