use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{DashboardClient, DashboardEvent, RunState};
use shared::domain::LogLevel;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

mod config;
mod render;

use config::load_settings;

/// Terminal dashboard for the policy document automation backend.
#[derive(Parser, Debug)]
struct Args {
    /// Base address of the automation backend.
    #[arg(long)]
    server_url: Option<String>,
    /// Skip the third-party generation API when starting a run.
    #[arg(long)]
    skip_api: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }

    let client = DashboardClient::new(settings.client_config())?;
    println!("policy automation dashboard ({})", client.config().server_url);

    if let Err(err) = client.connect().await {
        warn!(%err, "event channel unavailable");
        client
            .add_log(LogLevel::Error, format!("Event channel unavailable: {err}"))
            .await;
    }

    match client.status().await {
        Ok(status) => println!("{}", render::format_status(&status)),
        Err(err) => warn!(%err, "status poll failed"),
    }
    println!("commands: start [skip] | stop | status | progress | files | logs | clear | quit");

    let printer = spawn_event_printer(&client);
    run_command_loop(&client, args.skip_api).await?;

    printer.abort();
    client.disconnect().await;
    Ok(())
}

/// Live view: every state-change notification becomes one printed line.
fn spawn_event_printer(client: &Arc<DashboardClient>) -> JoinHandle<()> {
    let final_step = client.config().final_step;
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::LogAppended(entry)) => {
                    println!("{}", render::format_log_entry(&entry));
                }
                Ok(DashboardEvent::ProgressChanged(update)) => {
                    println!("{}", render::format_stepper(Some(update), final_step));
                }
                Ok(DashboardEvent::FilesChanged(files)) => {
                    println!("{} file(s) ready, type 'files' to list", files.len());
                }
                Ok(DashboardEvent::LogsCleared) => println!("log cleared"),
                Ok(DashboardEvent::ConnectionChanged(connected)) => {
                    if connected {
                        println!("event channel connected");
                    } else {
                        println!("event channel disconnected");
                    }
                }
                Ok(DashboardEvent::RunStateChanged(run_state)) => {
                    let label = match run_state {
                        RunState::Running => "running",
                        RunState::Idle => "idle",
                    };
                    println!("automation {label}");
                }
                Ok(DashboardEvent::ChannelError(message)) => {
                    warn!(%message, "event channel error");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn run_command_loop(client: &Arc<DashboardClient>, default_skip_api: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "start" => try_start(client, default_skip_api).await,
            "start skip" => try_start(client, true).await,
            "stop" => client.stop().await,
            "status" => match client.status().await {
                Ok(status) => println!("{}", render::format_status(&status)),
                Err(err) => println!("status unavailable: {err:#}"),
            },
            "progress" => {
                let snapshot = client.snapshot().await;
                println!(
                    "{}",
                    render::format_stepper(snapshot.progress(), snapshot.final_step())
                );
            }
            "files" => {
                let snapshot = client.snapshot().await;
                if snapshot.files().is_empty() {
                    println!("no files ready");
                }
                for file in snapshot.files() {
                    println!(
                        "{} ({}, {}) -> {}",
                        file.name,
                        file.file_type,
                        file.size,
                        client.download_url(file)
                    );
                }
            }
            "logs" => {
                let snapshot = client.snapshot().await;
                for entry in snapshot.logs() {
                    println!("{}", render::format_log_entry(entry));
                }
            }
            "clear" => {
                if let Err(err) = client.clear_logs().await {
                    println!("clear failed: {err:#}");
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    Ok(())
}

/// The start action is gated on the backend readiness snapshot, the same
/// AND-of-preconditions a start button would use.
async fn try_start(client: &Arc<DashboardClient>, skip_api: bool) {
    match client.status().await {
        Ok(status) if status.start_allowed() => client.start(skip_api).await,
        Ok(status) => {
            let reason = if status.automation_running {
                "a run is already active"
            } else if !status.policy_exists {
                "policy template is missing"
            } else if !status.questionnaire_exists {
                "questionnaire is missing"
            } else {
                "generation API key is not configured"
            };
            client
                .add_log(LogLevel::Warning, format!("Start unavailable: {reason}"))
                .await;
        }
        Err(err) => {
            client
                .add_log(LogLevel::Error, format!("Cannot check backend status: {err:#}"))
                .await;
        }
    }
}
