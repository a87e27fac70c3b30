use std::{collections::HashMap, fs, time::Duration};

use client_core::{
    ClientConfig, ReconnectPolicy, DEFAULT_FINAL_STEP, DEFAULT_LOG_CAPACITY, DEFAULT_SERVER_URL,
};

#[derive(Debug)]
pub struct Settings {
    pub server_url: String,
    pub final_step: u32,
    pub log_capacity: usize,
    pub request_timeout_seconds: u64,
    pub reconnect_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            final_step: DEFAULT_FINAL_STEP,
            log_capacity: DEFAULT_LOG_CAPACITY,
            request_timeout_seconds: 30,
            reconnect_seconds: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("dashboard.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("final_step").and_then(|v| v.parse().ok()) {
                settings.final_step = v;
            }
            if let Some(v) = file_cfg.get("log_capacity").and_then(|v| v.parse().ok()) {
                settings.log_capacity = v;
            }
            if let Some(v) = file_cfg
                .get("request_timeout_seconds")
                .and_then(|v| v.parse().ok())
            {
                settings.request_timeout_seconds = v;
            }
            if let Some(v) = file_cfg
                .get("reconnect_seconds")
                .and_then(|v| v.parse().ok())
            {
                settings.reconnect_seconds = Some(v);
            }
        }
    }

    if let Ok(v) = std::env::var("DASHBOARD_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("DASHBOARD_RECONNECT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_seconds = Some(parsed);
        }
    }

    if let Ok(v) = std::env::var("DASHBOARD_REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }

    settings
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: normalize_server_url(&self.server_url),
            final_step: self.final_step,
            log_capacity: self.log_capacity,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            reconnect: self.reconnect_seconds.map(|seconds| ReconnectPolicy {
                delay: Duration::from_secs(seconds),
                max_attempts: None,
            }),
        }
    }
}

fn normalize_server_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');

    if trimmed.is_empty() {
        return Settings::default().server_url;
    }

    if trimmed.contains("://") {
        return trimmed.to_string();
    }

    format!("http://{trimmed}")
}
