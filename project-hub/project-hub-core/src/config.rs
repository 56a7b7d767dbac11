//! Hub configuration, loaded from an optional JSON file and overridden by
//! `PROJECT_HUB_*` environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Base window title; the open document's name is appended in brackets.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Sign-in driven restarts allowed within one save or open sequence.
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts: u32,

    /// Reject a save while another one is running instead of only logging it.
    #[serde(default)]
    pub exclusive_saves: bool,

    #[serde(default = "default_true")]
    pub convert_legacy_milestones: bool,

    #[serde(default)]
    pub reset_earliest_start: bool,

    /// Re-open the document silently when its content changes in the store.
    #[serde(default = "default_true")]
    pub reopen_on_change: bool,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_app_title() -> String {
    "Project Hub".to_string()
}

fn default_max_auth_attempts() -> u32 {
    3
}

fn default_recent_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            app_title: default_app_title(),
            max_auth_attempts: default_max_auth_attempts(),
            exclusive_saves: false,
            convert_legacy_milestones: true,
            reset_earliest_start: false,
            reopen_on_change: true,
            recent_limit: default_recent_limit(),
        }
    }
}

impl HubConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(title) = lookup("PROJECT_HUB_APP_TITLE") {
            self.app_title = title;
        }
        if let Some(v) = lookup("PROJECT_HUB_MAX_AUTH_ATTEMPTS") {
            self.max_auth_attempts = v.parse().context("PROJECT_HUB_MAX_AUTH_ATTEMPTS")?;
        }
        if let Some(v) = lookup("PROJECT_HUB_EXCLUSIVE_SAVES") {
            self.exclusive_saves = parse_flag(&v).context("PROJECT_HUB_EXCLUSIVE_SAVES")?;
        }
        if let Some(v) = lookup("PROJECT_HUB_CONVERT_LEGACY_MILESTONES") {
            self.convert_legacy_milestones =
                parse_flag(&v).context("PROJECT_HUB_CONVERT_LEGACY_MILESTONES")?;
        }
        if let Some(v) = lookup("PROJECT_HUB_RESET_EARLIEST_START") {
            self.reset_earliest_start =
                parse_flag(&v).context("PROJECT_HUB_RESET_EARLIEST_START")?;
        }
        if let Some(v) = lookup("PROJECT_HUB_REOPEN_ON_CHANGE") {
            self.reopen_on_change = parse_flag(&v).context("PROJECT_HUB_REOPEN_ON_CHANGE")?;
        }
        if let Some(v) = lookup("PROJECT_HUB_RECENT_LIMIT") {
            self.recent_limit = v.parse().context("PROJECT_HUB_RECENT_LIMIT")?;
        }
        Ok(())
    }

    /// Title shown while `document_name` is open.
    pub fn title_for(&self, document_name: &str) -> String {
        format!("{} [{}]", self.app_title, document_name)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
