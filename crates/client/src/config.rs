// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::refresh::RefreshMode;

/// Connection and session settings for the board API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the board API.
    #[arg(long, default_value = "http://localhost:8080", env = "BOARD_API_URL")]
    pub api_url: String,

    /// Directory holding the persisted refresh cookie.
    #[arg(long, env = "BOARD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Lifetime of the refresh cookie in days.
    #[arg(long, default_value_t = 7, env = "BOARD_REFRESH_TTL_DAYS")]
    pub refresh_ttl_days: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "BOARD_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// How the refresh token is presented to /auth/refresh.
    #[arg(long, value_enum, default_value_t = RefreshMode::Body, env = "BOARD_REFRESH_MODE")]
    pub refresh_mode: RefreshMode,

    /// Treat 403 like 401 (for backends that answer expired tokens with 403).
    #[arg(long, env = "BOARD_REAUTH_ON_FORBIDDEN")]
    pub reauth_on_forbidden: bool,

    /// Do not refresh before sending when only a refresh token is held.
    #[arg(long, env = "BOARD_NO_PROACTIVE_REFRESH")]
    pub no_proactive_refresh: bool,
}

impl ClientConfig {
    /// Defaults pointed at `api_url`, for tests and embedding.
    pub fn for_url(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_owned(),
            state_dir: None,
            refresh_ttl_days: 7,
            timeout_secs: 30,
            refresh_mode: RefreshMode::Body,
            reauth_on_forbidden: false,
            no_proactive_refresh: false,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http(s) URL: {}", self.api_url);
        }
        if self.refresh_ttl_days == 0 {
            anyhow::bail!("--refresh-ttl-days must be at least 1");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_days.saturating_mul(24 * 60 * 60))
    }

    pub fn proactive_refresh(&self) -> bool {
        !self.no_proactive_refresh
    }

    /// Resolve the state directory: `--state-dir`, then
    /// `$XDG_STATE_HOME/board`, then `$HOME/.local/state/board`.
    pub fn resolved_state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
            if !dir.is_empty() {
                return PathBuf::from(dir).join("board");
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/board");
        }
        PathBuf::from(".board")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
