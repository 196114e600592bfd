// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `board` command-line front end.
//!
//! Each invocation is a fresh session: only the refresh cookie carries
//! over, so protected commands start by refreshing the access token.

mod auth;
mod request;

use std::io::BufRead;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::bridge::Navigator;
use crate::config::ClientConfig;
use crate::session::AuthSession;

/// Command-line client for the board API.
#[derive(Debug, Parser)]
#[command(name = "board", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub config: ClientConfig,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "BOARD_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "BOARD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Signup {
        username: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Password (read from stdin when omitted)
        #[arg(long, env = "BOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Password confirmation (defaults to --password)
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign in and keep the session
    Login {
        username: String,
        /// Password (read from stdin when omitted)
        #[arg(long, env = "BOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Show the signed-in user
    Whoami,
    /// Exchange the refresh token for a new token pair
    Refresh,
    /// Send an authenticated request and print the response body
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path relative to the API URL, e.g. /boards
        path: String,
        /// JSON request body
        #[arg(long, short)]
        data: Option<String>,
    },
}

impl Command {
    /// Whether a lost session should send the user back to `board login`.
    fn requires_auth(&self) -> bool {
        matches!(self, Self::Whoami | Self::Refresh | Self::Request { .. })
    }
}

/// Reports logout redirects on stderr.
struct TerminalNavigator {
    protected: bool,
}

impl Navigator for TerminalNavigator {
    fn requires_auth(&self) -> bool {
        self.protected
    }

    fn replace(&self, _route: &str) {
        eprintln!("session ended: sign in again with `board login <username>`");
    }
}

/// Run a parsed command line. Returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let session = match AuthSession::open(cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 1;
        }
    };
    let navigator = Arc::new(TerminalNavigator { protected: cli.command.requires_auth() });
    let bridge = session.bridge(navigator);
    let _mounted = bridge.mount();

    match cli.command {
        Command::Signup { username, name, password, confirm_password } => {
            auth::signup(&session, username, name, password, confirm_password).await
        }
        Command::Login { username, password } => auth::login(&session, username, password).await,
        Command::Logout => auth::logout(&bridge),
        Command::Status => auth::status(&session, &bridge),
        Command::Whoami => auth::whoami(&session, &bridge).await,
        Command::Refresh => auth::refresh(&session).await,
        Command::Request { method, path, data } => {
            request::run(&session, &method, &path, data.as_deref()).await
        }
    }
}

/// Use the flag value, or read one line from stdin.
fn password_or_stdin(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']).to_owned();
    anyhow::ensure!(!line.is_empty(), "no password given (use --password or stdin)");
    Ok(line)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
