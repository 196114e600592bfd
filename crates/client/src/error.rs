// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Failure taxonomy of the authenticated client.
///
/// Cloneable so a single refresh outcome can be handed to every request
/// waiting on that refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A refresh was needed but no refresh token is stored.
    NoRefreshToken,
    /// The refresh endpoint answered with a non-2xx status.
    RefreshRejected { status: u16, message: String },
    /// A protected request was rejected as unauthenticated.
    AuthenticationFailure { status: u16, message: String },
    /// Any other non-2xx response.
    Status { status: u16, message: String },
    /// Network error, timeout, or an aborted refresh task.
    Transport(String),
    /// The response body could not be parsed.
    Decode(String),
    /// The refresh cookie could not be persisted.
    Storage(String),
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::RefreshRejected { .. } => "REFRESH_REJECTED",
            Self::AuthenticationFailure { .. } => "UNAUTHENTICATED",
            Self::Status { .. } => "REQUEST_FAILED",
            Self::Transport(_) => "TRANSPORT",
            Self::Decode(_) => "DECODE",
            Self::Storage(_) => "STORAGE",
        }
    }

    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RefreshRejected { status, .. }
            | Self::AuthenticationFailure { status, .. }
            | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error ends the session when it comes out of a refresh.
    pub fn is_terminal_logout(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::RefreshRejected { .. })
    }

    /// Build the error for a non-2xx response, pulling `message` out of a
    /// JSON error body when the server sent one.
    pub fn from_response(status: u16, body: &[u8], auth_failure: bool) -> Self {
        let message = error_message(body);
        if auth_failure {
            Self::AuthenticationFailure { status, message }
        } else {
            Self::Status { status, message }
        }
    }
}

pub(crate) fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_owned();
        }
    }
    String::from_utf8_lossy(body).trim().to_owned()
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => f.write_str("no refresh token stored"),
            Self::RefreshRejected { status, message } => {
                write!(f, "refresh failed ({status}): {message}")
            }
            Self::AuthenticationFailure { status, message } => {
                write!(f, "not authenticated ({status}): {message}")
            }
            Self::Status { status, message } => write!(f, "request failed ({status}): {message}"),
            Self::Transport(e) => write!(f, "request failed: {e}"),
            Self::Decode(e) => write!(f, "invalid response: {e}"),
            Self::Storage(e) => write!(f, "token storage: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
