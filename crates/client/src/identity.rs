// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read the user identity out of an access token.
//!
//! The payload is decoded without verifying the signature; the server
//! remains the authority on validity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub name: String,
    pub username: String,
}

/// Claims the board backend puts in its access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    pub name: String,
    pub username: String,
    /// Expiry as epoch seconds.
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Decode the claims of a JWT-shaped token. Malformed input yields `None`.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    // Tolerate padded payloads from encoders that emit them.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn decode_user(token: &str) -> Option<AuthUser> {
    decode_claims(token).map(|c| AuthUser { name: c.name, username: c.username })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
