// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::api::{SignInRequest, SignUpRequest};
use crate::bridge::AuthStateBridge;
use crate::identity::decode_claims;
use crate::session::AuthSession;

use super::password_or_stdin;

pub(super) async fn signup(
    session: &AuthSession,
    username: String,
    name: String,
    password: Option<String>,
    confirm_password: Option<String>,
) -> i32 {
    let password = match password_or_stdin(password) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 2;
        }
    };
    let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
    let request = SignUpRequest { username, name, password, confirm_password };
    match session.api().sign_up(&request).await {
        Ok(()) => {
            println!("Account \"{}\" created. Sign in with `board login {}`.", request.username, request.username);
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

pub(super) async fn login(session: &AuthSession, username: String, password: Option<String>) -> i32 {
    let password = match password_or_stdin(password) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 2;
        }
    };
    match session.api().sign_in(&SignInRequest { username, password }).await {
        Ok(pair) => {
            match decode_claims(&pair.access_token) {
                Some(claims) => println!("Signed in as {} ({})", claims.name, claims.username),
                None => println!("Signed in"),
            }
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

pub(super) fn logout(bridge: &AuthStateBridge) -> i32 {
    bridge.sign_out();
    println!("Signed out");
    0
}

pub(super) fn status(session: &AuthSession, bridge: &AuthStateBridge) -> i32 {
    let state = if bridge.is_authenticated() { "signed in" } else { "signed out" };
    println!("{:<10}  {}", "API", session.config().api_url);
    println!("{:<10}  {}", "STATE DIR", session.config().resolved_state_dir().display());
    println!("{:<10}  {state}", "SESSION");
    0
}

pub(super) async fn whoami(session: &AuthSession, bridge: &AuthStateBridge) -> i32 {
    if !bridge.is_authenticated() {
        eprintln!("error: not signed in");
        return 1;
    }
    if session.store().access_token().is_none() {
        if let Err(e) = session.coordinator().refresh_access_token().await {
            eprintln!("error: {e}");
            return 1;
        }
    }
    let claims = session.store().access_token().as_deref().and_then(decode_claims);
    match claims {
        Some(claims) => {
            println!("{} ({})", claims.name, claims.username);
            0
        }
        None => {
            eprintln!("error: access token carries no identity");
            1
        }
    }
}

pub(super) async fn refresh(session: &AuthSession) -> i32 {
    match session.coordinator().refresh_access_token().await {
        Ok(_) => {
            println!("Session refreshed");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
