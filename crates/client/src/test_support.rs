// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake of the board backend's auth surface.
//!
//! Serves `/auth/signup`, `/auth/signin`, `/auth/refresh` and protected
//! `/boards` and `/boards/{id}` resources on an ephemeral port. Switches let tests expire access
//! tokens, revoke refresh tokens, slow down refreshes, and answer 403
//! instead of 401. Counters record what the client actually did.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::token::TokenPair;

/// What a single `/auth/refresh` call presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCall {
    pub body_token: Option<String>,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
struct User {
    name: String,
    password: String,
}

#[derive(Default)]
struct BackendState {
    users: Mutex<HashMap<String, User>>,
    access: Mutex<HashMap<String, String>>,
    refresh: Mutex<HashMap<String, String>>,
    seq: AtomicU64,
    refresh_delay_ms: AtomicU64,
    forbidden: AtomicBool,
    reject_all: AtomicBool,
    refresh_calls: AtomicU32,
    signin_calls: AtomicU32,
    unauthorized: AtomicU32,
    refresh_log: Mutex<Vec<RefreshCall>>,
    accepted: Mutex<Vec<String>>,
}

impl BackendState {
    fn issue(&self, username: &str) -> TokenPair {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let name = self.users.lock().get(username).map(|u| u.name.clone()).unwrap_or_default();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = json!({
            "sub": username,
            "username": username,
            "name": name,
            "jti": seq,
            "exp": 4_102_444_800u64,
        });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let access_token = format!("{header}.{payload}.sig{seq}");
        let refresh_token = format!("refresh-{username}-{seq}");
        self.access.lock().insert(access_token.clone(), username.to_owned());
        self.refresh.lock().insert(refresh_token.clone(), username.to_owned());
        TokenPair { access_token, refresh_token }
    }

    fn reject(&self) -> Response {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
        let status = if self.forbidden.load(Ordering::Relaxed) {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        (status, Json(json!({ "message": "access token expired" }))).into_response()
    }

    /// Returns the bearer token when it grants access.
    fn authorize(&self, headers: &HeaderMap) -> Option<String> {
        let token = bearer(headers)?;
        if self.reject_all.load(Ordering::Relaxed) || !self.access.lock().contains_key(&token) {
            return None;
        }
        self.accepted.lock().push(token.clone());
        Some(token)
    }
}

/// A running fake backend. The server task stops when this is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/auth/signup", post(signup))
            .route("/auth/signin", post(signin))
            .route("/auth/refresh", post(refresh))
            .route("/boards", get(list_boards).post(create_board))
            .route("/boards/{id}", put(update_board).delete(delete_board))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, state, handle })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn add_user(&self, username: &str, name: &str, password: &str) {
        self.state.users.lock().insert(
            username.to_owned(),
            User { name: name.to_owned(), password: password.to_owned() },
        );
    }

    /// Mint a valid pair for `username` without going through sign-in.
    pub fn issue(&self, username: &str) -> TokenPair {
        self.state.issue(username)
    }

    /// Invalidate every access token issued so far.
    pub fn expire_access_tokens(&self) {
        self.state.access.lock().clear();
    }

    /// Invalidate every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.state.refresh.lock().clear();
    }

    /// Hold each refresh response for `delay` before answering.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(ms, Ordering::Relaxed);
    }

    /// Answer rejected access tokens with 403 instead of 401.
    pub fn set_forbidden(&self, forbidden: bool) {
        self.state.forbidden.store(forbidden, Ordering::Relaxed);
    }

    /// Reject every protected request, even with a fresh token.
    pub fn set_reject_all(&self, reject: bool) {
        self.state.reject_all.store(reject, Ordering::Relaxed);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::Relaxed)
    }

    pub fn signin_calls(&self) -> u32 {
        self.state.signin_calls.load(Ordering::Relaxed)
    }

    /// Number of 401/403 answers sent by protected routes.
    pub fn unauthorized_responses(&self) -> u32 {
        self.state.unauthorized.load(Ordering::Relaxed)
    }

    pub fn refresh_log(&self) -> Vec<RefreshCall> {
        self.state.refresh_log.lock().clone()
    }

    /// Bearer tokens of every protected request that was accepted.
    pub fn accepted_tokens(&self) -> Vec<String> {
        self.state.accepted.lock().clone()
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.state.users.lock().contains_key(username)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

fn field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn signup(State(state): State<Arc<BackendState>>, body: Bytes) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (Some(username), Some(name), Some(password), Some(confirm)) = (
        field(&body, "username"),
        field(&body, "name"),
        field(&body, "password"),
        field(&body, "confirmPassword"),
    ) else {
        return error(StatusCode::BAD_REQUEST, "missing field");
    };
    if password != confirm {
        return error(StatusCode::BAD_REQUEST, "passwords do not match");
    }
    let mut users = state.users.lock();
    if users.contains_key(&username) {
        return error(StatusCode::CONFLICT, "username already exists");
    }
    users.insert(username, User { name, password });
    StatusCode::CREATED.into_response()
}

async fn signin(State(state): State<Arc<BackendState>>, body: Bytes) -> Response {
    state.signin_calls.fetch_add(1, Ordering::Relaxed);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let username = field(&body, "username").unwrap_or_default();
    let password = field(&body, "password").unwrap_or_default();
    let valid = state.users.lock().get(&username).is_some_and(|u| u.password == password);
    if !valid {
        return error(StatusCode::UNAUTHORIZED, "invalid credentials");
    }
    Json(state.issue(&username)).into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, headers: HeaderMap, body: Bytes) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::Relaxed);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let call = RefreshCall { body_token: field(&body, "refreshToken"), bearer: bearer(&headers) };
    state.refresh_log.lock().push(call.clone());

    let delay = state.refresh_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    // Refresh tokens rotate: each one is good for a single exchange.
    let presented = [call.body_token, call.bearer];
    let owner = {
        let mut refresh = state.refresh.lock();
        presented.iter().flatten().find_map(|t| refresh.remove(t))
    };
    match owner {
        Some(username) => Json(state.issue(&username)).into_response(),
        None => error(StatusCode::UNAUTHORIZED, "refresh token expired"),
    }
}

async fn list_boards(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if state.authorize(&headers).is_none() {
        return state.reject();
    }
    Json(json!([{ "id": 1, "title": "Roadmap" }])).into_response()
}

async fn create_board(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.authorize(&headers).is_none() {
        return state.reject();
    }
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (StatusCode::CREATED, Json(json!({ "id": 2, "title": body.get("title") }))).into_response()
}

async fn update_board(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.authorize(&headers).is_none() {
        return state.reject();
    }
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({ "id": id, "title": body.get("title") })).into_response()
}

async fn delete_board(
    State(state): State<Arc<BackendState>>,
    Path(_id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if state.authorize(&headers).is_none() {
        return state.reject();
    }
    StatusCode::NO_CONTENT.into_response()
}
