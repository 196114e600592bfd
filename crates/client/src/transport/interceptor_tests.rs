// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;

use super::*;
use crate::cookie::{CookiePolicy, MemoryCookieJar};
use crate::refresh::RefreshMode;
use crate::test_support::FakeBackend;
use crate::transport::HttpTransport;

const TIMEOUT: Duration = Duration::from_secs(5);
const SLOW_REFRESH: Duration = Duration::from_millis(300);

struct Harness {
    backend: FakeBackend,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    client: Arc<AuthClient>,
    events: Arc<Mutex<Vec<bool>>>,
}

fn wire(backend: &FakeBackend, store: &Arc<TokenStore>, proactive: bool, forbidden: bool) -> (Arc<RefreshCoordinator>, Arc<AuthClient>) {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&backend.url(), TIMEOUT));
    let coordinator = RefreshCoordinator::new(Arc::clone(store), Arc::clone(&transport), RefreshMode::Body);
    let client = AuthClient::new(
        transport,
        RequestInterceptor::new(Arc::clone(&coordinator), proactive),
        ResponseInterceptor::new(Arc::clone(&coordinator), forbidden),
    );
    (coordinator, Arc::new(client))
}

fn record(store: &TokenStore) -> Arc<Mutex<Vec<bool>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.set_listener(Arc::new(move |v| sink.lock().push(v)));
    events
}

async fn harness(proactive: bool, forbidden: bool) -> anyhow::Result<Harness> {
    let backend = FakeBackend::start().await?;
    backend.add_user("ada", "Ada Lovelace", "pw");
    let store = Arc::new(TokenStore::in_memory());
    store.set_tokens(&backend.issue("ada"))?;
    let events = record(&store);
    let (coordinator, client) = wire(&backend, &store, proactive, forbidden);
    Ok(Harness { backend, store, coordinator, client, events })
}

async fn logged_in() -> anyhow::Result<Harness> {
    harness(true, false).await
}

// -- Happy path ---------------------------------------------------------------

#[tokio::test]
async fn attaches_bearer_from_store() -> anyhow::Result<()> {
    let h = logged_in().await?;
    let boards: Value = h.client.get("/boards").await?;

    assert_eq!(boards[0]["title"], "Roadmap");
    assert_eq!(h.backend.accepted_tokens(), vec![h.store.access_token().unwrap_or_default()]);
    assert_eq!(h.backend.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_access_token_refreshes_and_replays() -> anyhow::Result<()> {
    let h = logged_in().await?;
    let stale = h.store.access_token();
    h.backend.expire_access_tokens();

    let created: Value = h.client.post("/boards", &serde_json::json!({ "title": "Q3" })).await?;

    assert_eq!(created["title"], "Q3");
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.backend.unauthorized_responses(), 1);
    assert_ne!(h.store.access_token(), stale);
    assert_eq!(h.backend.accepted_tokens(), vec![h.store.access_token().unwrap_or_default()]);
    Ok(())
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() -> anyhow::Result<()> {
    let h = logged_in().await?;
    h.backend.expire_access_tokens();
    h.backend.set_refresh_delay(SLOW_REFRESH);

    let results = join_all((0..10).map(|_| h.client.get::<Value>("/boards"))).await;

    for result in results {
        assert_eq!(result?[0]["id"], 1);
    }
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.backend.unauthorized_responses(), 10);
    let fresh = h.store.access_token().unwrap_or_default();
    let accepted = h.backend.accepted_tokens();
    assert_eq!(accepted.len(), 10);
    assert!(accepted.iter().all(|t| *t == fresh));
    assert!(!h.coordinator.is_refreshing());
    assert_eq!(h.coordinator.queued(), 0);
    Ok(())
}

#[tokio::test]
async fn request_after_restart_refreshes_before_dispatch() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    backend.add_user("ada", "Ada Lovelace", "pw");
    let jar = Arc::new(MemoryCookieJar::new());
    TokenStore::new(jar.clone(), CookiePolicy::default()).set_tokens(&backend.issue("ada"))?;

    let store = Arc::new(TokenStore::new(jar, CookiePolicy::default()));
    assert_eq!(store.access_token(), None);
    let (_, client) = wire(&backend, &store, true, false);

    let _: Value = client.get("/boards").await?;

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized_responses(), 0);
    Ok(())
}

#[tokio::test]
async fn restart_without_proactive_refresh_recovers_from_401() -> anyhow::Result<()> {
    let backend = FakeBackend::start().await?;
    backend.add_user("ada", "Ada Lovelace", "pw");
    let jar = Arc::new(MemoryCookieJar::new());
    TokenStore::new(jar.clone(), CookiePolicy::default()).set_tokens(&backend.issue("ada"))?;

    let store = Arc::new(TokenStore::new(jar, CookiePolicy::default()));
    let (_, client) = wire(&backend, &store, false, false);

    let _: Value = client.get("/boards").await?;

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized_responses(), 1);
    Ok(())
}

#[tokio::test]
async fn writes_recover_from_expired_access_token() -> anyhow::Result<()> {
    let h = logged_in().await?;
    h.backend.expire_access_tokens();

    let renamed: Value = h.client.put("/boards/1", &serde_json::json!({ "title": "Roadmap v2" })).await?;
    assert_eq!(renamed["title"], "Roadmap v2");
    assert_eq!(h.backend.refresh_calls(), 1);

    h.backend.expire_access_tokens();
    h.client.delete("/boards/1").await?;
    assert_eq!(h.backend.refresh_calls(), 2);
    assert_eq!(h.backend.unauthorized_responses(), 2);
    assert_eq!(h.backend.accepted_tokens().len(), 2);
    Ok(())
}

// -- Failure paths ------------------------------------------------------------

#[tokio::test]
async fn failed_refresh_rejects_everyone_and_logs_out_once() -> anyhow::Result<()> {
    let h = logged_in().await?;
    h.backend.expire_access_tokens();
    h.backend.revoke_refresh_tokens();
    h.backend.set_refresh_delay(SLOW_REFRESH);

    let results = join_all((0..6).map(|_| h.client.get::<Value>("/boards"))).await;

    for result in results {
        assert!(matches!(result, Err(AuthError::RefreshRejected { status: 401, .. })));
    }
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(*h.events.lock(), vec![false]);
    assert!(!h.store.has_tokens());
    assert_eq!(h.store.access_token(), None);
    Ok(())
}

#[tokio::test]
async fn replayed_request_is_not_retried_again() -> anyhow::Result<()> {
    let h = logged_in().await?;
    h.backend.set_reject_all(true);

    let result = h.client.get::<Value>("/boards").await;

    assert!(matches!(result, Err(AuthError::AuthenticationFailure { status: 401, .. })));
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.backend.unauthorized_responses(), 2);
    assert!(h.store.has_tokens());
    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_signs_out_without_refresh_call() -> anyhow::Result<()> {
    let h = logged_in().await?;
    h.store.clear_tokens();
    h.events.lock().clear();

    let result = h.client.get::<Value>("/boards").await;

    assert!(matches!(result, Err(AuthError::AuthenticationFailure { status: 401, .. })));
    assert_eq!(h.backend.refresh_calls(), 0);
    assert_eq!(*h.events.lock(), vec![false]);
    Ok(())
}

/// A store as it looks after a restart: refresh cookie only, and the
/// backend has since revoked it.
async fn reloaded_with_revoked_refresh() -> anyhow::Result<(FakeBackend, Arc<TokenStore>)> {
    let backend = FakeBackend::start().await?;
    backend.add_user("ada", "Ada Lovelace", "pw");
    let jar = Arc::new(MemoryCookieJar::new());
    TokenStore::new(jar.clone(), CookiePolicy::default()).set_tokens(&backend.issue("ada"))?;
    backend.revoke_refresh_tokens();
    Ok((backend, Arc::new(TokenStore::new(jar, CookiePolicy::default()))))
}

#[tokio::test]
async fn failed_proactive_refresh_surfaces_without_dispatch() -> anyhow::Result<()> {
    let (backend, store) = reloaded_with_revoked_refresh().await?;
    let events = record(&store);
    let (_, client) = wire(&backend, &store, true, false);

    let result = client.get::<Value>("/boards").await;

    assert!(matches!(result, Err(AuthError::RefreshRejected { status: 401, .. })));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized_responses(), 0);
    assert_eq!(*events.lock(), vec![false]);
    assert!(!store.has_tokens());
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_after_restart_log_out_once_on_revoked_refresh() -> anyhow::Result<()> {
    let (backend, store) = reloaded_with_revoked_refresh().await?;
    backend.set_refresh_delay(SLOW_REFRESH);
    let events = record(&store);
    let (coordinator, client) = wire(&backend, &store, true, false);

    let results = join_all((0..5).map(|_| client.get::<Value>("/boards"))).await;

    for result in results {
        assert!(matches!(result, Err(AuthError::RefreshRejected { status: 401, .. })));
    }
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized_responses(), 0);
    assert!(backend.accepted_tokens().is_empty());
    assert_eq!(*events.lock(), vec![false]);
    assert!(!coordinator.is_refreshing());
    Ok(())
}

#[tokio::test]
async fn failed_proactive_refresh_marks_request_retried() -> anyhow::Result<()> {
    let (backend, store) = reloaded_with_revoked_refresh().await?;
    let (coordinator, _) = wire(&backend, &store, true, false);
    let interceptor = RequestInterceptor::new(coordinator, true);

    let mut request = ApiRequest::get("/boards");
    let result = interceptor.intercept(&mut request).await;

    assert!(matches!(result, Err(AuthError::RefreshRejected { .. })));
    assert!(request.is_retried());
    assert_eq!(request.bearer(), None);
    Ok(())
}

#[tokio::test]
async fn non_auth_errors_pass_through() -> anyhow::Result<()> {
    let h = logged_in().await?;

    let result = h.client.send(ApiRequest::get("/missing")).await;

    assert!(matches!(result, Err(AuthError::Status { status: 404, .. })));
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(h.events.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn forbidden_is_auth_failure_only_when_configured() -> anyhow::Result<()> {
    let plain = harness(true, false).await?;
    plain.backend.set_forbidden(true);
    plain.backend.expire_access_tokens();
    let result = plain.client.get::<Value>("/boards").await;
    assert!(matches!(result, Err(AuthError::Status { status: 403, .. })));
    assert_eq!(plain.backend.refresh_calls(), 0);

    let conflated = harness(true, true).await?;
    conflated.backend.set_forbidden(true);
    conflated.backend.expire_access_tokens();
    let _: Value = conflated.client.get("/boards").await?;
    assert_eq!(conflated.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_skip_interception() -> anyhow::Result<()> {
    let h = logged_in().await?;

    let result = h.client.send(ApiRequest::get("/boards").anonymous()).await;

    assert!(matches!(result, Err(AuthError::AuthenticationFailure { .. })));
    assert!(h.backend.accepted_tokens().is_empty());
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(h.store.has_tokens());
    Ok(())
}

// -- Recovery decisions -------------------------------------------------------

#[tokio::test]
async fn recover_marks_request_retried() -> anyhow::Result<()> {
    let h = logged_in().await?;
    let failure = AuthError::AuthenticationFailure { status: 401, message: String::new() };
    let interceptor = ResponseInterceptor::new(Arc::clone(&h.coordinator), false);

    let mut request = ApiRequest::get("/boards");
    let token = interceptor.recover(&mut request, failure.clone()).await?;
    assert!(request.is_retried());
    assert_eq!(h.store.access_token(), Some(token));

    let again = interceptor.recover(&mut request, failure.clone()).await;
    assert_eq!(again, Err(failure));
    assert_eq!(h.backend.refresh_calls(), 1);
    Ok(())
}

#[yare::parameterized(
    unauthorized = { 401, false, true },
    forbidden_plain = { 403, false, false },
    forbidden_conflated = { 403, true, true },
    server_error = { 500, true, false },
)]
fn auth_failure_statuses(status: u16, conflate: bool, expected: bool) {
    let store = Arc::new(TokenStore::in_memory());
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new("http://127.0.0.1:1", TIMEOUT));
    let coordinator = RefreshCoordinator::new(store, transport, RefreshMode::Body);
    let interceptor = ResponseInterceptor::new(coordinator, conflate);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(interceptor.is_auth_failure(status), expected);
}
