// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-aware request pipeline.
//!
//! [`RequestInterceptor`] attaches the bearer token on the way out.
//! [`ResponseInterceptor`] turns an authentication failure into at most one
//! refresh-and-replay per request. [`AuthClient`] wires both around a plain
//! [`Transport`].

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::refresh::RefreshCoordinator;
use crate::token::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub struct RequestInterceptor {
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    proactive: bool,
}

impl RequestInterceptor {
    pub fn new(coordinator: Arc<RefreshCoordinator>, proactive: bool) -> Self {
        Self { store: Arc::clone(coordinator.store()), coordinator, proactive }
    }

    /// Attach `Authorization: Bearer <access>` when an access token is held.
    ///
    /// With proactive refresh enabled, a request issued while only the
    /// refresh token survives (e.g. right after a restart) first waits for a
    /// refresh. If that refresh fails the session is already over: the
    /// request is marked retried and the refresh error is returned so the
    /// caller does not dispatch it.
    pub async fn intercept(&self, request: &mut ApiRequest) -> Result<(), AuthError> {
        if self.proactive && self.store.access_token().is_none() && self.store.has_tokens() {
            debug!(path = %request.path, "no access token, refreshing before dispatch");
            if let Err(e) = self.coordinator.refresh_access_token().await {
                warn!(path = %request.path, "proactive refresh failed: {e}");
                request.mark_retried();
                return Err(e);
            }
        }
        if let Some(token) = self.store.access_token() {
            request.set_bearer(&token);
        }
        Ok(())
    }
}

pub struct ResponseInterceptor {
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    reauth_on_forbidden: bool,
}

impl ResponseInterceptor {
    pub fn new(coordinator: Arc<RefreshCoordinator>, reauth_on_forbidden: bool) -> Self {
        Self { store: Arc::clone(coordinator.store()), coordinator, reauth_on_forbidden }
    }

    /// 401 always; 403 only for backends that use it for expired tokens.
    pub fn is_auth_failure(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
            || (self.reauth_on_forbidden && status == StatusCode::FORBIDDEN)
    }

    /// Decide what to do with a failed request.
    ///
    /// Returns the access token to replay with, or the error to surface.
    /// Only an authentication failure on a request that has not been retried
    /// yet can be recovered; the request is marked retried before anything
    /// else happens, so it is replayed at most once.
    pub async fn recover(&self, request: &mut ApiRequest, failure: AuthError) -> Result<String, AuthError> {
        if !matches!(failure, AuthError::AuthenticationFailure { .. }) || request.is_retried() {
            return Err(failure);
        }
        request.mark_retried();

        if let Some(waiter) = self.coordinator.enqueue_if_refreshing() {
            debug!(path = %request.path, "refresh in flight, queueing request");
            return waiter
                .await
                .unwrap_or_else(|_| Err(AuthError::Transport("refresh abandoned".to_owned())));
        }

        if !self.store.has_tokens() {
            warn!(path = %request.path, "authentication failed without a refresh token, signing out");
            self.store.clear_tokens();
            return Err(failure);
        }

        debug!(path = %request.path, "authentication failed, refreshing");
        self.coordinator.refresh_access_token().await
    }
}

/// HTTP client that attaches tokens and recovers from expired ones.
pub struct AuthClient {
    transport: Arc<dyn Transport>,
    request: RequestInterceptor,
    response: ResponseInterceptor,
}

impl AuthClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        request: RequestInterceptor,
        response: ResponseInterceptor,
    ) -> Self {
        Self { transport, request, response }
    }

    /// Send a request. Non-2xx responses come back as errors.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, AuthError> {
        if request.is_anonymous() {
            return self.dispatch(&request).await;
        }

        self.request.intercept(&mut request).await?;
        let failure = match self.dispatch(&request).await {
            Ok(resp) => return Ok(resp),
            Err(e) => e,
        };

        let token = self.response.recover(&mut request, failure).await?;
        request.set_bearer(&token);
        debug!(path = %request.path, "replaying request with refreshed token");
        self.dispatch(&request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, AuthError> {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, AuthError> {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), AuthError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let resp = self.transport.execute(request).await?;
        if resp.is_success() {
            return Ok(resp);
        }
        let auth_failure = self.response.is_auth_failure(resp.status);
        Err(AuthError::from_response(resp.status.as_u16(), &resp.body, auth_failure))
    }
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;
