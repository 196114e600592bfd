// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response types and the plain HTTP transport.
//!
//! [`HttpTransport`] performs no token handling. The intercepted client
//! lives in [`interceptor`].

pub mod interceptor;

use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AuthError;

/// A replayable request against the board API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/boards`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    retried: bool,
    anonymous: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AuthError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| AuthError::Decode(e.to_string()))?);
        Ok(self)
    }

    /// Mark the request as public: no token is attached and auth failures
    /// are never recovered by a refresh.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Set the one-shot retry marker. Never reset for the lifetime of the
    /// request.
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn set_bearer(&mut self, token: &str) {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                self.headers.remove(AUTHORIZATION);
            }
        }
    }

    /// The bearer token currently attached, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_slice(&self.body).map_err(|e| AuthError::Decode(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes a request and returns the raw response, whatever its status.
pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse, AuthError>>;
}

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Only the first call
/// has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// reqwest-backed transport rooted at the API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        ensure_crypto();
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        Ok(ApiResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(&'a self, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse, AuthError>> {
        self.send(request).boxed()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
