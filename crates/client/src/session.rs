// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The auth session: one token store, one refresh coordinator, and the
//! intercepted client built on them.

use std::sync::Arc;

use crate::api::AuthApi;
use crate::bridge::{AuthStateBridge, Navigator};
use crate::config::ClientConfig;
use crate::cookie::{CookieJar, CookiePolicy, FileCookieJar};
use crate::refresh::RefreshCoordinator;
use crate::token::TokenStore;
use crate::transport::interceptor::{AuthClient, RequestInterceptor, ResponseInterceptor};
use crate::transport::{HttpTransport, Transport};

pub struct AuthSession {
    config: ClientConfig,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    client: Arc<AuthClient>,
}

impl AuthSession {
    pub fn new(config: ClientConfig, jar: Arc<dyn CookieJar>) -> Self {
        let policy = CookiePolicy::for_origin(&config.api_url, config.refresh_ttl());
        let store = Arc::new(TokenStore::new(jar, policy));
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.api_url, config.timeout()));
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&store), Arc::clone(&transport), config.refresh_mode);
        let client = Arc::new(AuthClient::new(
            transport,
            RequestInterceptor::new(Arc::clone(&coordinator), config.proactive_refresh()),
            ResponseInterceptor::new(Arc::clone(&coordinator), config.reauth_on_forbidden),
        ));
        Self { config, store, coordinator, client }
    }

    /// Session backed by the cookie file in the configured state directory.
    pub fn open(config: ClientConfig) -> anyhow::Result<Self> {
        let jar = FileCookieJar::in_dir(&config.resolved_state_dir())?;
        Ok(Self::new(config, Arc::new(jar)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    pub fn api(&self) -> AuthApi {
        AuthApi::new(Arc::clone(&self.client), Arc::clone(&self.store))
    }

    pub fn bridge(&self, navigator: Arc<dyn Navigator>) -> Arc<AuthStateBridge> {
        AuthStateBridge::new(Arc::clone(&self.store), navigator)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
