// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account endpoints: sign-up, sign-in, sign-out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AuthError;
use crate::token::{TokenPair, TokenStore};
use crate::transport::interceptor::AuthClient;
use crate::transport::ApiRequest;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

pub struct AuthApi {
    client: Arc<AuthClient>,
    store: Arc<TokenStore>,
}

impl AuthApi {
    pub fn new(client: Arc<AuthClient>, store: Arc<TokenStore>) -> Self {
        Self { client, store }
    }

    /// Create an account. The server answers with no body; sign in
    /// separately to get tokens.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<(), AuthError> {
        self.client.send(ApiRequest::post("/auth/signup").json(request)?.anonymous()).await?;
        info!(username = %request.username, "account created");
        Ok(())
    }

    /// Exchange credentials for a token pair and store it.
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<TokenPair, AuthError> {
        let resp = self.client.send(ApiRequest::post("/auth/signin").json(request)?.anonymous()).await?;
        let pair: TokenPair = resp.json()?;
        self.store.set_tokens(&pair)?;
        info!(username = %request.username, "signed in");
        Ok(pair)
    }

    /// End the session locally. The backend keeps no session to revoke.
    pub fn sign_out(&self) {
        self.store.clear_tokens();
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
