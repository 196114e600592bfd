// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges token-store notifications into observable auth state.
//!
//! The bridge owns the reactive [`AuthSnapshot`] and the logout redirect.
//! It occupies the store's single listener slot while mounted; dropping the
//! [`MountGuard`] frees the slot unless a newer mount already took it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::identity::{decode_user, AuthUser};
use crate::token::{ListenerId, TokenStore};

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    /// Identity decoded from the access token. `None` until an access
    /// token is held, e.g. right after a restart.
    pub user: Option<AuthUser>,
}

/// Host navigation hooks.
pub trait Navigator: Send + Sync {
    /// Whether the current view needs an authenticated user.
    fn requires_auth(&self) -> bool;

    /// Replace the current view with `route`, without a history entry.
    fn replace(&self, route: &str);
}

pub struct AuthStateBridge {
    store: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    state: watch::Sender<AuthSnapshot>,
}

impl AuthStateBridge {
    pub fn new(store: Arc<TokenStore>, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        Self::with_login_route(store, navigator, LOGIN_ROUTE)
    }

    pub fn with_login_route(
        store: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        login_route: &str,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(snapshot_of(&store));
        Arc::new(Self { store, navigator, login_route: login_route.to_owned(), state })
    }

    /// Take the store's listener slot and resync with the store.
    pub fn mount(self: &Arc<Self>) -> MountGuard {
        let bridge = Arc::downgrade(self);
        let id = self.store.set_listener(Arc::new(move |authenticated| {
            if let Some(bridge) = bridge.upgrade() {
                bridge.on_auth_change(authenticated);
            }
        }));
        self.state.send_replace(snapshot_of(&self.store));
        MountGuard { store: Arc::clone(&self.store), id }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    pub fn sign_out(&self) {
        self.store.clear_tokens();
    }

    fn on_auth_change(&self, authenticated: bool) {
        if authenticated {
            let user = self.store.access_token().as_deref().and_then(decode_user);
            self.state.send_replace(AuthSnapshot { authenticated: true, user });
            return;
        }
        self.state.send_replace(AuthSnapshot::default());
        if self.navigator.requires_auth() {
            info!(route = %self.login_route, "session ended, redirecting to login");
            self.navigator.replace(&self.login_route);
        }
    }
}

fn snapshot_of(store: &TokenStore) -> AuthSnapshot {
    if !store.has_tokens() {
        return AuthSnapshot::default();
    }
    let user = store.access_token().as_deref().and_then(decode_user);
    AuthSnapshot { authenticated: true, user }
}

/// Keeps the bridge registered with the store until dropped.
pub struct MountGuard {
    store: Arc<TokenStore>,
    id: ListenerId,
}

impl MountGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.store.remove_listener(self.id);
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
