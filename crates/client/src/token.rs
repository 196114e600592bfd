// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: access token in memory, refresh token in the cookie jar.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cookie::{CookieJar, CookiePolicy, MemoryCookieJar, REFRESH_COOKIE};
use crate::error::AuthError;

/// Access/refresh token pair as issued by `/auth/signin` and `/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Callback fired with `true` after tokens are set and `false` after they
/// are cleared.
pub type AuthListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Identifies one registration of the listener slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

pub struct TokenStore {
    access: RwLock<Option<String>>,
    jar: Arc<dyn CookieJar>,
    policy: CookiePolicy,
    listener: Mutex<Option<(ListenerId, AuthListener)>>,
    next_listener: AtomicU64,
}

impl TokenStore {
    pub fn new(jar: Arc<dyn CookieJar>, policy: CookiePolicy) -> Self {
        Self {
            access: RwLock::new(None),
            jar,
            policy,
            listener: Mutex::new(None),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Store with an in-memory jar and the default cookie policy.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCookieJar::new()), CookiePolicy::default())
    }

    pub fn policy(&self) -> &CookiePolicy {
        &self.policy
    }

    pub fn access_token(&self) -> Option<String> {
        self.access.read().clone()
    }

    /// Current refresh token, or `None` when absent, expired, or unreadable.
    pub fn refresh_token(&self) -> Option<String> {
        match self.jar.get(REFRESH_COOKIE) {
            Ok(cookie) => cookie.map(|c| c.value),
            Err(e) => {
                warn!("refresh cookie unreadable: {e:#}");
                None
            }
        }
    }

    /// True iff a live refresh token is stored. An access token alone does
    /// not count: it is lost on restart.
    pub fn has_tokens(&self) -> bool {
        self.refresh_token().is_some()
    }

    /// Replace both tokens. Nothing changes if the refresh cookie cannot be
    /// persisted.
    pub fn set_tokens(&self, pair: &TokenPair) -> Result<(), AuthError> {
        {
            let mut access = self.access.write();
            let cookie = self.policy.issue(REFRESH_COOKIE, &pair.refresh_token);
            self.jar.set(cookie).map_err(|e| AuthError::Storage(format!("{e:#}")))?;
            *access = Some(pair.access_token.clone());
        }
        debug!("tokens stored");
        self.notify(true);
        Ok(())
    }

    /// Drop both tokens. Always ends the session in memory, even when the
    /// cookie cannot be removed.
    pub fn clear_tokens(&self) {
        {
            let mut access = self.access.write();
            *access = None;
            if let Err(e) = self.jar.remove(REFRESH_COOKIE) {
                warn!("failed to remove refresh cookie: {e:#}");
            }
        }
        debug!("tokens cleared");
        self.notify(false);
    }

    /// Install the single auth-change listener, replacing any previous one.
    pub fn set_listener(&self, listener: AuthListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        *self.listener.lock() = Some((id, listener));
        id
    }

    /// Clear the listener slot if `id` still owns it.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut slot = self.listener.lock();
        match slot.as_ref() {
            Some((current, _)) if *current == id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    fn notify(&self, authenticated: bool) {
        let listener = self.listener.lock().as_ref().map(|(_, f)| Arc::clone(f));
        if let Some(listener) = listener {
            listener(authenticated);
        }
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
