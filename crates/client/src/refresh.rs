// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access-token refresh.
//!
//! At most one refresh cycle is in flight. Callers that ask for a refresh
//! while a cycle runs join it; requests that failed authentication during a
//! cycle wait in the [`RetryQueue`] and are settled with the cycle's outcome.
//! The cycle runs on its own task, so it completes and settles even if every
//! caller goes away.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{error_message, AuthError};
use crate::token::{TokenPair, TokenStore};
use crate::transport::{ApiRequest, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Result of one refresh cycle: the new access token or the failure.
pub type RefreshOutcome = Result<String, AuthError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// How the refresh token is presented to `/auth/refresh`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RefreshMode {
    /// JSON body `{"refreshToken": ...}`; the current access token, if any,
    /// rides along as the bearer.
    #[default]
    Body,
    /// `Authorization: Bearer <refresh token>`, no body.
    Bearer,
    /// Refresh token in both the body and the bearer header.
    Both,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Requests parked until the in-flight refresh settles.
#[derive(Debug, Default)]
pub struct RetryQueue {
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

impl RetryQueue {
    pub fn enqueue(&mut self) -> oneshot::Receiver<RefreshOutcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Hand `outcome` to every waiter in arrival order. Returns how many
    /// were still listening.
    pub fn settle(self, outcome: &RefreshOutcome) -> usize {
        let mut delivered = 0;
        for tx in self.waiters {
            if tx.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

struct InFlight {
    cycle: u64,
    future: SharedRefresh,
}

#[derive(Default)]
struct RefreshState {
    in_flight: Option<InFlight>,
    queue: RetryQueue,
    cycles: u64,
}

pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    /// Plain transport: refresh calls never pass through the interceptors.
    transport: Arc<dyn Transport>,
    mode: RefreshMode,
    state: Mutex<RefreshState>,
    calls: AtomicU32,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<TokenStore>, transport: Arc<dyn Transport>, mode: RefreshMode) -> Arc<Self> {
        Arc::new(Self {
            store,
            transport,
            mode,
            state: Mutex::new(RefreshState::default()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Number of requests waiting on the in-flight cycle.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Network refresh calls issued so far.
    pub fn refresh_calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Park the caller on the in-flight cycle, or return `None` when no
    /// cycle is running. The check and the enqueue happen under one lock,
    /// so a waiter always lands in a cycle that has not drained yet.
    pub fn enqueue_if_refreshing(&self) -> Option<oneshot::Receiver<RefreshOutcome>> {
        let mut state = self.state.lock();
        state.in_flight.as_ref()?;
        Some(state.queue.enqueue())
    }

    /// Obtain a fresh access token, joining the in-flight cycle if there is
    /// one. A missing refresh token ends the session immediately.
    pub async fn refresh_access_token(self: &Arc<Self>) -> RefreshOutcome {
        match self.join_or_start() {
            Some(future) => future.await,
            None => {
                warn!("refresh needed but no refresh token stored, signing out");
                self.store.clear_tokens();
                Err(AuthError::NoRefreshToken)
            }
        }
    }

    fn join_or_start(self: &Arc<Self>) -> Option<SharedRefresh> {
        let mut state = self.state.lock();
        if let Some(ref in_flight) = state.in_flight {
            debug!(cycle = in_flight.cycle, "joining in-flight refresh");
            return Some(in_flight.future.clone());
        }
        let refresh_token = self.store.refresh_token()?;

        state.cycles += 1;
        let cycle = state.cycles;
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run_cycle(cycle, refresh_token).await });
        let future = async move {
            task.await.unwrap_or_else(|e| Err(AuthError::Transport(format!("refresh task failed: {e}"))))
        }
        .boxed()
        .shared();
        state.in_flight = Some(InFlight { cycle, future: future.clone() });
        debug!(cycle, "refresh started");
        Some(future)
    }

    async fn run_cycle(self: Arc<Self>, cycle: u64, refresh_token: String) -> RefreshOutcome {
        // Settles on drop, so an aborted cycle still resets the in-flight
        // state and releases its waiters.
        let mut guard = CycleGuard { coordinator: Arc::clone(&self), cycle, outcome: None };
        let outcome = match self.exchange(&refresh_token).await {
            Ok(pair) => self.store.set_tokens(&pair).map(|()| pair.access_token),
            Err(e) => Err(e),
        };
        guard.outcome = Some(outcome.clone());
        drop(guard);
        outcome
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut request = ApiRequest::post(REFRESH_PATH);
        match self.mode {
            RefreshMode::Body => {
                request = request.json(&RefreshBody { refresh_token })?;
                if let Some(access) = self.store.access_token() {
                    request.set_bearer(&access);
                }
            }
            RefreshMode::Bearer => request.set_bearer(refresh_token),
            RefreshMode::Both => {
                request = request.json(&RefreshBody { refresh_token })?;
                request.set_bearer(refresh_token);
            }
        }

        let resp = self.transport.execute(&request).await?;
        if !resp.is_success() {
            return Err(AuthError::RefreshRejected {
                status: resp.status.as_u16(),
                message: error_message(&resp.body),
            });
        }
        resp.json()
    }

    fn settle(&self, cycle: u64, outcome: &RefreshOutcome) {
        match outcome {
            Ok(_) => info!(cycle, "access token refreshed"),
            Err(e) => {
                warn!(cycle, "refresh failed, signing out: {e}");
                self.store.clear_tokens();
            }
        }

        let queue = {
            let mut state = self.state.lock();
            if state.in_flight.as_ref().is_some_and(|f| f.cycle == cycle) {
                state.in_flight = None;
            }
            std::mem::take(&mut state.queue)
        };
        let waiting = queue.len();
        let delivered = queue.settle(outcome);
        if waiting > 0 {
            debug!(cycle, waiting, delivered, "retry queue drained");
        }
    }
}

struct CycleGuard {
    coordinator: Arc<RefreshCoordinator>,
    cycle: u64,
    outcome: Option<RefreshOutcome>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err(AuthError::Transport("refresh aborted".to_owned())));
        self.coordinator.settle(self.cycle, &outcome);
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
