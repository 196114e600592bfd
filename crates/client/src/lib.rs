// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod api;
pub mod bridge;
pub mod command;
pub mod config;
pub mod cookie;
pub mod error;
pub mod identity;
pub mod refresh;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod token;
pub mod transport;

pub use error::AuthError;
pub use session::AuthSession;
pub use token::{TokenPair, TokenStore};
