// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `board` binary as a subprocess against an in-process fake
//! backend. Every invocation starts with an empty memory, like a page load;
//! only the cookie file in the per-test state directory carries over.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use board_client::test_support::FakeBackend;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the path to the compiled `board` binary.
pub fn board_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("board")
}

/// Result of one `board` invocation.
#[derive(Debug)]
pub struct Run {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Run {
    fn from_output(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A fake backend plus a private state directory for the CLI.
pub struct BoardEnv {
    pub backend: FakeBackend,
    state_dir: tempfile::TempDir,
}

impl BoardEnv {
    pub async fn start() -> anyhow::Result<Self> {
        let binary = board_binary();
        anyhow::ensure!(binary.exists(), "board binary not found at {}", binary.display());
        Ok(Self { backend: FakeBackend::start().await?, state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    /// Run `board <args>` and wait for it to exit.
    ///
    /// Uses tokio's process API so the fake backend keeps serving on this
    /// runtime while the child runs.
    pub async fn board(&self, args: &[&str]) -> anyhow::Result<Run> {
        let child = tokio::process::Command::new(board_binary())
            .args(args)
            .env("BOARD_API_URL", self.backend.url())
            .env("BOARD_STATE_DIR", self.state_dir.path())
            .env("BOARD_LOG", "debug")
            .env_remove("BOARD_PASSWORD")
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(TIMEOUT, child).await??;
        Ok(Run::from_output(output))
    }
}
