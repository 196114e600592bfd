// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable, cookie-like storage for the refresh token.
//!
//! Entries carry the attributes a browser would enforce (path, SameSite,
//! secure, absolute expiry). An expired entry reads as absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Name of the cookie holding the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Default lifetime of the refresh cookie.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

/// A single persisted cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
    /// Absolute expiry as epoch milliseconds.
    pub expires_at_ms: u64,
}

impl Cookie {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(epoch_ms())
    }
}

/// How the refresh cookie is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
    pub max_age: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            path: "/".to_owned(),
            same_site: SameSite::Strict,
            secure: false,
            max_age: DEFAULT_REFRESH_TTL,
        }
    }
}

impl CookiePolicy {
    /// Policy for an API origin: `secure` only when the origin is https.
    pub fn for_origin(api_url: &str, max_age: Duration) -> Self {
        Self { secure: api_url.starts_with("https://"), max_age, ..Self::default() }
    }

    pub fn issue(&self, name: &str, value: &str) -> Cookie {
        let max_age_ms = u64::try_from(self.max_age.as_millis()).unwrap_or(u64::MAX);
        Cookie {
            name: name.to_owned(),
            value: value.to_owned(),
            path: self.path.clone(),
            same_site: self.same_site,
            secure: self.secure,
            expires_at_ms: epoch_ms().saturating_add(max_age_ms),
        }
    }
}

/// Durable cookie storage.
pub trait CookieJar: Send + Sync {
    /// Returns the named cookie, or `None` when absent or expired.
    fn get(&self, name: &str) -> anyhow::Result<Option<Cookie>>;
    fn set(&self, cookie: Cookie) -> anyhow::Result<()>;
    fn remove(&self, name: &str) -> anyhow::Result<()>;
}

/// Cookie jar kept in process memory. Does not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, Cookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> anyhow::Result<Option<Cookie>> {
        Ok(self.cookies.lock().get(name).filter(|c| !c.is_expired()).cloned())
    }

    fn set(&self, cookie: Cookie) -> anyhow::Result<()> {
        self.cookies.lock().insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        self.cookies.lock().remove(name);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieFile {
    #[serde(default)]
    cookies: HashMap<String, Cookie>,
}

/// Cookie jar backed by a JSON file, written atomically.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Jar at `<state_dir>/cookies.json`, creating the directory if needed.
    pub fn in_dir(state_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        Ok(Self::new(state_dir.join("cookies.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<CookieFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CookieFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write tmp + rename. The tmp name is unique per PID and call so
    /// concurrent saves never share a partially written file.
    fn save(&self, file: &CookieFile) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let json = serde_json::to_string_pretty(file)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        restrict_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl CookieJar for FileCookieJar {
    fn get(&self, name: &str) -> anyhow::Result<Option<Cookie>> {
        let _guard = self.lock.lock();
        let file = self.load()?;
        Ok(file.cookies.get(name).filter(|c| !c.is_expired()).cloned())
    }

    fn set(&self, cookie: Cookie) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        let mut file = self.load()?;
        let now = epoch_ms();
        file.cookies.retain(|_, c| !c.is_expired_at(now));
        file.cookies.insert(cookie.name.clone(), cookie);
        self.save(&file)
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        let mut file = self.load()?;
        if file.cookies.remove(name).is_none() {
            return Ok(());
        }
        self.save(&file)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod tests;
