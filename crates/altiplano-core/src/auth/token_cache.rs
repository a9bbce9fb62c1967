//! File-backed bearer-token cache.
//!
//! The controller hands out short-lived bearer tokens; this cache persists
//! the most recent one across process invocations so tools don't hit the
//! login endpoint on every call. A single JSON record lives on disk:
//! `{"access_token": ..., "expires_at": ..., "cached_at": ...}` with
//! timestamps in unix seconds. Expiry is checked lazily on read; nothing
//! ever sweeps the file.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default token lifetime when the login response omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Errors persisting the cache record. Read-side problems are never
/// surfaced; a missing or malformed record is simply a cache miss.
#[derive(Debug, Error)]
pub enum CacheWriteError {
    #[error("could not serialize token cache record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not write token cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Wall-clock source for all expiry math. Injectable so tests can pin time.
pub trait Clock: Send + Sync {
    /// Current time in unix seconds.
    fn now(&self) -> f64;
}

/// System wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

/// The persisted credential record. Fully owned by the cache; writing a new
/// one replaces the prior record outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_token: String,
    pub expires_at: f64,
    pub cached_at: f64,
}

/// Diagnostic view of the cache, returned by [`TokenCache::info`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheInfo {
    pub has_token: bool,
    pub expires_at: Option<f64>,
    pub cached_at: Option<f64>,
    pub is_valid: bool,
    /// Seconds until expiry. Negative once expired; intentionally not
    /// clamped so callers can see how stale the record is.
    pub time_until_expiry: Option<f64>,
}

/// Single point of truth for "do we already have a usable credential".
///
/// Shareable across tool invocations: all methods take `&self`. An
/// in-memory shadow of the last loaded record avoids re-reading the file
/// within one process; it is invalidated on every `set` and `clear`.
pub struct TokenCache {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    shadow: Mutex<Option<CachedCredential>>,
}

impl TokenCache {
    pub fn new(path: PathBuf) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            clock,
            shadow: Mutex::new(None),
        }
    }

    /// Return the cached token if a record exists and has not expired.
    /// Missing, unreadable, or corrupt records are treated as a miss.
    pub fn get(&self) -> Option<String> {
        let credential = self.load()?;
        if self.clock.now() < credential.expires_at {
            Some(credential.access_token)
        } else {
            None
        }
    }

    /// Persist a new credential record, replacing any prior one. The write
    /// goes through a sibling temp file and a rename so a failure leaves
    /// the previous record's bytes untouched and a concurrent reader never
    /// sees a partial record.
    pub fn set(&self, access_token: &str, expires_in: u64) -> Result<(), CacheWriteError> {
        let now = self.clock.now();
        let record = CachedCredential {
            access_token: access_token.to_string(),
            expires_at: now + expires_in as f64,
            cached_at: now,
        };

        // Invalidate the shadow up front so reads fall back to disk if the
        // write fails partway.
        *self.shadow_guard() = None;

        let contents = serde_json::to_string_pretty(&record)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| CacheWriteError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|source| CacheWriteError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            CacheWriteError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        *self.shadow_guard() = Some(record);
        Ok(())
    }

    /// Remove the persisted record. Clearing an empty cache is a no-op.
    pub fn clear(&self) -> Result<(), CacheWriteError> {
        *self.shadow_guard() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheWriteError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Diagnostic snapshot. Recomputes the same lazy validity check as
    /// [`get`](Self::get); an absent or unreadable record yields the empty
    /// shape.
    pub fn info(&self) -> CacheInfo {
        match self.load() {
            None => CacheInfo::default(),
            Some(credential) => {
                let now = self.clock.now();
                CacheInfo {
                    has_token: true,
                    expires_at: Some(credential.expires_at),
                    cached_at: Some(credential.cached_at),
                    is_valid: now < credential.expires_at,
                    time_until_expiry: Some(credential.expires_at - now),
                }
            }
        }
    }

    /// Load the record from the shadow or from disk. Only successful loads
    /// populate the shadow, so a corrupt file is re-examined on each call
    /// rather than cached as a phantom miss.
    fn load(&self) -> Option<CachedCredential> {
        let mut shadow = self.shadow_guard();
        if let Some(credential) = shadow.as_ref() {
            return Some(credential.clone());
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "could not read token cache");
                return None;
            }
        };

        match serde_json::from_str::<CachedCredential>(&contents) {
            Ok(credential) => {
                *shadow = Some(credential.clone());
                Some(credential)
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "malformed token cache record, treating as empty");
                None
            }
        }
    }

    fn shadow_guard(&self) -> MutexGuard<'_, Option<CachedCredential>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the Option inside is still coherent.
        match self.shadow.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
