//! Authentication gate consulted by every controller tool.
//!
//! Resolution order: an explicit token always wins, then a valid cached
//! token, then a fresh login with the configured default credentials.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::token_cache::{TokenCache, DEFAULT_TOKEN_LIFETIME_SECS};

/// Parsed body of a successful `rest/auth/login` call. The controller also
/// returns a refresh token; it is carried through but nothing here uses it.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Something that can trade credentials for a [`LoginResponse`].
/// Implemented by [`ApiClient`](crate::ApiClient); tests use stubs.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed: {0}")]
    LoginFailed(String),

    #[error("login response did not contain an access token")]
    MissingToken,

    #[error(
        "no access token provided and no cached token available; \
         authenticate first using get_access_token"
    )]
    MissingCredential,
}

/// Default credentials used when the caller supplies none.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct AuthGate {
    cache: Arc<TokenCache>,
    authenticator: Arc<dyn Authenticator>,
    defaults: Option<Credentials>,
}

impl AuthGate {
    pub fn new(
        cache: Arc<TokenCache>,
        authenticator: Arc<dyn Authenticator>,
        defaults: Option<Credentials>,
    ) -> Self {
        Self {
            cache,
            authenticator,
            defaults,
        }
    }

    /// Resolve a bearer token for an operation.
    ///
    /// A non-empty explicit token is returned as-is without touching the
    /// cache. Otherwise the cache is consulted, and on a miss the default
    /// credentials are exchanged for a fresh token, which is then cached.
    /// Failures come back as [`AuthError`]; this never panics.
    pub async fn ensure_token(&self, explicit: Option<&str>) -> Result<String, AuthError> {
        if let Some(token) = explicit.filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        if let Some(token) = self.cache.get() {
            debug!("using cached access token");
            return Ok(token);
        }

        let creds = self.defaults.as_ref().ok_or(AuthError::MissingCredential)?;

        let login = self
            .authenticator
            .login(&creds.username, &creds.password)
            .await
            .map_err(|e| AuthError::LoginFailed(e.to_string()))?;

        if login.access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let lifetime = login.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        if let Err(e) = self.cache.set(&login.access_token, lifetime) {
            // The token itself is good; a cache miss next time just means
            // another login round-trip.
            warn!(error = %e, "could not persist access token");
        }

        Ok(login.access_token)
    }

    /// Login with explicit credentials (or the configured defaults) and
    /// cache the result. Backs the `get_access_token` tool.
    pub async fn login_and_cache(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) => (u, p),
            _ => {
                let creds = self.defaults.as_ref().ok_or(AuthError::MissingCredential)?;
                (creds.username.as_str(), creds.password.as_str())
            }
        };

        let login = self
            .authenticator
            .login(username, password)
            .await
            .map_err(|e| AuthError::LoginFailed(e.to_string()))?;

        if login.access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let lifetime = login.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        if let Err(e) = self.cache.set(&login.access_token, lifetime) {
            warn!(error = %e, "could not persist access token");
        }

        Ok(login)
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub authenticator returning a fixed outcome and counting calls.
    struct StubAuthenticator {
        response: Result<LoginResponse, String>,
        calls: AtomicUsize,
    }

    impl StubAuthenticator {
        fn succeeding(token: &str, expires_in: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(LoginResponse {
                    access_token: token.to_string(),
                    expires_in,
                    refresh_token: None,
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for StubAuthenticator {
        async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(login) => Ok(login.clone()),
                Err(message) => Err(ApiError::InvalidResponse(message.clone())),
            }
        }
    }

    fn gate_with(
        dir: &tempfile::TempDir,
        authenticator: Arc<StubAuthenticator>,
        defaults: Option<Credentials>,
    ) -> (AuthGate, Arc<TokenCache>) {
        let cache = Arc::new(TokenCache::new(dir.path().join("token_cache.json")));
        (
            AuthGate::new(cache.clone(), authenticator, defaults),
            cache,
        )
    }

    fn default_creds() -> Option<Credentials> {
        Some(Credentials {
            username: "adminuser".to_string(),
            password: "password".to_string(),
        })
    }

    #[tokio::test]
    async fn explicit_token_wins_without_touching_anything() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("fresh", None);
        let (gate, cache) = gate_with(&dir, stub.clone(), default_creds());
        cache.set("cached", 3600).unwrap();

        let token = gate.ensure_token(Some("abc")).await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_explicit_token_falls_through_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("fresh", None);
        let (gate, cache) = gate_with(&dir, stub.clone(), default_creds());
        cache.set("cached", 3600).unwrap();

        let token = gate.ensure_token(Some("")).await.unwrap();
        assert_eq!(token, "cached");
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn cache_miss_logs_in_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("fresh", Some(120));
        let (gate, cache) = gate_with(&dir, stub.clone(), default_creds());

        let token = gate.ensure_token(None).await.unwrap();
        assert_eq!(token, "fresh");
        assert_eq!(stub.call_count(), 1);
        assert_eq!(cache.get().as_deref(), Some("fresh"));

        // Second call is served from the cache.
        let token = gate.ensure_token(None).await.unwrap();
        assert_eq!(token, "fresh");
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn login_failure_surfaces_and_leaves_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::failing("connection refused");
        let (gate, cache) = gate_with(&dir, stub, default_creds());

        let err = gate.ensure_token(None).await.unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed(_)));
        assert_eq!(cache.get(), None);
        assert!(!cache.info().has_token);
    }

    #[tokio::test]
    async fn failed_login_leaves_expired_record_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::failing("connection refused");
        let (gate, cache) = gate_with(&dir, stub, default_creds());

        // Already-expired record: a miss for get(), but still on disk.
        cache.set("stale", 0).unwrap();
        assert_eq!(cache.get(), None);
        let path = dir.path().join("token_cache.json");
        let before = std::fs::read_to_string(&path).unwrap();

        let err = gate.ensure_token(None).await.unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn missing_defaults_yield_missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("fresh", None);
        let (gate, _cache) = gate_with(&dir, stub.clone(), None);

        let err = gate.ensure_token(None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_token_in_login_response_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("", None);
        let (gate, cache) = gate_with(&dir, stub, default_creds());

        let err = gate.ensure_token(None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
        assert_eq!(cache.get(), None);
    }

    #[tokio::test]
    async fn login_and_cache_uses_explicit_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAuthenticator::succeeding("fresh", None);
        let (gate, cache) = gate_with(&dir, stub, None);

        // No defaults configured, but explicit credentials still work.
        let login = gate
            .login_and_cache(Some("operator"), Some("secret"))
            .await
            .unwrap();
        assert_eq!(login.access_token, "fresh");
        assert_eq!(cache.get().as_deref(), Some("fresh"));
    }
}
