//! Yes/no session validation.
//!
//! The push channel and the REST routes only need to know whether a
//! credential still belongs to a live session. [`SessionValidator`] is that
//! seam; token issuance lives elsewhere.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::auth::jwt::{decode_session_token, JwtConfig};

/// Whether a validator may answer from its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// A recent answer is good enough (connection setup, REST calls).
    Cached,
    /// Ask the authority again (periodic re-validation).
    Bypass,
}

/// Result of a session check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub valid: bool,
    #[serde(default)]
    pub subject_id: Option<String>,
}

impl SessionStatus {
    pub fn valid(subject_id: impl Into<String>) -> Self {
        Self {
            valid: true,
            subject_id: Some(subject_id.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            subject_id: None,
        }
    }
}

/// The validator could not produce an answer. Distinct from "invalid".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Session service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Session service error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Session service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, credential: &str, mode: CacheMode) -> Result<SessionStatus, AuthError>;
}

/// SHA-256 hex digest of a credential, so raw tokens are never kept as map keys.
pub fn hash_credential(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Local JWT
// ---------------------------------------------------------------------------

/// Validates HS256 tokens with a shared secret. Never unavailable.
pub struct JwtSessionValidator {
    config: JwtConfig,
}

impl JwtSessionValidator {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, credential: &str, _mode: CacheMode) -> Result<SessionStatus, AuthError> {
        match decode_session_token(credential, &self.config) {
            Ok(claims) => Ok(SessionStatus::valid(claims.sub)),
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                Ok(SessionStatus::invalid())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Asks an external session service.
///
/// Sends `GET <url>` with the credential as a Bearer token. A 2xx answer
/// carries a [`SessionStatus`] body; 401 and 403 mean invalid; anything else
/// is an outage. [`CacheMode::Bypass`] adds `Cache-Control: no-cache` so
/// intermediaries revalidate with the session service.
pub struct RemoteSessionValidator {
    client: reqwest::Client,
    url: String,
}

impl RemoteSessionValidator {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn with_client(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    fn request(&self, credential: &str, mode: CacheMode) -> reqwest::RequestBuilder {
        let request = self.client.get(&self.url).bearer_auth(credential);
        match mode {
            CacheMode::Cached => request,
            CacheMode::Bypass => request.header(reqwest::header::CACHE_CONTROL, "no-cache"),
        }
    }
}

#[async_trait]
impl SessionValidator for RemoteSessionValidator {
    async fn validate(&self, credential: &str, mode: CacheMode) -> Result<SessionStatus, AuthError> {
        let response = self.request(credential, mode).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(SessionStatus::invalid());
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SessionStatus>().await?)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

struct CachedStatus {
    status: SessionStatus,
    stored_at: Instant,
}

/// TTL cache in front of another validator.
///
/// [`CacheMode::Cached`] answers from a fresh entry when there is one.
/// [`CacheMode::Bypass`] always asks the inner validator and refreshes the
/// entry. Outages are never cached.
pub struct CachedSessionValidator {
    inner: Arc<dyn SessionValidator>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedStatus>>,
}

impl CachedSessionValidator {
    pub fn new(inner: Arc<dyn SessionValidator>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently held, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn lookup(&self, key: &str) -> Option<SessionStatus> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.status.clone())
    }

    async fn store(&self, key: String, status: SessionStatus) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.insert(
            key,
            CachedStatus {
                status,
                stored_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl SessionValidator for CachedSessionValidator {
    async fn validate(&self, credential: &str, mode: CacheMode) -> Result<SessionStatus, AuthError> {
        let key = hash_credential(credential);

        if mode == CacheMode::Cached {
            if let Some(status) = self.lookup(&key).await {
                return Ok(status);
            }
        }

        let status = self.inner.validate(credential, mode).await?;
        self.store(key, status.clone()).await;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use assert_matches::assert_matches;

    use crate::auth::jwt::mint_session_token;

    /// Counts calls; answers from a switchable flag.
    struct CountingValidator {
        calls: AtomicUsize,
        valid: AtomicBool,
        down: AtomicBool,
    }

    impl CountingValidator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                valid: AtomicBool::new(true),
                down: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl SessionValidator for CountingValidator {
        async fn validate(&self, _credential: &str, _mode: CacheMode) -> Result<SessionStatus, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(AuthError::Unavailable("down".into()));
            }
            if self.valid.load(Ordering::SeqCst) {
                Ok(SessionStatus::valid("user-1"))
            } else {
                Ok(SessionStatus::invalid())
            }
        }
    }

    #[tokio::test]
    async fn jwt_validator_accepts_own_tokens() {
        let config = JwtConfig {
            secret: "session-test-secret".into(),
            token_ttl_mins: 5,
            leeway_secs: 0,
        };
        let token = mint_session_token("user-9", &config).unwrap();
        let validator = JwtSessionValidator::new(config);

        let status = validator.validate(&token, CacheMode::Cached).await.unwrap();
        assert_eq!(status, SessionStatus::valid("user-9"));

        let status = validator.validate("garbage", CacheMode::Cached).await.unwrap();
        assert!(!status.valid);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_mode_reuses_fresh_answer() {
        let inner = CountingValidator::new();
        let cache = CachedSessionValidator::new(inner.clone(), Duration::from_secs(60));

        cache.validate("tok", CacheMode::Cached).await.unwrap();
        cache.validate("tok", CacheMode::Cached).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.validate("tok", CacheMode::Cached).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bypass_mode_sees_revocation_immediately() {
        let inner = CountingValidator::new();
        let cache = CachedSessionValidator::new(inner.clone(), Duration::from_secs(60));

        assert!(cache.validate("tok", CacheMode::Cached).await.unwrap().valid);
        inner.valid.store(false, Ordering::SeqCst);

        assert!(cache.validate("tok", CacheMode::Cached).await.unwrap().valid);
        assert!(!cache.validate("tok", CacheMode::Bypass).await.unwrap().valid);
        // Bypass refreshed the entry.
        assert!(!cache.validate("tok", CacheMode::Cached).await.unwrap().valid);
    }

    #[tokio::test]
    async fn outages_are_not_cached() {
        let inner = CountingValidator::new();
        inner.down.store(true, Ordering::SeqCst);
        let cache = CachedSessionValidator::new(inner.clone(), Duration::from_secs(60));

        assert_matches!(
            cache.validate("tok", CacheMode::Cached).await,
            Err(AuthError::Unavailable(_))
        );
        assert_eq!(cache.len().await, 0);

        inner.down.store(false, Ordering::SeqCst);
        assert!(cache.validate("tok", CacheMode::Cached).await.unwrap().valid);
    }

    #[test]
    fn remote_bypass_asks_caches_to_revalidate() {
        let remote = RemoteSessionValidator::new("http://sessions.internal/check".into());

        let bypass = remote.request("tok", CacheMode::Bypass).build().unwrap();
        assert_eq!(
            bypass.headers().get(reqwest::header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
        assert_eq!(
            bypass.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer tok"
        );

        let cached = remote.request("tok", CacheMode::Cached).build().unwrap();
        assert!(cached.headers().get(reqwest::header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn credential_hash_is_stable_hex() {
        let hash = hash_credential("abc");
        assert_eq!(hash, hash_credential("abc"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_credential("abd"));
    }
}
