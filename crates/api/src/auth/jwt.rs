//! HS256 session tokens.
//!
//! The server only verifies tokens. [`mint_session_token`] exists so tests
//! and local tooling can produce one without the real issuer.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims the push channel cares about. Anything else the issuer adds is
/// ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session owner.
    pub sub: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of locally minted tokens.
    pub token_ttl_mins: i64,
    /// Clock skew tolerated when checking `exp`.
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// | Env Var            | Required | Default |
    /// |--------------------|----------|---------|
    /// | `JWT_SECRET`       | **yes**  | --      |
    /// | `JWT_TTL_MINS`     | no       | `15`    |
    /// | `JWT_LEEWAY_SECS`  | no       | `30`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or a number does not parse.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(!secret.is_empty(), "JWT_SECRET must be set and non-empty");

        let token_ttl_mins = std::env::var("JWT_TTL_MINS")
            .map(|v| v.parse().expect("JWT_TTL_MINS must be a valid i64"))
            .unwrap_or(15);
        let leeway_secs = std::env::var("JWT_LEEWAY_SECS")
            .map(|v| v.parse().expect("JWT_LEEWAY_SECS must be a valid u64"))
            .unwrap_or(30);

        Self {
            secret,
            token_ttl_mins,
            leeway_secs,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}

/// Sign a token for `subject` that expires after `config.token_ttl_mins`.
pub fn mint_session_token(
    subject: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let issued = chrono::Utc::now().timestamp();
    sign(
        &SessionClaims {
            sub: subject.to_owned(),
            exp: issued + config.token_ttl_mins * 60,
            iat: issued,
        },
        config,
    )
}

fn sign(claims: &SessionClaims, config: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify signature and expiry and return the claims.
pub fn decode_session_token(
    token: &str,
    config: &JwtConfig,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(config.secret.as_bytes());
    Ok(decode::<SessionClaims>(token, &key, &config.validation())?.claims)
}
