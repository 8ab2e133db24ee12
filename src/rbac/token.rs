//! Access and refresh token issuance and verification.
//!
//! Both classes are HS256 JWTs. Each class is signed with its own secret and
//! carries a `type` claim; verification checks signature, expiry and class, and
//! any failure yields `None`.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::error::{RbacError, RbacResult};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const MIN_SECRET_LENGTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Signed token payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email.
    pub sub: String,
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// Identity a token is issued for.
#[derive(Clone, Debug)]
pub struct TokenSubject {
    pub email: String,
    pub user_id: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("{0} token secret must be at least {MIN_SECRET_LENGTH} characters")]
    SecretTooShort(&'static str),
    #[error("access and refresh token secrets must differ")]
    SharedSecret,
    #[error("{0} token TTL must be positive")]
    NonPositiveTtl(&'static str),
}

#[derive(Debug)]
pub struct TokenConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    /// # Errors
    /// Returns an error for short or shared secrets and non-positive TTLs.
    pub fn validate(&self) -> Result<(), TokenConfigError> {
        let access = self.access_secret.expose_secret();
        let refresh = self.refresh_secret.expose_secret();
        if access.len() < MIN_SECRET_LENGTH {
            return Err(TokenConfigError::SecretTooShort("access"));
        }
        if refresh.len() < MIN_SECRET_LENGTH {
            return Err(TokenConfigError::SecretTooShort("refresh"));
        }
        if access == refresh {
            return Err(TokenConfigError::SharedSecret);
        }
        if self.access_ttl_seconds <= 0 {
            return Err(TokenConfigError::NonPositiveTtl("access"));
        }
        if self.refresh_ttl_seconds <= 0 {
            return Err(TokenConfigError::NonPositiveTtl("refresh"));
        }
        Ok(())
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }
}

pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access", &"***")
            .field("refresh", &"***")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

impl TokenService {
    /// # Errors
    /// Returns an error if the configuration is rejected by [`TokenConfig::validate`].
    pub fn new(config: &TokenConfig) -> Result<Self, TokenConfigError> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: KeyPair::from_secret(&config.access_secret),
            refresh: KeyPair::from_secret(&config.refresh_secret),
            access_ttl_seconds: config.access_ttl_seconds,
            refresh_ttl_seconds: config.refresh_ttl_seconds,
            validation,
        })
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    /// # Errors
    /// Returns an internal error if signing fails.
    pub fn issue_access(&self, subject: &TokenSubject) -> RbacResult<String> {
        self.issue_access_with_ttl(subject, self.access_ttl_seconds)
    }

    /// # Errors
    /// Returns an internal error if signing fails.
    pub fn issue_access_with_ttl(&self, subject: &TokenSubject, ttl_seconds: i64) -> RbacResult<String> {
        self.issue(subject, TokenType::Access, ttl_seconds)
    }

    /// # Errors
    /// Returns an internal error if signing fails.
    pub fn issue_refresh(&self, subject: &TokenSubject) -> RbacResult<String> {
        self.issue_refresh_with_ttl(subject, self.refresh_ttl_seconds)
    }

    /// # Errors
    /// Returns an internal error if signing fails.
    pub fn issue_refresh_with_ttl(&self, subject: &TokenSubject, ttl_seconds: i64) -> RbacResult<String> {
        self.issue(subject, TokenType::Refresh, ttl_seconds)
    }

    #[must_use]
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenType::Access)
    }

    #[must_use]
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenType::Refresh)
    }

    fn keys(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    fn issue(&self, subject: &TokenSubject, token_type: TokenType, ttl_seconds: i64) -> RbacResult<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.email.clone(),
            user_id: subject.user_id,
            iat,
            exp: iat.saturating_add(ttl_seconds),
            token_type,
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(token_type).encoding,
        )
        .map_err(|e| RbacError::internal(anyhow::anyhow!("token signing failed: {e}")))
    }

    fn verify(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let claims = match jsonwebtoken::decode::<Claims>(
            token,
            &self.keys(expected).decoding,
            &self.validation,
        ) {
            Ok(data) => data.claims,
            Err(err) => {
                debug!(kind = ?err.kind(), "token rejected");
                return None;
            }
        };

        // The library accepts `exp == now`; the token is dead at its expiry instant.
        if claims.exp <= Utc::now().timestamp() {
            debug!("token rejected: expired");
            return None;
        }

        if claims.token_type != expected {
            debug!(?expected, actual = ?claims.token_type, "token rejected: wrong class");
            return None;
        }

        Some(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        let config = TokenConfig::new(
            SecretString::from("access-secret-0123456789"),
            SecretString::from("refresh-secret-0123456789"),
        );
        TokenService::new(&config).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "a@x.com".to_string(),
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn access_round_trip() {
        let tokens = service();
        let subject = subject();
        let token = tokens.issue_access(&subject).unwrap();
        let claims = tokens.verify_access(&token).unwrap();
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.user_id, subject.user_id);
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TTL_SECONDS);
    }

    #[test]
    fn refresh_round_trip() {
        let tokens = service();
        let token = tokens.issue_refresh(&subject()).unwrap();
        let claims = tokens.verify_refresh(&token).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, DEFAULT_REFRESH_TTL_SECONDS);
    }

    #[test]
    fn classes_are_not_interchangeable() {
        let tokens = service();
        let refresh = tokens.issue_refresh(&subject()).unwrap();
        let access = tokens.issue_access(&subject()).unwrap();
        assert!(tokens.verify_access(&refresh).is_none());
        assert!(tokens.verify_refresh(&access).is_none());
    }

    #[test]
    fn type_claim_is_checked_even_with_matching_key() {
        // A refresh-typed payload signed with the access key still fails access verification.
        let tokens = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "a@x.com".to_string(),
            user_id: Uuid::new_v4(),
            iat: now,
            exp: now + 60,
            token_type: TokenType::Refresh,
        };
        let forged = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-secret-0123456789"),
        )
        .unwrap();
        assert!(tokens.verify_access(&forged).is_none());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let tokens = service();
        let token = tokens.issue_access(&subject()).unwrap();
        let (head, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{head}.{flipped}{}", &signature[1..]);
        assert!(tokens.verify_access(&tampered).is_none());
        assert!(tokens.verify_access("not.a.jwt").is_none());
        assert!(tokens.verify_access("").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let token = tokens.issue_access_with_ttl(&subject(), -1).unwrap();
        assert!(tokens.verify_access(&token).is_none());
        let token = tokens.issue_refresh_with_ttl(&subject(), -1).unwrap();
        assert!(tokens.verify_refresh(&token).is_none());
    }

    #[test]
    fn token_signed_with_other_service_secret_is_rejected() {
        let other = TokenService::new(&TokenConfig::new(
            SecretString::from("another-access-secret-xx"),
            SecretString::from("another-refresh-secret-x"),
        ))
        .unwrap();
        let token = other.issue_access(&subject()).unwrap();
        assert!(service().verify_access(&token).is_none());
    }

    #[test]
    fn config_rejects_shared_or_short_secrets() {
        let shared = TokenConfig::new(
            SecretString::from("same-secret-0123456789"),
            SecretString::from("same-secret-0123456789"),
        );
        assert_eq!(shared.validate(), Err(TokenConfigError::SharedSecret));

        let short = TokenConfig::new(
            SecretString::from("short"),
            SecretString::from("refresh-secret-0123456789"),
        );
        assert_eq!(short.validate(), Err(TokenConfigError::SecretTooShort("access")));

        let ttl = TokenConfig::new(
            SecretString::from("access-secret-0123456789"),
            SecretString::from("refresh-secret-0123456789"),
        )
        .with_access_ttl_seconds(0);
        assert_eq!(ttl.validate(), Err(TokenConfigError::NonPositiveTtl("access")));
    }
}
