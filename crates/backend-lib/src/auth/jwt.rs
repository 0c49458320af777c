// ============================
// crates/backend-lib/src/auth/jwt.rs
// ============================
//! Signed access tokens.
//!
//! HS256 only. Every token names its signing key in the `kid` header so
//! retired keys can keep verifying while new tokens use the active one.
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::account::Account;
use crate::config::JwtSettings;
use crate::error::AppError;

/// Current claims layout
pub const CLAIMS_VERSION: u8 = 1;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Access token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub ver: u8,
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: Uuid,
}

/// Why a token was rejected
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("unexpected issuer")]
    InvalidIssuer,
    #[error("unexpected audience")]
    InvalidAudience,
    #[error("algorithm does not match signing method")]
    AlgorithmMismatch,
    #[error("unknown or missing key id")]
    UnknownKeyId,
    #[error("signature verification failed")]
    BadSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Dependency(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
            ErrorKind::InvalidAudience => TokenError::InvalidAudience,
            ErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Key ring plus claim policy
#[derive(Clone)]
pub struct TokenIssuer {
    active_kid: String,
    encoding_key: EncodingKey,
    decoding_keys: HashMap<String, DecodingKey>,
    issuer: String,
    audience: String,
    ttl: Duration,
    leeway_secs: u64,
}

impl TokenIssuer {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut decoding_keys = HashMap::new();
        for previous in &settings.previous_keys {
            decoding_keys
                .insert(previous.key_id.clone(), DecodingKey::from_secret(previous.secret.as_bytes()));
        }
        decoding_keys.insert(settings.key_id.clone(), DecodingKey::from_secret(settings.secret.as_bytes()));

        Self {
            active_kid: settings.key_id.clone(),
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_keys,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            ttl: settings.access_ttl(),
            leeway_secs: settings.leeway_secs,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a new access token for an account
    pub fn issue(&self, account: &Account) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let expires_at = now + ttl;

        let claims = Claims {
            ver: CLAIMS_VERSION,
            sub: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims, expires_at })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(self.active_kid.clone());
        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, algorithm, key id and time/issuer/audience claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::AlgorithmMismatch);
        }
        let key = header
            .kid
            .as_deref()
            .and_then(|kid| self.decoding_keys.get(kid))
            .ok_or(TokenError::UnknownKeyId)?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "aud", "sub"]);

        let claims = decode::<Claims>(token, key, &validation)?.claims;
        if claims.ver != CLAIMS_VERSION {
            return Err(TokenError::Malformed(format!("unsupported claims version {}", claims.ver)));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviousKey;
    use gameauth_common::AccountStatus;

    fn settings(kid: &str, secret: &str) -> JwtSettings {
        JwtSettings {
            secret: secret.to_string(),
            key_id: kid.to_string(),
            ..JwtSettings::default()
        }
    }

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            username: "player_a".to_string(),
            password_hash: String::new(),
            status: AccountStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let account = account();
        let issued = issuer.issue(&account).unwrap();

        let claims = issuer.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.username, "player_a");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.ver, CLAIMS_VERSION);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let account = account();
        let first = issuer.issue(&account).unwrap();
        let second = issuer.issue(&account).unwrap();
        assert_ne!(first.token, second.token);
        assert_ne!(first.claims.jti, second.claims.jti);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let mut claims = issuer.issue(&account()).unwrap().claims;
        claims.iat -= 3600;
        claims.nbf -= 3600;
        claims.exp = Utc::now().timestamp() - 60;

        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid_token_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let mut claims = issuer.issue(&account()).unwrap().claims;
        claims.nbf = Utc::now().timestamp() + 600;

        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_issuer_and_audience_checked() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let mut other = settings("primary", SECRET);
        other.issuer = "someone-else".to_string();
        let foreign = TokenIssuer::new(&other).issue(&account()).unwrap();
        assert_eq!(issuer.verify(&foreign.token), Err(TokenError::InvalidIssuer));

        let mut other = settings("primary", SECRET);
        other.audience = "admin-console".to_string();
        let foreign = TokenIssuer::new(&other).issue(&account()).unwrap();
        assert_eq!(issuer.verify(&foreign.token), Err(TokenError::InvalidAudience));
    }

    #[test]
    fn test_unknown_key_id_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let foreign = TokenIssuer::new(&settings("rogue", SECRET)).issue(&account()).unwrap();
        assert_eq!(issuer.verify(&foreign.token), Err(TokenError::UnknownKeyId));
    }

    #[test]
    fn test_previous_key_still_verifies() {
        let old_secret = "fedcba9876543210fedcba9876543210";
        let old = TokenIssuer::new(&settings("2025-01", old_secret));
        let token = old.issue(&account()).unwrap().token;

        let mut rotated = settings("2025-06", SECRET);
        rotated.previous_keys.push(PreviousKey {
            key_id: "2025-01".to_string(),
            secret: old_secret.to_string(),
        });
        let current = TokenIssuer::new(&rotated);
        assert!(current.verify(&token).is_ok());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let claims = issuer.issue(&account()).unwrap().claims;

        let mut header = Header::new(Algorithm::HS512);
        header.kid = Some("primary".to_string());
        let token = encode(&header, &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::AlgorithmMismatch));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let token = issuer.issue(&account()).unwrap().token;
        let mut parts: Vec<&str> = token.split('.').collect();

        // {"alg":"none","typ":"JWT","kid":"primary"}
        let none_header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIiwia2lkIjoicHJpbWFyeSJ9";
        parts[0] = none_header;
        parts[2] = "";
        assert!(issuer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let wrong_secret = TokenIssuer::new(&settings("primary", "ffffffffffffffffffffffffffffffff"));
        let token = wrong_secret.issue(&account()).unwrap().token;
        assert_eq!(issuer.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_claims_version_checked() {
        let issuer = TokenIssuer::new(&settings("primary", SECRET));
        let mut claims = issuer.issue(&account()).unwrap().claims;
        claims.ver = 2;
        let token = issuer.sign(&claims).unwrap();
        assert!(matches!(issuer.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_errors_collapse_to_unauthorized() {
        let err: AppError = TokenError::Expired.into();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err: AppError = TokenError::Signing("boom".into()).into();
        assert!(matches!(err, AppError::Dependency(_)));
    }
}
