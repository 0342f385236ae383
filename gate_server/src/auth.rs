//! Bearer token verification and issuance.
//!
//! Tokens are HS256 JWTs signed with a single shared secret. The claims carry the subject id and the verification
//! flags as they were when the token was minted; there is no refresh or revocation.
use chrono::{Duration, Utc};
use gate_common::Secret;
use gate_engine::{AuthorizationError, IdentityClaim};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use thiserror::Error;

use crate::errors::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("No bearer token was provided")]
    MissingToken,
    #[error("The Authorization header must have the form 'Bearer <token>'")]
    MalformedToken,
    #[error("The bearer token is invalid or has expired. {0}")]
    InvalidToken(String),
}

impl From<TokenError> for AuthorizationError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::MissingToken => Self::MissingCredential(e.to_string()),
            TokenError::MalformedToken => Self::MalformedCredential(e.to_string()),
            TokenError::InvalidToken(_) => Self::InvalidCredential(e.to_string()),
        }
    }
}

/// Extracts the token from an `Authorization` header value. The scheme is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &Secret<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self { key: DecodingKey::from_secret(secret.reveal().as_bytes()), validation }
    }

    pub fn verify_token(&self, token: &str) -> Result<IdentityClaim, TokenError> {
        decode::<IdentityClaim>(token, &self.key, &self.validation).map(|data| data.claims).map_err(|e| {
            debug!("🔐️ Rejected bearer token. {e}");
            TokenError::InvalidToken(e.to_string())
        })
    }

    /// Verifies the raw value of an `Authorization` header.
    pub fn verify_authorization_header(&self, header: Option<&str>) -> Result<IdentityClaim, TokenError> {
        let header = header.ok_or(TokenError::MissingToken)?;
        let token = bearer_token(header).ok_or(TokenError::MalformedToken)?;
        self.verify_token(token)
    }
}

/// Mints tokens with the shared secret. The gatekeeper itself never issues tokens to clients; this exists for
/// operators and tests.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &Secret<String>) -> Self {
        Self { key: EncodingKey::from_secret(secret.reveal().as_bytes()) }
    }

    /// Signs `claim`, overriding its timestamps so that it is valid from now for `valid_for`.
    pub fn issue_token(&self, claim: IdentityClaim, valid_for: Duration) -> Result<String, ServerError> {
        let now = Utc::now();
        let claim = IdentityClaim { issued_at: now.timestamp(), expires_at: (now + valid_for).timestamp(), ..claim };
        encode(&Header::new(Algorithm::HS256), &claim, &self.key)
            .map_err(|e| ServerError::CouldNotSerializeAccessToken(e.to_string()))
    }
}
