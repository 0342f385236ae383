use std::time::Duration;

use thiserror::Error;

use crate::verification::Factor;

/// Failures of the identity, policy, credential and two-factor stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Lookup did not complete within {0:?}")]
    Timeout(Duration),
    #[error("Stored data is inconsistent: {0}")]
    InconsistentData(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Partner signature failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Missing partner identifier header")]
    MissingPartnerId,
    #[error("Invalid partner identifier")]
    InvalidPartnerId,
    #[error("Partner credentials not found or invalid")]
    UnknownPartner,
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    SignatureMismatch,
}

/// The single error taxonomy of the request pipeline. Every stage fails with one of these, and each maps to exactly
/// one terminal response.
#[derive(Debug, Clone, Error)]
pub enum AuthorizationError {
    #[error("Missing credential. {0}")]
    MissingCredential(String),
    #[error("Malformed credential. {0}")]
    MalformedCredential(String),
    #[error("Invalid credential. {0}")]
    InvalidCredential(String),
    #[error("Insufficient permissions. {0}")]
    InsufficientPermission(String),
    #[error("{message}")]
    InsufficientVerification { missing: Vec<Factor>, message: String },
    #[error("Two-factor authentication required. {0}")]
    TwoFactorRequired(String),
    #[error("Rate limit exceeded. {0}")]
    RateLimited(String),
    #[error("Bad request. {0}")]
    BadRequest(String),
    #[error("Backing store unavailable. {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<SignatureError> for AuthorizationError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::MissingPartnerId | SignatureError::MissingSignature => {
                Self::MissingCredential(e.to_string())
            },
            SignatureError::InvalidPartnerId => Self::BadRequest(e.to_string()),
            SignatureError::UnknownPartner | SignatureError::SignatureMismatch => {
                Self::InvalidCredential(e.to_string())
            },
        }
    }
}

impl AuthorizationError {
    /// A stable, machine-readable name for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "MissingCredential",
            Self::MalformedCredential(_) => "MalformedCredential",
            Self::InvalidCredential(_) => "InvalidCredential",
            Self::InsufficientPermission(_) => "InsufficientPermission",
            Self::InsufficientVerification { .. } => "InsufficientVerification",
            Self::TwoFactorRequired(_) => "TwoFactorRequired",
            Self::RateLimited(_) => "RateLimited",
            Self::BadRequest(_) => "BadRequest",
            Self::StoreUnavailable(_) => "StoreUnavailable",
        }
    }
}
