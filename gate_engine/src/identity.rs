use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::SubjectId;

/// The identity carried by a verified bearer token. It is never persisted and lives only for the duration of a
/// single request.
///
/// The field names on the wire match the claims minted by the platform's login service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    #[serde(rename = "user_id")]
    pub subject_id: SubjectId,
    /// Unix timestamp (seconds)
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Unix timestamp (seconds)
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(rename = "is_verified", default)]
    pub fully_verified: bool,
}

impl IdentityClaim {
    pub fn new(subject_id: SubjectId, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            issued_at: issued_at.timestamp(),
            expires_at: expires_at.timestamp(),
            email_verified: false,
            phone_verified: false,
            fully_verified: false,
        }
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    pub fn with_phone_verified(mut self, verified: bool) -> Self {
        self.phone_verified = verified;
        self
    }

    pub fn with_fully_verified(mut self, verified: bool) -> Self {
        self.fully_verified = verified;
        self
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.issued_at, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    /// Both factors are present, either individually or through the aggregate flag.
    pub fn has_full_verification(&self) -> bool {
        self.fully_verified || (self.email_verified && self.phone_verified)
    }
}
