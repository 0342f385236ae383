//! Tiered account-verification gating.
//!
//! A route declares the minimum [`VerificationTier`] it accepts, and the [`VerificationGate`] compares it with the
//! verification flags in the caller's [`IdentityClaim`]. When the tier is not met, the gate reports exactly which
//! factors are missing so that the client can fix them rather than retry blindly.
use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use futures_util::future::LocalBoxFuture;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{db_types::SubjectId, errors::StoreError, helpers::bounded_lookup, identity::IdentityClaim};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevatedDomain {
    Betting,
    Financial,
    Kyc,
}

impl ElevatedDomain {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Betting => "betting",
            Self::Financial => "financial",
            Self::Kyc => "KYC",
        }
    }
}

/// The minimum proof-of-identity strength a route demands. Tiers are ordered from weakest to strongest.
///
/// Every `Elevated` tier applies the same rule as `FullVerified`; the domain only changes the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    Basic,
    EmailVerified,
    PhoneVerified,
    PartialVerified,
    FullVerified,
    Elevated(ElevatedDomain),
}

impl VerificationTier {
    pub const BETTING: Self = Self::Elevated(ElevatedDomain::Betting);
    pub const FINANCIAL: Self = Self::Elevated(ElevatedDomain::Financial);
    pub const KYC: Self = Self::Elevated(ElevatedDomain::Kyc);

    /// The message returned to the client when this tier is not met.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Basic => "Access denied - insufficient verification level",
            Self::EmailVerified => "Email verification is required to access this resource",
            Self::PhoneVerified => "Phone verification is required to access this resource",
            Self::PartialVerified => "At least one verification method is required to access this resource",
            Self::FullVerified => "Full account verification is required to access this resource",
            Self::Elevated(ElevatedDomain::Betting) => "Account verification required for betting activities",
            Self::Elevated(ElevatedDomain::Financial) => {
                "Full account verification required for financial transactions"
            },
            Self::Elevated(ElevatedDomain::Kyc) => "KYC verification required for this operation",
        }
    }
}

impl Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => f.write_str("BASIC"),
            Self::EmailVerified => f.write_str("EMAIL_VERIFIED"),
            Self::PhoneVerified => f.write_str("PHONE_VERIFIED"),
            Self::PartialVerified => f.write_str("PARTIAL_VERIFIED"),
            Self::FullVerified => f.write_str("FULL_VERIFIED"),
            Self::Elevated(d) => write!(f, "{}_ACCESS", d.label().to_uppercase()),
        }
    }
}

/// A verification factor a subject may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Email,
    Phone,
    Custom,
}

impl Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Phone => f.write_str("phone"),
            Self::Custom => f.write_str("custom"),
        }
    }
}

/// The verification strength a subject has actually achieved, published to downstream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationLevel {
    None,
    Partial,
    Complete,
    Full,
}

impl VerificationLevel {
    pub fn of(claim: &IdentityClaim) -> Self {
        match (claim.fully_verified, claim.email_verified, claim.phone_verified) {
            (true, _, _) => Self::Full,
            (false, true, true) => Self::Complete,
            (false, true, false) | (false, false, true) => Self::Partial,
            (false, false, false) => Self::None,
        }
    }
}

impl Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Partial => f.write_str("PARTIAL"),
            Self::Complete => f.write_str("COMPLETE"),
            Self::Full => f.write_str("FULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Satisfied(VerificationLevel),
    MissingVerifications(Vec<Factor>),
}

impl VerificationOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }
}

pub type HookFuture = LocalBoxFuture<'static, Result<bool, StoreError>>;

/// A pluggable predicate over the subject id. A hook that returns `false` adds [`Factor::Custom`] to the missing
/// factors; a hook that errors fails the whole check.
#[derive(Clone)]
pub struct VerificationHook {
    name: String,
    predicate: Arc<dyn Fn(SubjectId) -> HookFuture + Send + Sync>,
}

impl VerificationHook {
    pub fn new<F, Fut>(name: &str, predicate: F) -> Self
    where
        F: Fn(SubjectId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, StoreError>> + 'static,
    {
        let predicate = Arc::new(move |subject| Box::pin(predicate(subject)) as HookFuture);
        Self { name: name.to_string(), predicate }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for VerificationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerificationHook({})", self.name)
    }
}

/// Returns the built-in factors `claim` is missing for `tier`, in the order `email`, `phone`.
pub fn missing_factors(claim: &IdentityClaim, tier: VerificationTier) -> Vec<Factor> {
    let mut missing = Vec::with_capacity(2);
    match tier {
        VerificationTier::Basic => {},
        VerificationTier::EmailVerified => {
            if !claim.email_verified {
                missing.push(Factor::Email);
            }
        },
        VerificationTier::PhoneVerified => {
            if !claim.phone_verified {
                missing.push(Factor::Phone);
            }
        },
        VerificationTier::PartialVerified => {
            if !claim.email_verified && !claim.phone_verified {
                missing.extend([Factor::Email, Factor::Phone]);
            }
        },
        VerificationTier::FullVerified | VerificationTier::Elevated(_) => {
            if !claim.has_full_verification() {
                if !claim.email_verified {
                    missing.push(Factor::Email);
                }
                if !claim.phone_verified {
                    missing.push(Factor::Phone);
                }
            }
        },
    }
    missing
}

/// The client-facing message for a failed check.
pub fn failure_message(tier: VerificationTier, missing: &[Factor]) -> String {
    if missing == [Factor::Custom] {
        return "Additional verification is required to access this resource".to_string();
    }
    tier.failure_message().to_string()
}

#[derive(Debug, Clone)]
pub struct VerificationGate {
    hooks: Vec<VerificationHook>,
    lookup_timeout: Duration,
}

impl VerificationGate {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self { hooks: Vec::new(), lookup_timeout }
    }

    pub fn with_hook(mut self, hook: VerificationHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Compares the claim's verification flags with `tier`. Custom hooks run for every tier above `Basic`, even when
    /// built-in factors are already missing, so that the response lists everything the client needs to do.
    pub async fn check(
        &self,
        claim: &IdentityClaim,
        tier: VerificationTier,
    ) -> Result<VerificationOutcome, StoreError> {
        let level = VerificationLevel::of(claim);
        if tier == VerificationTier::Basic {
            return Ok(VerificationOutcome::Satisfied(level));
        }
        let mut missing = missing_factors(claim, tier);
        for hook in &self.hooks {
            let passed = bounded_lookup(self.lookup_timeout, hook.name(), (hook.predicate)(claim.subject_id)).await?;
            if !passed {
                debug!("🔐️ Custom verification hook '{}' rejected {}", hook.name(), claim.subject_id);
                if !missing.contains(&Factor::Custom) {
                    missing.push(Factor::Custom);
                }
            }
        }
        if missing.is_empty() {
            Ok(VerificationOutcome::Satisfied(level))
        } else {
            Ok(VerificationOutcome::MissingVerifications(missing))
        }
    }
}
