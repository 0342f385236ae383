//! Gatekeeper engine
//!
//! This library holds the decision logic behind the platform's request gatekeeper. It has no HTTP dependencies; the
//! server crate wires it into a middleware chain.
//!
//! The library is divided into three parts:
//! 1. Lookup contracts ([`mod@traits`]) and their backends. The gatekeeper reads roles, grants, policy rules, partner
//!    keys and two-factor status through these traits. A SQLite backend is provided behind the `sqlite` feature, and
//!    [`CachedStore`] can wrap any backend with a TTL cache.
//! 2. Decision components: the [`PolicyEngine`], the [`VerificationGate`], partner [`signatures`] and the
//!    [`SlidingWindowLimiter`]. Each one is usable on its own.
//! 3. The shared vocabulary: [`db_types`], the [`IdentityClaim`] carried by bearer tokens, and the error taxonomy in
//!    [`errors`].
//!
//! Every decision fails closed. A lookup that errors or times out denies the request.
pub mod cache;
pub mod db_types;
pub mod errors;
pub mod helpers;
pub mod identity;
pub mod policy;
pub mod rate_limiter;
pub mod signatures;
pub mod totp;
pub mod traits;
pub mod verification;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cache::{CachedStore, DEFAULT_CACHE_TTL};
pub use errors::{AuthorizationError, SignatureError, StoreError};
pub use identity::IdentityClaim;
pub use policy::{PolicyEngine, DEFAULT_LOOKUP_TIMEOUT};
pub use rate_limiter::{RateLimitDecision, RateLimitKey, RateLimitRule, SlidingWindowLimiter};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{CredentialManagement, GatekeeperStore, PolicyManagement, RoleManagement, TwoFactorManagement};
pub use verification::{
    Factor,
    VerificationGate,
    VerificationHook,
    VerificationLevel,
    VerificationOutcome,
    VerificationTier,
};
