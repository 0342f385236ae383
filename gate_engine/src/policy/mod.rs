//! Role-based policy enforcement.
//!
//! [`PolicyEngine::authorize`] answers "may this subject perform this permission?":
//! 1. The subject's roles are fetched.
//! 2. If any role is named `super`, the answer is yes, before any permission is looked up.
//! 3. Otherwise each role is checked with a [`PolicyResolver`], and the first grant wins. Permissions are additive, so
//!    a single granting role is enough. If no role grants the permission, the answer is no.
//!
//! Any store failure (including a lookup timeout) is returned as an error. Callers deny the request; nothing in this
//! module ever turns an error into an allow.
//!
//! Two grant representations exist in the store. [`MembershipResolver`] reads the role-to-permission join table and is
//! the canonical strategy. [`DeclarativeResolver`] evaluates the older declarative policy table and is deprecated; it
//! remains only so that the two can be compared over a shared fixture matrix.
mod engine;
mod matcher;
mod resolver;

pub use engine::{PolicyEngine, DEFAULT_LOOKUP_TIMEOUT};
pub use matcher::PolicyMatcher;
#[allow(deprecated)]
pub use resolver::{DeclarativeResolver, MembershipResolver, PolicyResolver};
