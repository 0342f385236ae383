//! # Lookup store contracts
//!
//! The gatekeeper never owns user, role, permission or partner records. It reads them through the narrow traits in
//! this module, and any backend that implements them can sit behind the pipeline.
//!
//! * [`RoleManagement`] resolves the roles a subject holds and the direct role-to-permission join table.
//! * [`PolicyManagement`] exposes the declarative policy table (the older enforcement strategy, kept for parity
//!   testing only).
//! * [`CredentialManagement`] looks up and rotates partner signing keys.
//! * [`TwoFactorManagement`] reports whether a subject has step-up authentication enabled and verifies a presented
//!   factor.
//!
//! Administrative writes (grants, rotations) live on the same traits so that caching layers can invalidate exactly
//! what a write touches.
mod credential_management;
mod policy_management;
mod role_management;
mod two_factor_management;

pub use credential_management::CredentialManagement;
pub use policy_management::PolicyManagement;
pub use role_management::RoleManagement;
pub use two_factor_management::TwoFactorManagement;

/// Everything the request pipeline needs from its backing store.
pub trait GatekeeperStore: RoleManagement + PolicyManagement + CredentialManagement + TwoFactorManagement {}

impl<T> GatekeeperStore for T where T: RoleManagement + PolicyManagement + CredentialManagement + TwoFactorManagement {}
