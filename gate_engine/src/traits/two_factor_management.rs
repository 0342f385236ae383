use crate::{
    db_types::{SubjectId, TwoFactorProof, TwoFactorStatus},
    errors::StoreError,
};

/// The second-factor collaborator. Enrolment and OTP mechanics live elsewhere; the gatekeeper only asks whether
/// step-up is enabled for a subject and whether a presented factor is valid.
#[allow(async_fn_in_trait)]
pub trait TwoFactorManagement {
    /// Fetches the subject's 2FA status. Unknown subjects have 2FA disabled.
    async fn fetch_two_factor_status(&self, subject: &SubjectId) -> Result<TwoFactorStatus, StoreError>;

    /// Verifies a token or backup code for the subject. Backup codes are single use.
    async fn verify_two_factor(&self, subject: &SubjectId, proof: &TwoFactorProof) -> Result<bool, StoreError>;
}
