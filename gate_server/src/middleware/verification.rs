use actix_web::{dev::ServiceRequest, HttpMessage};
use gate_engine::{
    verification::failure_message,
    AuthorizationError,
    IdentityClaim,
    VerificationOutcome,
    VerificationTier,
};
use log::*;

use crate::pipeline::Gatekeeper;

pub(super) async fn verify<A>(
    gatekeeper: &Gatekeeper<A>,
    req: &ServiceRequest,
    claim: &IdentityClaim,
    tier: VerificationTier,
) -> Result<(), AuthorizationError> {
    match gatekeeper.verification().check(claim, tier).await? {
        VerificationOutcome::Satisfied(level) => {
            info!(target: "gate::audit", "{} satisfied {tier} with verification level {level}", claim.subject_id);
            req.extensions_mut().insert(level);
            Ok(())
        },
        VerificationOutcome::MissingVerifications(missing) => {
            Err(AuthorizationError::InsufficientVerification { message: failure_message(tier, &missing), missing })
        },
    }
}
