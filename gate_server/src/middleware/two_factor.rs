use actix_web::{dev::ServiceRequest, HttpMessage};
use gate_engine::{
    db_types::{SubjectId, TwoFactorProof},
    helpers::bounded_lookup,
    AuthorizationError,
    TwoFactorManagement,
};
use log::*;

use super::{header_str, TWO_FACTOR_BACKUP_CODE_HEADER, TWO_FACTOR_TOKEN_HEADER};
use crate::{data_objects::TwoFactorVerified, pipeline::Gatekeeper};

/// A TOTP token takes precedence over a backup code when both are sent.
fn presented_proof(req: &ServiceRequest) -> Option<TwoFactorProof> {
    header_str(req, TWO_FACTOR_TOKEN_HEADER)
        .map(|t| TwoFactorProof::Token(t.to_string()))
        .or_else(|| header_str(req, TWO_FACTOR_BACKUP_CODE_HEADER).map(|c| TwoFactorProof::BackupCode(c.to_string())))
}

pub(super) async fn step_up<A: TwoFactorManagement>(
    gatekeeper: &Gatekeeper<A>,
    req: &ServiceRequest,
    subject: &SubjectId,
) -> Result<TwoFactorVerified, AuthorizationError> {
    let timeout = gatekeeper.store_timeout();
    let status =
        bounded_lookup(timeout, "fetch_two_factor_status", gatekeeper.store().fetch_two_factor_status(subject)).await?;
    if !status.enabled {
        return Err(AuthorizationError::TwoFactorRequired(
            "Two-factor authentication must be enabled for this operation".to_string(),
        ));
    }
    let proof = presented_proof(req).ok_or_else(|| {
        AuthorizationError::MissingCredential("A two-factor token or backup code is required".to_string())
    })?;
    let valid =
        bounded_lookup(timeout, "verify_two_factor", gatekeeper.store().verify_two_factor(subject, &proof)).await?;
    if !valid {
        return Err(AuthorizationError::InvalidCredential("Invalid two-factor token or backup code".to_string()));
    }
    let verified = TwoFactorVerified { method: proof.method() };
    info!(target: "gate::audit", "{subject} passed two-factor step-up with a {}", verified.method);
    req.extensions_mut().insert(verified);
    Ok(verified)
}
