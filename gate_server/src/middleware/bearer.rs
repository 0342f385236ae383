use actix_web::{dev::ServiceRequest, http::header::AUTHORIZATION, HttpMessage};
use gate_engine::{verification::VerificationLevel, AuthorizationError, IdentityClaim};

use crate::{auth::TokenError, pipeline::Gatekeeper};

/// Verifies the bearer token and publishes the claim, along with the verification level it carries.
pub(super) fn authenticate<A>(
    gatekeeper: &Gatekeeper<A>,
    req: &ServiceRequest,
) -> Result<IdentityClaim, AuthorizationError> {
    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| TokenError::MalformedToken)?),
        None => None,
    };
    let claim = gatekeeper.tokens().verify_authorization_header(header)?;
    let mut extensions = req.extensions_mut();
    extensions.insert(VerificationLevel::of(&claim));
    extensions.insert(claim.clone());
    Ok(claim)
}
