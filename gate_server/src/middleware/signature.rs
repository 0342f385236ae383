//! Partner request signatures.
//!
//! Brand partners sign with their own key, looked up by the `X-Brand-Id` header. Groove signs the canonical form of
//! its query string with one shared key from configuration. Both use hex-encoded HMAC-SHA256.
use std::str::FromStr;

use actix_web::{dev::ServiceRequest, web, HttpMessage};
use gate_common::HttpMethod;
use gate_engine::{
    db_types::PartnerId,
    helpers::bounded_lookup,
    signatures::{groove_canonical_payload, verify_signature},
    AuthorizationError,
    CredentialManagement,
    SignatureError,
};
use log::*;

use super::{header_str, BRAND_ID_HEADER, BRAND_SIGNATURE_HEADER, GROOVE_SIGNATURE_HEADER};
use crate::{
    data_objects::PartnerIdentity,
    helpers::bytes_to_payload,
    pipeline::{Gatekeeper, PartnerScheme},
};

pub(super) async fn verify_partner<A: CredentialManagement>(
    gatekeeper: &Gatekeeper<A>,
    req: &mut ServiceRequest,
    scheme: PartnerScheme,
) -> Result<PartnerIdentity, AuthorizationError> {
    let identity = match scheme {
        PartnerScheme::Brand => verify_brand(gatekeeper, req).await?,
        PartnerScheme::Groove => verify_groove(gatekeeper, req)?,
    };
    trace!("🔐️ Valid {scheme} signature for partner {:?}", identity.partner_id);
    req.extensions_mut().insert(identity);
    Ok(identity)
}

async fn verify_brand<A: CredentialManagement>(
    gatekeeper: &Gatekeeper<A>,
    req: &mut ServiceRequest,
) -> Result<PartnerIdentity, AuthorizationError> {
    let partner_id = header_str(req, BRAND_ID_HEADER).ok_or(SignatureError::MissingPartnerId)?;
    let partner_id = PartnerId::from_str(partner_id).map_err(|_| SignatureError::InvalidPartnerId)?;
    let signature = header_str(req, BRAND_SIGNATURE_HEADER).ok_or(SignatureError::MissingSignature)?.to_string();
    let key = bounded_lookup(
        gatekeeper.store_timeout(),
        "fetch_partner_signing_key",
        gatekeeper.store().fetch_partner_signing_key(&partner_id),
    )
    .await?
    .ok_or_else(|| {
        warn!("🔐️ Partner {partner_id} has no active signing key");
        SignatureError::UnknownPartner
    })?;
    let payload = signed_payload(req).await?;
    verify_signature(key.reveal(), &payload, &signature)?;
    Ok(PartnerIdentity { scheme: PartnerScheme::Brand, partner_id: Some(partner_id) })
}

fn verify_groove<A>(gatekeeper: &Gatekeeper<A>, req: &ServiceRequest) -> Result<PartnerIdentity, AuthorizationError> {
    let signature = header_str(req, GROOVE_SIGNATURE_HEADER).ok_or(SignatureError::MissingSignature)?;
    let secret = gatekeeper.groove_secret();
    if secret.is_empty() {
        error!("🔐️ A Groove callback arrived, but GATE_GROOVE_SECRET is not configured");
        return Err(SignatureError::UnknownPartner.into());
    }
    let params = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map_err(|e| AuthorizationError::BadRequest(format!("Could not parse the query string. {e}")))?
        .into_inner();
    let payload = groove_canonical_payload(&params);
    verify_signature(secret.reveal(), payload.as_bytes(), signature)?;
    Ok(PartnerIdentity { scheme: PartnerScheme::Groove, partner_id: None })
}

/// The bytes a brand partner signs: the raw query string for GET and DELETE, the body for everything else. A body
/// that is read here is put back on the request for the handler.
async fn signed_payload(req: &mut ServiceRequest) -> Result<web::Bytes, AuthorizationError> {
    let signs_query = HttpMethod::from_str(req.method().as_str()).map(|m| m.signs_query_string()).unwrap_or(false);
    if signs_query {
        return Ok(web::Bytes::copy_from_slice(req.query_string().as_bytes()));
    }
    let body = req.extract::<web::Bytes>().await.map_err(|e| {
        warn!("🔐️ Failed to read the request body of a signed request. {e}");
        AuthorizationError::BadRequest("Could not read request body".to_string())
    })?;
    req.set_payload(bytes_to_payload(body.clone()));
    Ok(body)
}
