//! The values the request pipeline publishes to handlers, and the extractors that read them back.
use std::{
    fmt::Display,
    future::{ready, Ready},
    ops::Deref,
};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use gate_engine::{
    db_types::{PartnerId, TwoFactorMethod},
    verification::VerificationLevel,
    IdentityClaim,
};
use log::error;
use serde::{Deserialize, Serialize};

use crate::{errors::ServerError, pipeline::PartnerScheme};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// The partner whose signature was verified on this request. Groove callbacks carry no partner id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerIdentity {
    pub scheme: PartnerScheme,
    pub partner_id: Option<PartnerId>,
}

/// Published by the two-factor stage when the caller passed a step-up check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorVerified {
    pub method: TwoFactorMethod,
}

/// The verified bearer token claims of the caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedSubject(pub IdentityClaim);

impl Deref for AuthenticatedSubject {
    type Target = IdentityClaim;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The verification level the caller achieved at the verification stage.
#[derive(Debug, Clone, Copy)]
pub struct AchievedVerification(pub VerificationLevel);

fn from_extensions<T: Clone + 'static>(req: &HttpRequest, what: &str) -> Result<T, actix_web::Error> {
    req.extensions().get::<T>().cloned().ok_or_else(|| {
        error!("💻️ A handler on {} asked for the {what}, but the route policy does not produce one", req.path());
        ServerError::Unspecified(format!("No {what} is available on this route")).into()
    })
}

impl FromRequest for AuthenticatedSubject {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions::<IdentityClaim>(req, "identity claim").map(Self))
    }
}

impl FromRequest for AchievedVerification {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions::<VerificationLevel>(req, "verification level").map(Self))
    }
}

impl FromRequest for PartnerIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions::<PartnerIdentity>(req, "partner identity"))
    }
}

impl FromRequest for TwoFactorVerified {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(from_extensions::<TwoFactorVerified>(req, "two-factor result"))
    }
}
