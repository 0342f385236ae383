//! Request handler definitions
//!
//! Define each route and its handler here. Every guarded route is declared with the `route!` macro together with
//! the function that builds its [`RoutePolicy`]. The gatekeeper has done all of the access control by the time a
//! handler runs, so handlers only read what the pipeline published (see [`crate::data_objects`]).
//!
//! The handlers below are demonstrations of each kind of policy. They echo the pipeline outputs and touch no
//! business data.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any I/O must be expressed as futures.
use actix_web::{get, web, HttpResponse, Responder};
use gate_common::HttpMethod;
use gate_engine::{GatekeeperStore, VerificationTier};
use log::*;
use serde::Deserialize;
use serde_json::json;

use crate::{
    data_objects::{AchievedVerification, AuthenticatedSubject, JsonResponse, PartnerIdentity, TwoFactorVerified},
    pipeline::{PartnerScheme, RateLimitClass, RoutePolicy, RoutePolicyError},
};

// Web-actix cannot handle generics in middleware lookups, so each guarded route is a generated service factory that
// wraps the handler in the gatekeeper for store type `A`.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $bounds:ty where policy = $policy:path) => {
        paste::paste! { pub struct [<$name:camel Route>]<A> {
            policy: $crate::pipeline::RoutePolicy,
            _store: core::marker::PhantomData<fn() -> A>,
        }}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            /// Builds the route, failing if its policy is inconsistent.
            pub fn new() -> Result<Self, $crate::pipeline::RoutePolicyError> {
                Ok(Self { policy: $policy()?, _store: core::marker::PhantomData })
            }

            pub fn policy(&self) -> &$crate::pipeline::RoutePolicy {
                &self.policy
            }
        }}
        paste::paste! { impl<A> Clone for [<$name:camel Route>]<A> {
            fn clone(&self) -> Self {
                Self { policy: self.policy.clone(), _store: core::marker::PhantomData }
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $bounds + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name)
                    .wrap($crate::middleware::GatekeeperMiddlewareFactory::<A>::new(self.policy));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Identity  ----------------------------------------------------
pub fn whoami_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder().rate_limited(RateLimitClass::Ip).bearer().build()
}

route!(whoami => Get "/whoami" impl GatekeeperStore where policy = whoami_policy);
/// Returns the verified claims of the caller and the verification level they carry.
pub async fn whoami(subject: AuthenticatedSubject, level: AchievedVerification) -> impl Responder {
    debug!("💻️ GET whoami for {}", subject.subject_id);
    HttpResponse::Ok().json(json!({
        "subject_id": subject.subject_id,
        "email_verified": subject.email_verified,
        "phone_verified": subject.phone_verified,
        "verification_level": level.0,
    }))
}

pub fn account_profile_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .bearer()
        .verification(VerificationTier::FullVerified)
        .build()
}

route!(account_profile => Get "/account/profile" impl GatekeeperStore where policy = account_profile_policy);
pub async fn account_profile(subject: AuthenticatedSubject, level: AchievedVerification) -> impl Responder {
    HttpResponse::Ok().json(json!({ "subject_id": subject.subject_id, "verification_level": level.0 }))
}

//----------------------------------------------   Admin  ----------------------------------------------------
pub fn create_brand_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .rate_limited(RateLimitClass::Subject)
        .bearer()
        .permission("create brand", HttpMethod::Post)
        .build()
}

route!(create_brand => Post "/admin/brands" impl GatekeeperStore where policy = create_brand_policy);
pub async fn create_brand(subject: AuthenticatedSubject) -> impl Responder {
    info!("💻️ {} may create brands", subject.subject_id);
    HttpResponse::Ok().json(JsonResponse::success("Brand creation authorized"))
}

pub fn cashback_summary_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder().bearer().scope_permission("cashback").build()
}

route!(cashback_summary => Get "/admin/cashback/summary" impl GatekeeperStore where policy = cashback_summary_policy);
pub async fn cashback_summary(subject: AuthenticatedSubject) -> impl Responder {
    debug!("💻️ GET cashback summary for {}", subject.subject_id);
    HttpResponse::Ok().json(JsonResponse::success("Cashback access granted"))
}

//----------------------------------------------   Wallet  ----------------------------------------------------
pub fn place_bet_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder().rate_limited(RateLimitClass::Ip).bearer().verification(VerificationTier::BETTING).build()
}

route!(place_bet => Post "/bets" impl GatekeeperStore where policy = place_bet_policy);
pub async fn place_bet(subject: AuthenticatedSubject) -> impl Responder {
    debug!("💻️ POST bet for {}", subject.subject_id);
    HttpResponse::Ok().json(JsonResponse::success("Bet accepted"))
}

pub fn request_withdrawal_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .rate_limited(RateLimitClass::Subject)
        .bearer()
        .verification(VerificationTier::KYC)
        .two_factor()
        .permission("withdraw", HttpMethod::Post)
        .build()
}

route!(request_withdrawal => Post "/wallet/withdrawals" impl GatekeeperStore where policy = request_withdrawal_policy);
pub async fn request_withdrawal(
    subject: AuthenticatedSubject,
    level: AchievedVerification,
    two_factor: TwoFactorVerified,
) -> impl Responder {
    info!("💻️ Withdrawal authorized for {} using {}", subject.subject_id, two_factor.method);
    HttpResponse::Ok().json(json!({
        "subject_id": subject.subject_id,
        "verification_level": level.0,
        "two_factor_method": two_factor.method,
    }))
}

//----------------------------------------------   Partners  ----------------------------------------------------
// The partner id is unauthenticated when the limits run, so partner routes also draw on the caller's IP budget
pub fn brand_events_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .rate_limited(RateLimitClass::Partner)
        .partner(PartnerScheme::Brand)
        .build()
}

route!(brand_events => Post "/partners/brand/events" impl GatekeeperStore where policy = brand_events_policy);
/// The body has already been verified against the partner's signature, and is still readable here.
pub async fn brand_events(partner: PartnerIdentity, body: web::Bytes) -> impl Responder {
    debug!("💻️ {} byte event from partner {:?}", body.len(), partner.partner_id);
    HttpResponse::Ok().json(json!({ "partner_id": partner.partner_id, "received_bytes": body.len() }))
}

pub fn brand_status_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .rate_limited(RateLimitClass::Partner)
        .partner(PartnerScheme::Brand)
        .build()
}

route!(brand_status => Get "/partners/brand/status" impl GatekeeperStore where policy = brand_status_policy);
pub async fn brand_status(partner: PartnerIdentity) -> impl Responder {
    HttpResponse::Ok().json(json!({ "partner_id": partner.partner_id, "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct GrooveParams {
    pub request: Option<String>,
}

pub fn groove_wallet_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::builder()
        .rate_limited(RateLimitClass::Ip)
        .rate_limited(RateLimitClass::Partner)
        .partner(PartnerScheme::Groove)
        .build()
}

route!(groove_wallet => Get "/groove/wallet" impl GatekeeperStore where policy = groove_wallet_policy);
pub async fn groove_wallet(partner: PartnerIdentity, params: web::Query<GrooveParams>) -> impl Responder {
    let request = params.into_inner().request.unwrap_or_default();
    debug!("💻️ Groove '{request}' callback");
    HttpResponse::Ok().json(json!({ "scheme": partner.scheme, "request": request, "status": "200" }))
}
