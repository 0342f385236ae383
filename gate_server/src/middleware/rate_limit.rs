use actix_web::dev::ServiceRequest;
use gate_engine::{
    db_types::{PartnerId, SubjectId},
    AuthorizationError,
    RateLimitKey,
    SlidingWindowLimiter,
};
use log::*;

use super::{header_str, BRAND_ID_HEADER};
use crate::pipeline::{Gatekeeper, RateLimitClass, RoutePolicy};

/// Applies the IP and partner limits, which run before anything about the caller is known.
pub(super) fn check_connection_limits<A>(
    gatekeeper: &Gatekeeper<A>,
    policy: &RoutePolicy,
    req: &ServiceRequest,
    remote_ip: &str,
) -> Result<(), AuthorizationError> {
    for &class in policy.rate_limits() {
        let key = match class {
            RateLimitClass::Ip => RateLimitKey::Ip(remote_ip.to_string()),
            RateLimitClass::Partner => header_str(req, BRAND_ID_HEADER)
                .and_then(|s| s.parse::<PartnerId>().ok())
                .map(RateLimitKey::Partner)
                .unwrap_or_else(|| RateLimitKey::Ip(remote_ip.to_string())),
            RateLimitClass::Subject => continue,
        };
        if let Some(limiter) = gatekeeper.limiter(class) {
            enforce(limiter, &key)?;
        }
    }
    Ok(())
}

pub(super) fn check_subject_limit<A>(
    gatekeeper: &Gatekeeper<A>,
    policy: &RoutePolicy,
    subject: &SubjectId,
) -> Result<(), AuthorizationError> {
    if !policy.is_rate_limited(RateLimitClass::Subject) {
        return Ok(());
    }
    match gatekeeper.limiter(RateLimitClass::Subject) {
        Some(limiter) => enforce(limiter, &RateLimitKey::Subject(*subject)),
        None => {
            trace!("🚦️ Per-subject rate limiting is not configured. Skipping.");
            Ok(())
        },
    }
}

fn enforce(limiter: &SlidingWindowLimiter, key: &RateLimitKey) -> Result<(), AuthorizationError> {
    let decision = limiter.check(key);
    if decision.allowed {
        trace!("🚦️ {key} has {} of {} requests left ({})", decision.remaining, decision.limit, limiter.name());
        Ok(())
    } else {
        Err(AuthorizationError::RateLimited(format!(
            "Too many requests. Try again in {}ms",
            decision.retry_after.as_millis().max(1)
        )))
    }
}
