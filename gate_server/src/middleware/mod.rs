//! Actix middleware for the request gatekeeper.
//!
//! [`GatekeeperMiddlewareFactory`] wraps a single route with its [`crate::pipeline::RoutePolicy`] and runs the
//! stages in the submodules in a fixed order. [`CorsMiddlewareFactory`] wraps the whole app.
mod bearer;
mod cors;
mod gatekeeper;
mod policy;
mod rate_limit;
mod signature;
mod two_factor;
mod verification;

use actix_web::dev::ServiceRequest;
pub use cors::{CorsMiddlewareFactory, CorsMiddlewareService};
pub use gatekeeper::{GatekeeperMiddlewareFactory, GatekeeperMiddlewareService, Stage};

pub const BRAND_ID_HEADER: &str = "X-Brand-Id";
pub const BRAND_SIGNATURE_HEADER: &str = "X-Brand-Signature";
pub const GROOVE_SIGNATURE_HEADER: &str = "X-Groove-Signature";
pub const TWO_FACTOR_TOKEN_HEADER: &str = "X-2FA-Token";
pub const TWO_FACTOR_BACKUP_CODE_HEADER: &str = "X-2FA-Backup-Code";

/// A trimmed, non-empty header value. Values that are not valid header text count as absent.
fn header_str<'r>(req: &'r ServiceRequest, name: &str) -> Option<&'r str> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|s| !s.is_empty())
}
