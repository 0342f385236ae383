use std::{net::SocketAddr, sync::Arc, time::Duration};

use actix_web::{
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use gate_engine::{
    db_types::{PartnerId, SubjectId},
    signatures::calculate_hmac,
    GatekeeperStore,
    IdentityClaim,
    RateLimitRule,
};
use log::debug;
use serde_json::Value;

use crate::{
    auth::TokenIssuer,
    config::{AuthConfig, GatekeeperConfig},
    middleware::{CorsMiddlewareFactory, BRAND_ID_HEADER, BRAND_SIGNATURE_HEADER, GROOVE_SIGNATURE_HEADER},
    pipeline::Gatekeeper,
    routes::{
        AccountProfileRoute,
        BrandEventsRoute,
        BrandStatusRoute,
        CashbackSummaryRoute,
        CreateBrandRoute,
        GrooveWalletRoute,
        PlaceBetRoute,
        RequestWithdrawalRoute,
        WhoamiRoute,
    },
};

// Test-only secrets. DO NOT re-use these anywhere.
pub const JWT_SECRET: &str = "endpoint-tests-only-jwt-secret-0123456789";
pub const GROOVE_SECRET: &str = "endpoint-tests-only-groove-secret";
pub const STORE_TIMEOUT: Duration = Duration::from_millis(200);

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_kind(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub fn peer() -> SocketAddr {
    "203.0.113.7:40000".parse().unwrap()
}

/// Generous limits, so that only tests about rate limiting ever hit them.
pub fn gatekeeper_config() -> GatekeeperConfig {
    GatekeeperConfig {
        ip_rate_limit: RateLimitRule::per_second(1000),
        partner_rate_limit: RateLimitRule::per_second(1000),
        subject_rate_limit: None,
        store_timeout: STORE_TIMEOUT,
        ..GatekeeperConfig::default()
    }
    .with_groove_secret(GROOVE_SECRET)
}

pub fn gatekeeper<A: GatekeeperStore>(store: Arc<A>, config: &GatekeeperConfig) -> Gatekeeper<A> {
    Gatekeeper::new(store, &AuthConfig::new(JWT_SECRET), config)
}

pub fn claim_for(subject: SubjectId) -> IdentityClaim {
    let now = chrono::Utc::now();
    IdentityClaim::new(subject, now, now + chrono::Duration::minutes(5))
}

pub fn fully_verified(subject: SubjectId) -> IdentityClaim {
    claim_for(subject).with_email_verified(true).with_phone_verified(true).with_fully_verified(true)
}

pub fn issue_token(claim: IdentityClaim, valid_for: chrono::Duration) -> String {
    let issuer = TokenIssuer::new(&AuthConfig::new(JWT_SECRET).jwt_secret);
    issuer.issue_token(claim, valid_for).expect("Failed to sign token")
}

pub fn get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).peer_addr(peer())
}

pub fn post(path: &str) -> TestRequest {
    TestRequest::post().uri(path).peer_addr(peer())
}

pub fn with_bearer(req: TestRequest, claim: IdentityClaim) -> TestRequest {
    let token = issue_token(claim, chrono::Duration::minutes(5));
    req.insert_header(("Authorization", format!("Bearer {token}")))
}

/// A brand partner request with `body` signed under `key`.
pub fn signed_brand_post(path: &str, partner: PartnerId, key: &str, signed: &str, sent: &str) -> TestRequest {
    post(path)
        .insert_header((BRAND_ID_HEADER, partner.to_string()))
        .insert_header((BRAND_SIGNATURE_HEADER, calculate_hmac(key, signed.as_bytes())))
        .set_payload(sent.to_string())
}

pub fn signed_groove_get(path: &str, canonical: &str, key: &str) -> TestRequest {
    get(path).insert_header((GROOVE_SIGNATURE_HEADER, calculate_hmac(key, canonical.as_bytes())))
}

pub fn configure_routes<A: GatekeeperStore + 'static>(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(WhoamiRoute::<A>::new().unwrap())
            .service(AccountProfileRoute::<A>::new().unwrap())
            .service(CreateBrandRoute::<A>::new().unwrap())
            .service(CashbackSummaryRoute::<A>::new().unwrap())
            .service(PlaceBetRoute::<A>::new().unwrap())
            .service(RequestWithdrawalRoute::<A>::new().unwrap())
            .service(BrandEventsRoute::<A>::new().unwrap())
            .service(BrandStatusRoute::<A>::new().unwrap())
            .service(GrooveWalletRoute::<A>::new().unwrap()),
    );
}

/// Sends every request, in order, through one app instance so that limiter state carries over.
pub async fn send_all<A: GatekeeperStore + 'static>(
    gatekeeper: Gatekeeper<A>,
    cors_origins: Option<Vec<String>>,
    requests: Vec<TestRequest>,
) -> Vec<TestResponse> {
    let _ = env_logger::try_init();
    let app = App::new()
        .wrap(CorsMiddlewareFactory::new(cors_origins))
        .app_data(web::Data::new(gatekeeper))
        .configure(configure_routes::<A>);
    let service = test::init_service(app).await;
    let mut responses = Vec::with_capacity(requests.len());
    for req in requests {
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = test::read_body(res).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        debug!("Response {status}: {body}");
        responses.push(TestResponse { status, headers, body });
    }
    responses
}

pub async fn send<A: GatekeeperStore + 'static>(gatekeeper: Gatekeeper<A>, request: TestRequest) -> TestResponse {
    send_all(gatekeeper, None, vec![request]).await.remove(0)
}
