use std::sync::Arc;

use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    App,
};
use gate_engine::{db_types::SubjectId, test_utils::MemoryStore, RateLimitRule};

use super::helpers::*;
use crate::{config::GatekeeperConfig, pipeline::Gatekeeper};

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::default())
}

#[actix_web::test]
async fn ip_limit_applies_per_address() {
    let config = GatekeeperConfig { ip_rate_limit: RateLimitRule::per_second(2), ..gatekeeper_config() };
    let subject = SubjectId::random();
    let whoami = || with_bearer(get("/api/whoami"), claim_for(subject));
    let other_peer = "198.51.100.20:51000".parse().unwrap();
    let requests = vec![whoami(), whoami(), whoami(), whoami().peer_addr(other_peer)];
    let res = send_all(gatekeeper(store(), &config), None, requests).await;
    assert_eq!(res[0].status, StatusCode::OK);
    assert_eq!(res[1].status, StatusCode::OK);
    assert_eq!(res[2].status, StatusCode::TOO_MANY_REQUESTS);
    assert!(res[2].body["message"].as_str().unwrap().starts_with("Too many requests"));
    assert_eq!(res[3].status, StatusCode::OK);
}

#[actix_web::test]
async fn rate_limit_runs_before_authentication() {
    let config = GatekeeperConfig { ip_rate_limit: RateLimitRule::per_second(1), ..gatekeeper_config() };
    let res = send_all(gatekeeper(store(), &config), None, vec![get("/api/whoami"), get("/api/whoami")]).await;
    assert_eq!(res[0].status, StatusCode::UNAUTHORIZED);
    assert_eq!(res[1].status, StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn subject_limit_applies_when_configured() {
    let config = GatekeeperConfig { subject_rate_limit: Some(RateLimitRule::per_second(1)), ..gatekeeper_config() };
    let store = MemoryStore::default();
    let subject = SubjectId::random();
    let root = store.add_role("super");
    store.bind(&subject, &root);
    let create = || with_bearer(post("/api/admin/brands"), claim_for(subject));
    let other = with_bearer(post("/api/admin/brands"), claim_for(SubjectId::random()));
    let res = send_all(gatekeeper(Arc::new(store), &config), None, vec![create(), create(), other]).await;
    assert_eq!(res[0].status, StatusCode::OK);
    assert_eq!(res[1].status, StatusCode::TOO_MANY_REQUESTS);
    // A different subject has its own budget, and is then refused by the policy engine instead
    assert_eq!(res[2].status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn preflight_is_answered_without_authentication() {
    let origins = Some(vec!["https://casino.example".to_string()]);
    let preflight = |origin: &str| {
        TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/api/admin/brands")
            .peer_addr(peer())
            .insert_header((header::ORIGIN, origin.to_string()))
    };
    let requests = vec![preflight("https://casino.example"), preflight("https://evil.example")];
    let res = send_all(gatekeeper(store(), &gatekeeper_config()), origins, requests).await;
    assert_eq!(res[0].status, StatusCode::NO_CONTENT);
    assert_eq!(res[0].headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://casino.example");
    assert_eq!(res[0].headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    assert_eq!(res[1].status, StatusCode::NO_CONTENT);
    assert!(res[1].headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[actix_web::test]
async fn denials_carry_cors_headers() {
    let req = get("/api/whoami").insert_header((header::ORIGIN, "https://casino.example"));
    let res = send_all(gatekeeper(store(), &gatekeeper_config()), None, vec![req]).await;
    assert_eq!(res[0].status, StatusCode::UNAUTHORIZED);
    assert_eq!(res[0].headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://casino.example");
}

#[actix_web::test]
async fn missing_gatekeeper_fails_closed() {
    let app = App::new().configure(configure_routes::<MemoryStore>);
    let service = test::init_service(app).await;
    let req = with_bearer(get("/api/whoami"), claim_for(SubjectId::random())).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn gatekeeper_for_another_store_type_is_not_used() {
    let gk: Gatekeeper<MemoryStore> = gatekeeper(store(), &gatekeeper_config());
    let app = App::new().app_data(actix_web::web::Data::new(gk)).configure(configure_routes::<super::mocks::MockStore>);
    let service = test::init_service(app).await;
    let req = with_bearer(get("/api/whoami"), claim_for(SubjectId::random())).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
