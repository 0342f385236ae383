use std::sync::Arc;

use actix_web::http::StatusCode;
use gate_engine::{db_types::PartnerId, signatures::calculate_hmac, test_utils::MemoryStore, RateLimitRule};

use super::helpers::*;
use crate::{
    config::GatekeeperConfig,
    middleware::{BRAND_ID_HEADER, BRAND_SIGNATURE_HEADER, GROOVE_SIGNATURE_HEADER},
};

const BRAND_KEY: &str = "brand-42-signing-key";

fn brand_store() -> Arc<MemoryStore> {
    let store = MemoryStore::default();
    store.set_credential(PartnerId::new(42), BRAND_KEY, true);
    store.set_credential(PartnerId::new(7), "retired-key", false);
    Arc::new(store)
}

#[actix_web::test]
async fn signed_body_is_accepted_and_still_readable() {
    let body = r#"{"a":1}"#;
    let req = signed_brand_post("/api/partners/brand/events", PartnerId::new(42), BRAND_KEY, body, body);
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["partner_id"], 42);
    assert_eq!(res.body["received_bytes"], 7);
}

#[actix_web::test]
async fn altered_body_is_rejected() {
    let (signed, sent) = (r#"{"a":1}"#, r#"{"a":2}"#);
    let req = signed_brand_post("/api/partners/brand/events", PartnerId::new(42), BRAND_KEY, signed, sent);
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "InvalidCredential");
}

#[actix_web::test]
async fn missing_partner_id_is_rejected() {
    let req = post("/api/partners/brand/events")
        .insert_header((BRAND_SIGNATURE_HEADER, calculate_hmac(BRAND_KEY, b"{}")))
        .set_payload("{}");
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "MissingCredential");
}

#[actix_web::test]
async fn non_numeric_partner_id_is_a_bad_request() {
    let req = post("/api/partners/brand/events")
        .insert_header((BRAND_ID_HEADER, "forty-two"))
        .insert_header((BRAND_SIGNATURE_HEADER, calculate_hmac(BRAND_KEY, b"{}")))
        .set_payload("{}");
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_and_inactive_partners_are_rejected() {
    let gk = gatekeeper(brand_store(), &gatekeeper_config());
    let requests = vec![
        signed_brand_post("/api/partners/brand/events", PartnerId::new(99), BRAND_KEY, "{}", "{}"),
        signed_brand_post("/api/partners/brand/events", PartnerId::new(7), "retired-key", "{}", "{}"),
    ];
    let res = send_all(gk, None, requests).await;
    assert!(res.iter().all(|r| r.status == StatusCode::UNAUTHORIZED));
    assert!(res.iter().all(|r| r.error_kind() == "InvalidCredential"));
}

#[actix_web::test]
async fn get_requests_sign_the_query_string() {
    let query = "since=1700000000&limit=10";
    let req = get(&format!("/api/partners/brand/status?{query}"))
        .insert_header((BRAND_ID_HEADER, "42"))
        .insert_header((BRAND_SIGNATURE_HEADER, calculate_hmac(BRAND_KEY, query.as_bytes())));
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
}

#[actix_web::test]
async fn signature_hex_is_case_insensitive() {
    let req = post("/api/partners/brand/events")
        .insert_header((BRAND_ID_HEADER, "42"))
        .insert_header((BRAND_SIGNATURE_HEADER, calculate_hmac(BRAND_KEY, b"{}").to_uppercase()))
        .set_payload("{}");
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[actix_web::test]
async fn groove_callback_with_a_valid_signature() {
    let path = "/api/groove/wallet?request=getbalance&gamesessionid=abc&accountid=7&nogsgameid=80102";
    // accountid, gameid (from nogsgameid), gamesessionid. `request` is never signed.
    let req = signed_groove_get(path, "780102abc", GROOVE_SECRET);
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["request"], "getbalance");
    assert_eq!(res.body["scheme"], "groove");
}

#[actix_web::test]
async fn groove_callback_with_a_bad_signature() {
    let path = "/api/groove/wallet?request=getbalance&gamesessionid=abc&accountid=7";
    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), signed_groove_get(path, "7", GROOVE_SECRET)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = send(gatekeeper(brand_store(), &gatekeeper_config()), get(path)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "MissingCredential");
}

#[actix_web::test]
async fn groove_is_closed_without_a_shared_secret() {
    let config = GatekeeperConfig { groove_secret: Default::default(), ..gatekeeper_config() };
    let path = "/api/groove/wallet?accountid=7";
    let req = get(path).insert_header((GROOVE_SIGNATURE_HEADER, calculate_hmac("", b"7")));
    let res = send(gatekeeper(brand_store(), &config), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn partners_are_rate_limited_by_id() {
    let config = GatekeeperConfig { partner_rate_limit: RateLimitRule::per_second(2), ..gatekeeper_config() };
    let signed = || signed_brand_post("/api/partners/brand/events", PartnerId::new(42), BRAND_KEY, "{}", "{}");
    let res = send_all(gatekeeper(brand_store(), &config), None, vec![signed(), signed(), signed()]).await;
    assert_eq!(res[0].status, StatusCode::OK);
    assert_eq!(res[1].status, StatusCode::OK);
    assert_eq!(res[2].status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res[2].error_kind(), "RateLimited");
}

#[actix_web::test]
async fn cycling_brand_ids_does_not_escape_the_ip_limit() {
    let config = GatekeeperConfig { ip_rate_limit: RateLimitRule::per_second(3), ..gatekeeper_config() };
    let requests = (100..104)
        .map(|id| signed_brand_post("/api/partners/brand/events", PartnerId::new(id), "guessed-key", "{}", "{}"))
        .collect();
    let res = send_all(gatekeeper(brand_store(), &config), None, requests).await;
    assert!(res[..3].iter().all(|r| r.status == StatusCode::UNAUTHORIZED));
    assert_eq!(res[3].status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res[3].error_kind(), "RateLimited");
}
