use std::sync::Arc;

use actix_web::http::StatusCode;
use gate_engine::{db_types::SubjectId, test_utils::MemoryStore, StoreError, VerificationHook};
use serde_json::json;

use super::helpers::*;

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::default())
}

#[actix_web::test]
async fn whoami_without_a_token() {
    let res = send(gatekeeper(store(), &gatekeeper_config()), get("/api/whoami")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "MissingCredential");
    assert_eq!(res.body["code"], 401);
}

#[actix_web::test]
async fn whoami_with_the_wrong_scheme() {
    let req = get("/api/whoami").insert_header(("Authorization", "Basic dXNlcjpwYXNz"));
    let res = send(gatekeeper(store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "MalformedCredential");
}

#[actix_web::test]
async fn whoami_with_an_expired_token() {
    let token = issue_token(claim_for(SubjectId::random()), chrono::Duration::seconds(-5));
    let req = get("/api/whoami").insert_header(("Authorization", format!("Bearer {token}")));
    let res = send(gatekeeper(store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_kind(), "InvalidCredential");
}

#[actix_web::test]
async fn whoami_publishes_the_claim() {
    let subject = SubjectId::random();
    let req = with_bearer(get("/api/whoami"), claim_for(subject).with_email_verified(true));
    let res = send(gatekeeper(store(), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["subject_id"], subject.to_string());
    assert_eq!(res.body["email_verified"], true);
    assert_eq!(res.body["phone_verified"], false);
    assert_eq!(res.body["verification_level"], "PARTIAL");
}

#[actix_web::test]
async fn unauthenticated_and_unverified_are_different_failures() {
    let gk = gatekeeper(store(), &gatekeeper_config());
    let subject = SubjectId::random();
    let requests = vec![
        get("/api/account/profile"),
        with_bearer(get("/api/account/profile"), claim_for(subject)),
        with_bearer(get("/api/account/profile"), claim_for(subject).with_email_verified(true)),
    ];
    let res = send_all(gk, None, requests).await;
    assert_eq!(res[0].status, StatusCode::UNAUTHORIZED);

    assert_eq!(res[1].status, StatusCode::FORBIDDEN);
    assert_eq!(res[1].error_kind(), "InsufficientVerification");
    assert_eq!(res[1].body["missing_verifications"], json!(["email", "phone"]));
    assert_eq!(res[1].body["message"], "Full account verification is required to access this resource");

    assert_eq!(res[2].status, StatusCode::FORBIDDEN);
    assert_eq!(res[2].body["missing_verifications"], json!(["phone"]));
}

#[actix_web::test]
async fn both_factors_satisfy_full_verification() {
    let subject = SubjectId::random();
    let claim = claim_for(subject).with_email_verified(true).with_phone_verified(true);
    let res = send(gatekeeper(store(), &gatekeeper_config()), with_bearer(get("/api/account/profile"), claim)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["verification_level"], "COMPLETE");
}

#[actix_web::test]
async fn aggregate_flag_satisfies_full_verification() {
    let claim = claim_for(SubjectId::random()).with_fully_verified(true);
    let res = send(gatekeeper(store(), &gatekeeper_config()), with_bearer(get("/api/account/profile"), claim)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["verification_level"], "FULL");
}

#[actix_web::test]
async fn betting_tier_uses_its_own_message() {
    let claim = claim_for(SubjectId::random()).with_phone_verified(true);
    let res = send(gatekeeper(store(), &gatekeeper_config()), with_bearer(post("/api/bets"), claim)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Account verification required for betting activities");
    assert_eq!(res.body["missing_verifications"], json!(["email"]));
}

#[actix_web::test]
async fn failing_custom_hook_adds_a_custom_factor() {
    let gk = gatekeeper(store(), &gatekeeper_config())
        .with_verification_hook(VerificationHook::new("kyc_review", |_| async { Ok::<_, StoreError>(false) }));
    let res = send(gk, with_bearer(post("/api/bets"), fully_verified(SubjectId::random()))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["missing_verifications"], json!(["custom"]));
    assert_eq!(res.body["message"], "Additional verification is required to access this resource");
}

#[actix_web::test]
async fn erroring_custom_hook_fails_closed() {
    let gk = gatekeeper(store(), &gatekeeper_config()).with_verification_hook(VerificationHook::new(
        "kyc_review",
        |_| async { Err::<bool, _>(StoreError::DatabaseError("kyc service down".into())) },
    ));
    let res = send(gk, with_bearer(post("/api/bets"), fully_verified(SubjectId::random()))).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["message"], "Internal error");
}

#[actix_web::test]
async fn passing_custom_hook_lets_the_bet_through() {
    let gk = gatekeeper(store(), &gatekeeper_config())
        .with_verification_hook(VerificationHook::new("kyc_review", |_| async { Ok::<_, StoreError>(true) }));
    let res = send(gk, with_bearer(post("/api/bets"), fully_verified(SubjectId::random()))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
}
