use std::sync::Arc;

use actix_web::{http::StatusCode, test::TestRequest};
use gate_common::HttpMethod;
use gate_engine::{
    db_types::{Permission, SubjectId},
    test_utils::MemoryStore,
};

use super::helpers::*;
use crate::middleware::{TWO_FACTOR_BACKUP_CODE_HEADER, TWO_FACTOR_TOKEN_HEADER};

const CURRENT_TOKEN: &str = "492039";

/// A fully verified subject who may withdraw, with two-factor enabled when `enrolled` is true.
fn withdrawal_store(subject: &SubjectId, enrolled: bool) -> Arc<MemoryStore> {
    let store = MemoryStore::default();
    let player = store.add_role("player");
    store.bind(subject, &player);
    store.grant(&player, &Permission::new("withdraw", HttpMethod::Post));
    if enrolled {
        store.enable_two_factor(subject, CURRENT_TOKEN);
        store.add_backup_code(subject, "k3y-b4ck-up");
    }
    Arc::new(store)
}

fn withdrawal(subject: SubjectId) -> TestRequest {
    with_bearer(post("/api/wallet/withdrawals"), fully_verified(subject))
}

#[actix_web::test]
async fn withdrawal_with_a_valid_token() {
    let subject = SubjectId::random();
    let req = withdrawal(subject).insert_header((TWO_FACTOR_TOKEN_HEADER, CURRENT_TOKEN));
    let res = send(gatekeeper(withdrawal_store(&subject, true), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["two_factor_method"], "totp");
    assert_eq!(res.body["verification_level"], "FULL");
}

#[actix_web::test]
async fn two_factor_must_be_enabled() {
    let subject = SubjectId::random();
    let req = withdrawal(subject).insert_header((TWO_FACTOR_TOKEN_HEADER, CURRENT_TOKEN));
    let res = send(gatekeeper(withdrawal_store(&subject, false), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_kind(), "TwoFactorRequired");
}

#[actix_web::test]
async fn missing_and_wrong_tokens_are_unauthorized() {
    let subject = SubjectId::random();
    let gk = gatekeeper(withdrawal_store(&subject, true), &gatekeeper_config());
    let requests = vec![withdrawal(subject), withdrawal(subject).insert_header((TWO_FACTOR_TOKEN_HEADER, "000000"))];
    let res = send_all(gk, None, requests).await;
    assert_eq!(res[0].status, StatusCode::UNAUTHORIZED);
    assert_eq!(res[0].error_kind(), "MissingCredential");
    assert_eq!(res[1].status, StatusCode::UNAUTHORIZED);
    assert_eq!(res[1].error_kind(), "InvalidCredential");
}

#[actix_web::test]
async fn backup_codes_are_single_use() {
    let subject = SubjectId::random();
    let gk = gatekeeper(withdrawal_store(&subject, true), &gatekeeper_config());
    let with_code = || withdrawal(subject).insert_header((TWO_FACTOR_BACKUP_CODE_HEADER, "k3y-b4ck-up"));
    let res = send_all(gk, None, vec![with_code(), with_code()]).await;
    assert_eq!(res[0].status, StatusCode::OK);
    assert_eq!(res[0].body["two_factor_method"], "backup_code");
    assert_eq!(res[1].status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_takes_precedence_over_a_backup_code() {
    let subject = SubjectId::random();
    let req = withdrawal(subject)
        .insert_header((TWO_FACTOR_TOKEN_HEADER, "000000"))
        .insert_header((TWO_FACTOR_BACKUP_CODE_HEADER, "k3y-b4ck-up"));
    let res = send(gatekeeper(withdrawal_store(&subject, true), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn verification_is_checked_before_two_factor() {
    let subject = SubjectId::random();
    let req = with_bearer(post("/api/wallet/withdrawals"), claim_for(subject).with_email_verified(true));
    let res = send(gatekeeper(withdrawal_store(&subject, false), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_kind(), "InsufficientVerification");
    assert_eq!(res.body["message"], "KYC verification required for this operation");
    assert_eq!(res.body["missing_verifications"], serde_json::json!(["phone"]));
}

#[actix_web::test]
async fn permission_is_checked_after_two_factor() {
    let subject = SubjectId::random();
    let store = MemoryStore::default();
    store.enable_two_factor(&subject, CURRENT_TOKEN);
    let req = withdrawal(subject).insert_header((TWO_FACTOR_TOKEN_HEADER, CURRENT_TOKEN));
    let res = send(gatekeeper(Arc::new(store), &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_kind(), "InsufficientPermission");
}

#[actix_web::test]
async fn store_failure_during_step_up() {
    let subject = SubjectId::random();
    let store = withdrawal_store(&subject, true);
    store.set_failing(true);
    let req = withdrawal(subject).insert_header((TWO_FACTOR_TOKEN_HEADER, CURRENT_TOKEN));
    let res = send(gatekeeper(store, &gatekeeper_config()), req).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}
