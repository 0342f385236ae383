use std::{sync::Arc, time::Duration};

use actix_web::http::StatusCode;
use gate_common::HttpMethod;
use gate_engine::{
    db_types::{Permission, Role, RoleId, SubjectId},
    test_utils::MemoryStore,
    GatekeeperStore,
    StoreError,
};

use super::{helpers::*, mocks::MockStore};

fn create_brand() -> Permission {
    Permission::new("create brand", HttpMethod::Post)
}

async fn create_brand_as<A: GatekeeperStore + 'static>(store: Arc<A>, subject: SubjectId) -> TestResponse {
    send(gatekeeper(store, &gatekeeper_config()), with_bearer(post("/api/admin/brands"), claim_for(subject))).await
}

#[actix_web::test]
async fn granted_role_may_create_brands() {
    let store = MemoryStore::default();
    let subject = SubjectId::random();
    let admin = store.add_role("brand_admin");
    store.bind(&subject, &admin);
    store.grant(&admin, &create_brand());
    let res = create_brand_as(Arc::new(store), subject).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Brand creation authorized");
}

#[actix_web::test]
async fn grant_for_another_method_does_not_count() {
    let store = MemoryStore::default();
    let subject = SubjectId::random();
    let admin = store.add_role("brand_admin");
    store.bind(&subject, &admin);
    store.grant(&admin, &Permission::new("create brand", HttpMethod::Get));
    let res = create_brand_as(Arc::new(store), subject).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_kind(), "InsufficientPermission");
    assert_eq!(res.body["message"], "create brand [POST] is required");
}

#[actix_web::test]
async fn subject_without_roles_is_forbidden() {
    let store = Arc::new(MemoryStore::default());
    let res = create_brand_as(store, SubjectId::random()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn super_role_bypasses_grants() {
    let store = MemoryStore::default();
    let subject = SubjectId::random();
    let root = store.add_role("super");
    store.bind(&subject, &root);
    let store = Arc::new(store);
    let gk = gatekeeper(Arc::clone(&store), &gatekeeper_config());
    let requests = vec![
        with_bearer(post("/api/admin/brands"), claim_for(subject)),
        with_bearer(get("/api/admin/cashback/summary"), claim_for(subject)),
    ];
    let res = send_all(gk, None, requests).await;
    assert!(res.iter().all(|r| r.status == StatusCode::OK));
    assert_eq!(store.grant_lookups(), 0);
}

#[actix_web::test]
async fn scope_permission_ignores_the_method() {
    let store = MemoryStore::default();
    let subject = SubjectId::random();
    let finance = store.add_role("finance");
    store.bind(&subject, &finance);
    store.grant(&finance, &Permission::new("cashback", HttpMethod::Post));
    let gk = gatekeeper(Arc::new(store), &gatekeeper_config());
    let requests = vec![
        with_bearer(get("/api/admin/cashback/summary"), claim_for(subject)),
        with_bearer(get("/api/admin/cashback/summary"), claim_for(SubjectId::random())),
    ];
    let res = send_all(gk, None, requests).await;
    assert_eq!(res[0].status, StatusCode::OK);
    assert_eq!(res[1].status, StatusCode::FORBIDDEN);
    assert_eq!(res[1].body["message"], "cashback is required");
}

#[actix_web::test]
async fn store_failure_is_an_opaque_500() {
    let store = MemoryStore::default();
    store.set_failing(true);
    let res = create_brand_as(Arc::new(store), SubjectId::random()).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error_kind(), "StoreUnavailable");
    assert_eq!(res.body["message"], "Internal error");
}

#[actix_web::test]
async fn slow_store_times_out() {
    let store = MemoryStore::default();
    store.set_delay(STORE_TIMEOUT + Duration::from_millis(300));
    let res = create_brand_as(Arc::new(store), SubjectId::random()).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["message"], "Internal error");
}

#[actix_web::test]
async fn super_is_found_among_many_roles() {
    let subject = SubjectId::random();
    let mut store = MockStore::new();
    store.expect_fetch_roles_for_subject().times(1).returning(|_| {
        Ok(vec![Role::new(RoleId::random(), "support"), Role::new(RoleId::random(), "super")])
    });
    store.expect_role_has_permission().never();
    let res = create_brand_as(Arc::new(store), subject).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[actix_web::test]
async fn grant_lookup_error_denies_even_if_a_later_role_would_allow() {
    let mut store = MockStore::new();
    store.expect_fetch_roles_for_subject().returning(|_| {
        Ok(vec![Role::new(RoleId::random(), "support"), Role::new(RoleId::random(), "brand_admin")])
    });
    store
        .expect_role_has_permission()
        .times(1)
        .returning(|_, _| Err(StoreError::DatabaseError("reset by peer".into())));
    let res = create_brand_as(Arc::new(store), SubjectId::random()).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}
