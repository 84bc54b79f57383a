//! End-to-end HTTP flows through the in-process application.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{Method, StatusCode};
use quotes_test_utils::{build_request, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_health_reports_store_state() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    app.store.set_unavailable(true);
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_rejected_with_challenge() {
    let app = TestApp::spawn().await;

    let response = app
        .send_raw(build_request(Method::GET, "/users/me", None, None))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Bearer"));
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/users/me", Some("not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_first_login_provisions_with_truncated_name() {
    let app = TestApp::spawn().await;
    let token = app
        .login("ext-99", "Long Name Exceeding Thirty Two Characters!!")
        .await;

    let (status, body) = app.get("/users/me", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Long Name Exceeding Thirty Two C");
    assert_eq!(app.store.user_count(), 1);
}

#[tokio::test]
async fn test_known_user_does_not_query_authority_again() {
    let app = TestApp::spawn().await;
    let token = app.login("ext-1", "Alice").await;

    for _ in 0..3 {
        let (status, _) = app.get("/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.authority.request_count("/users/ext-1").await, 1);
    assert_eq!(app.store.user_count(), 1);
}

#[tokio::test]
async fn test_subject_unknown_to_authority_is_denied() {
    let app = TestApp::spawn().await;
    app.authority.mount_unknown_user("ext-ghost").await;
    let token = app.token_for("ext-ghost");

    let (status, body) = app.get("/users/me", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "ACCESS_DENIED");
    assert_eq!(app.store.user_count(), 0);
}

#[tokio::test]
async fn test_update_own_display_name() {
    let app = TestApp::spawn().await;
    let token = app.login("ext-1", "Alice").await;

    let (status, body) = app
        .patch("/users/me", Some(&token), json!({ "display_name": "Alice B." }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice B.");

    let (status, _) = app
        .patch("/users/me", Some(&token), json!({ "display_name": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_creation_validation_and_conflict() {
    let app = TestApp::spawn().await;
    let token = app.login("ext-1", "Alice").await;

    let (status, body) = app
        .post(
            "/groups",
            Some(&token),
            json!({ "invite_code": "QUOTES", "display_name": "Office" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invite_code"], "QUOTES");
    assert_eq!(body["creator"]["display_name"], "Alice");

    let (status, body) = app
        .post(
            "/groups",
            Some(&token),
            json!({ "invite_code": "QUOTES", "display_name": "Again" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "RESOURCE_ALREADY_EXISTS");

    let (status, _) = app
        .post(
            "/groups",
            Some(&token),
            json!({ "invite_code": "TOOLONGCODE", "display_name": "Office" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_membership_lifecycle() {
    let app = TestApp::spawn().await;
    let alice = app.login("ext-1", "Alice").await;
    let bob = app.login("ext-2", "Bob").await;

    let (_, group) = app
        .post(
            "/groups",
            Some(&alice),
            json!({ "invite_code": "QUOTES", "display_name": "Office" }),
        )
        .await;
    let group_id = group["id"].as_i64().unwrap();
    let (_, bob_profile) = app.get("/users/me", Some(&bob)).await;
    let bob_id = bob_profile["id"].as_i64().unwrap();

    // Not a member yet.
    let (status, body) = app.get(&format!("/groups/{group_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Join by invite code, twice.
    let (status, joined) = app
        .post("/groups/invite", Some(&bob), json!({ "invite_code": "QUOTES" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["id"].as_i64().unwrap(), group_id);
    let (status, _) = app
        .post("/groups/invite", Some(&bob), json!({ "invite_code": "QUOTES" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, members) = app
        .get(&format!("/groups/{group_id}/users"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);

    // Group-specific name, visible to other members.
    let (status, updated) = app
        .patch(
            &format!("/groups/{group_id}/users/me"),
            Some(&bob),
            json!({ "display_name": "CHIEF" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["display_name"], "CHIEF");
    let (_, member) = app
        .get(&format!("/groups/{group_id}/users/{bob_id}"), Some(&alice))
        .await;
    assert_eq!(member["display_name"], "CHIEF");
    assert_eq!(member["user"]["display_name"], "Bob");

    // Leave; access is revoked at once even though it was cached.
    let (status, _) = app
        .delete(&format!("/groups/{group_id}/users/me"), Some(&bob))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/groups/{group_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, members) = app
        .get(&format!("/groups/{group_id}/users"), Some(&alice))
        .await;
    assert_eq!(members.as_array().unwrap().len(), 1);
    let (status, body) = app.get("/groups/me", Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "GROUP_NOT_FOUND");
}

#[tokio::test]
async fn test_add_member_and_group_update() {
    let app = TestApp::spawn().await;
    let alice = app.login("ext-1", "Alice").await;
    let carol = app.login("ext-3", "Carol").await;
    let (_, carol_profile) = app.get("/users/me", Some(&carol)).await;
    let carol_id = carol_profile["id"].as_i64().unwrap();

    let (_, group) = app
        .post(
            "/groups",
            Some(&alice),
            json!({ "invite_code": "QUOTES", "display_name": "Office" }),
        )
        .await;
    let group_id = group["id"].as_i64().unwrap();

    let (status, added) = app
        .post(
            &format!("/groups/{group_id}/users"),
            Some(&alice),
            json!({ "user_id": carol_id, "display_name": "OPERATOR" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["display_name"], "OPERATOR");

    let (status, _) = app
        .post(
            &format!("/groups/{group_id}/users"),
            Some(&alice),
            json!({ "user_id": 9999 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Carol warms her group list, then the group is renamed.
    let (_, before) = app.get("/groups/me", Some(&carol)).await;
    assert_eq!(before[0]["display_name"], "Office");

    let (status, renamed) = app
        .patch(
            &format!("/groups/{group_id}"),
            Some(&carol),
            json!({ "display_name": "Renamed", "invite_code": "NEWCODE" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["display_name"], "Renamed");

    let (_, after) = app.get("/groups/me", Some(&carol)).await;
    assert_eq!(after[0]["display_name"], "Renamed");
    assert_eq!(after[0]["invite_code"], "NEWCODE");

    let (status, _) = app
        .post("/groups/invite", Some(&alice), json!({ "invite_code": "QUOTES" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
