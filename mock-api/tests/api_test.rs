use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use mock_api::{MockState, build_router, state::DEMO_CODE};
use serde_json::{Value, json};
use tower::util::ServiceExt;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, code: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/oauth/callback",
        None,
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_check_works() {
    let app = build_router(MockState::new());
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let app = build_router(MockState::with_demo_data());
    let (status, body) = send(&app, "GET", "/api/v1/users/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn demo_user_sees_family_members() {
    let app = build_router(MockState::with_demo_data());
    let (access, _) = login(&app, DEMO_CODE).await;

    let (status, body) = send(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nickname"], "김아빠");
    assert_eq!(body["data"]["role"], "FATHER");

    let (status, body) = send(&app, "GET", "/api/v1/family/members", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["members"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn new_user_has_no_family() {
    let app = build_router(MockState::new());
    let (access, _) = login(&app, "new-user-민지").await;

    let (status, body) = send(&app, "GET", "/api/v1/family/members", Some(&access), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_oauth_code_is_rejected() {
    let app = build_router(MockState::new());
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/oauth/callback",
        None,
        Some(json!({ "code": "bogus" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn onboarding_flow_creates_family_and_sets_role() {
    let app = build_router(MockState::new());
    let (access, _) = login(&app, "new-user-이아빠").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/families",
        Some(&access),
        Some(json!({ "name": "Lee" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Lee");
    assert_eq!(body["data"]["inviteCode"].as_str().unwrap().len(), 8);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/users/me/role",
        Some(&access),
        Some(json!({ "role": "FATHER" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "FATHER");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/families",
        Some(&access),
        Some(json!({ "name": "Lee again" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already belongs to a family");
}

#[tokio::test]
async fn duplicate_family_name_conflicts() {
    let app = build_router(MockState::with_demo_data());
    let (access, _) = login(&app, "new-user-박").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/families",
        Some(&access),
        Some(json!({ "name": "Kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn join_with_unknown_code_is_not_found() {
    let app = build_router(MockState::with_demo_data());
    let (access, _) = login(&app, "new-user-조카").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/families/join",
        Some(&access),
        Some(json!({ "inviteCode": "NOPE99" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/families/join",
        Some(&access),
        Some(json!({ "inviteCode": "kim123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Kim");
}

#[tokio::test]
async fn expired_access_token_can_be_refreshed() {
    let state = MockState::with_demo_data();
    let app = build_router(state.clone());
    let (access, refresh) = login(&app, DEMO_CODE).await;

    state.expire_access_tokens();
    let (status, _) = send(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", "/api/v1/users/me", Some(&rotated), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_revokes_previous_access_token() {
    let app = build_router(MockState::with_demo_data());
    let (access, refresh) = login(&app, DEMO_CODE).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn removed_user_is_not_found_with_valid_token() {
    let state = MockState::with_demo_data();
    let app = build_router(state.clone());
    let (access, _) = login(&app, "new-user-유령").await;
    let user_id = state.user_for_access_token(&access).unwrap();

    state.remove_user(user_id);
    let (status, body) = send(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn logout_revokes_tokens() {
    let app = build_router(MockState::with_demo_data());
    let (access, refresh) = login(&app, DEMO_CODE).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/logout",
        Some(&access),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = build_router(MockState::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}
