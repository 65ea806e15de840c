//! Requests that must be turned away before any database access.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_offline_app, get, get_with_auth, post_raw_json, send};

// ---------------------------------------------------------------------------
// Authentication guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_route_without_token_is_unauthorized() {
    let response = get(build_offline_app(), "/api/admin/reservations").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn admin_users_without_token_is_unauthorized() {
    let response = get(build_offline_app(), "/api/admin/users").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_with_non_bearer_scheme_is_unauthorized() {
    let response = get_with_auth(build_offline_app(), "/api/auth/me", "Basic dXNlcjpwYXNz").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn my_reservations_require_login() {
    let response = get(build_offline_app(), "/api/reservations/mine").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slots_with_malformed_date_is_rejected() {
    let response = get(build_offline_app(), "/api/reservations/slots?date=17-10-2026").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn slots_without_date_is_rejected() {
    let response = get(build_offline_app(), "/api/reservations/slots").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_with_malformed_json_is_rejected() {
    let response = post_raw_json(build_offline_app(), "/api/auth/login", "{\"username\": ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_uuid_notice_id_is_rejected() {
    let response = get(build_offline_app(), "/api/notices/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Routing and CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(build_offline_app(), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_returns_405() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/hospital")
        .body(Body::empty())
        .unwrap();
    let response = send(build_offline_app(), request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/reservations")
        .header("origin", "https://hospital.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(build_offline_app(), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
