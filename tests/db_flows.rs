//! Router-level flows against a freshly migrated database.
//!
//! Each test gets its own database from `sqlx::test`; accounts and sessions
//! are seeded directly, everything else goes through the HTTP API.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    ROLE_ADMIN, ROLE_MEMBER, bearer_for, body_json, build_test_app, create_user, get,
    get_with_auth, insert_reservation, request,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

async fn admin_bearer(pool: &PgPool) -> String {
    let admin = create_user(pool, "admin", ROLE_ADMIN).await;
    bearer_for(pool, admin).await
}

// ---------------------------------------------------------------------------
// Departments and doctors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_created_department_is_listed_once(pool: PgPool) {
    let token = admin_bearer(&pool).await;

    let response = request(
        build_test_app(pool.clone()),
        Method::POST,
        "/api/admin/departments",
        Some(&token),
        Some(json!({
            "name": "Orthopedics",
            "subjects": [{ "name": "Spine" }, { "name": "Joint" }]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let department_id = created["data"]["department_id"].as_str().unwrap().to_string();

    let response = get(build_test_app(pool), "/api/departments").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let listed: Vec<_> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|d| d["department_id"] == department_id.as_str())
        .collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["subjects"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deleting_department_removes_its_subjects(pool: PgPool) {
    let token = admin_bearer(&pool).await;

    let response = request(
        build_test_app(pool.clone()),
        Method::POST,
        "/api/admin/departments",
        Some(&token),
        Some(json!({ "name": "Dermatology", "subjects": [{ "name": "Acne" }] })),
    )
    .await;
    let created = body_json(response).await;
    let department_id = created["data"]["department_id"].as_str().unwrap().to_string();

    let response = request(
        build_test_app(pool.clone()),
        Method::DELETE,
        &format!("/api/admin/departments/{department_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let subjects: i64 = sqlx::query_scalar("SELECT count(*) FROM medical_subject")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(subjects, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_toggling_doctor_twice_restores_flag(pool: PgPool) {
    let token = admin_bearer(&pool).await;

    let response = request(
        build_test_app(pool.clone()),
        Method::POST,
        "/api/admin/doctors",
        Some(&token),
        Some(json!({ "name": "Kim Minsu" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["data"]["is_active"], true);
    let doctor_id = created["data"]["doctor_id"].as_str().unwrap().to_string();
    let uri = format!("/api/admin/doctors/{doctor_id}/toggle_active");

    let first = request(build_test_app(pool.clone()), Method::POST, &uri, Some(&token), None).await;
    assert_eq!(body_json(first).await["data"]["is_active"], false);

    let second = request(build_test_app(pool), Method::POST, &uri, Some(&token), None).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["data"]["is_active"], true);
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_booking_in_the_past_is_rejected(pool: PgPool) {
    let response = request(
        build_test_app(pool.clone()),
        Method::POST,
        "/api/reservations",
        None,
        Some(json!({
            "patient_name": "Hong Gildong",
            "phone": "01012345678",
            "password": "1234",
            "reserved_date": "2020-01-06",
            "reserved_time": "10:00"
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "PAST_DATE");

    let stored: i64 = sqlx::query_scalar("SELECT count(*) FROM reservation")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_member_cancels_without_body(pool: PgPool) {
    let member = create_user(&pool, "member", ROLE_MEMBER).await;
    let token = bearer_for(&pool, member).await;
    let reservation_id = insert_reservation(&pool, Some(member), "010-9999-8888").await;

    let response = request(
        build_test_app(pool),
        Method::POST,
        &format!("/api/reservations/{reservation_id}/cancel"),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "cancelled");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_search_matches_phone_without_hyphens(pool: PgPool) {
    let token = admin_bearer(&pool).await;
    insert_reservation(&pool, None, "010-1234-5678").await;
    insert_reservation(&pool, None, "010-5555-0000").await;

    let response = get_with_auth(
        build_test_app(pool),
        "/api/admin/reservations?q=01012345678",
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_deleting_member_keeps_their_reservations(pool: PgPool) {
    let token = admin_bearer(&pool).await;
    let member = create_user(&pool, "member", ROLE_MEMBER).await;
    let reservation_id = insert_reservation(&pool, Some(member), "010-9999-8888").await;

    let response = request(
        build_test_app(pool.clone()),
        Method::DELETE,
        &format!("/api/admin/users/{member}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (owner, booked_as_member): (Option<Uuid>, bool) = sqlx::query_as(
        "SELECT user_id, booked_as_member FROM reservation WHERE reservation_id = $1",
    )
    .bind(reservation_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(owner, None);
    assert!(booked_as_member);
}
