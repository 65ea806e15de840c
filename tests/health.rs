mod common;

use axum::http::StatusCode;
use common::{body_json, build_offline_app, get};

#[tokio::test]
async fn health_reports_unreachable_database() {
    let response = get(build_offline_app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], false);
}
