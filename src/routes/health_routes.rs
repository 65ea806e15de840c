use axum::{Json, Router, extract::State, routing::get};

use crate::models::AppState;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_healthy: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Always 200 while the process is up; the database state is reported, not enforced.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            false
        }
    };

    Json(HealthResponse { status: "ok", db_healthy })
}
