// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, deserialize_double_option, ApiOk, AppState},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_public_doctors))
        .route("/doctors/{doctor_id}", get(get_public_doctor))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_all_doctors).post(create_doctor))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).patch(update_doctor).delete(delete_doctor),
        )
        .route("/doctors/{doctor_id}/toggle_active", post(toggle_doctor_active))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub name: String,
    pub position: Option<String>,
    pub specialty: Option<String>,
    pub profile_image_url: Option<String>,
    pub career: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub department_id: Option<Uuid>,
}

async fn fetch_doctors(
    state: &AppState,
    doctor_id: Option<Uuid>,
    department_id: Option<Uuid>,
    active_only: bool,
) -> Result<Vec<DoctorRow>, ApiError> {
    let rows = sqlx::query_as::<_, DoctorRow>(
        r#"
        SELECT
          doc.doctor_id,
          doc.department_id,
          dep.name AS department_name,
          doc.name,
          doc.position,
          doc.specialty,
          doc.profile_image_url,
          doc.career,
          doc.display_order,
          doc.is_active,
          doc.created_at,
          doc.updated_at
        FROM doctor doc
        LEFT JOIN department dep ON dep.department_id = doc.department_id
        WHERE ($1::uuid IS NULL OR doc.doctor_id = $1)
          AND ($2::uuid IS NULL OR doc.department_id = $2)
          AND (NOT $3 OR doc.is_active)
        ORDER BY doc.display_order ASC, doc.name ASC
        "#,
    )
    .bind(doctor_id)
    .bind(department_id)
    .bind(active_only)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

async fn fetch_one(state: &AppState, doctor_id: Uuid, active_only: bool) -> Result<DoctorRow, ApiError> {
    fetch_doctors(state, Some(doctor_id), None, active_only)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("doctor"))
}

pub async fn list_public_doctors(
    State(state): State<AppState>,
    Query(q): Query<DoctorQuery>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    Ok(Json(ApiOk::new(fetch_doctors(&state, None, q.department_id, true).await?)))
}

pub async fn get_public_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    Ok(Json(ApiOk::new(fetch_one(&state, doctor_id, true).await?)))
}

pub async fn list_all_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<DoctorQuery>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_doctors(&state, None, q.department_id, false).await?)))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_one(&state, doctor_id, false).await?)))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub department_id: Option<Uuid>,
    pub position: Option<String>,
    pub specialty: Option<String>,
    pub profile_image_url: Option<String>,
    pub career: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

fn validate_doctor_name(name: &str) -> Result<&str, ApiError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if n.chars().count() > 50 {
        return Err(ApiError::validation("name is too long (max 50)"));
    }
    Ok(n)
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<ApiOk<DoctorRow>>), ApiError> {
    auth.ensure_admin()?;
    let name = validate_doctor_name(&req.name)?;

    let doctor_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO doctor (
          department_id, name, position, specialty, profile_image_url,
          career, display_order, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING doctor_id
        "#,
    )
    .bind(req.department_id)
    .bind(name)
    .bind(clean_opt(req.position.as_deref()))
    .bind(clean_opt(req.specialty.as_deref()))
    .bind(clean_opt(req.profile_image_url.as_deref()))
    .bind(clean_opt(req.career.as_deref()))
    .bind(req.display_order.unwrap_or(0))
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(fetch_one(&state, doctor_id, false).await?))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub position: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub specialty: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub profile_image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub career: Option<Option<String>>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(validate_doctor_name(n)?.to_string()),
        None => None,
    };

    let res = sqlx::query(
        r#"
        UPDATE doctor
        SET name = COALESCE($2, name),
            department_id = CASE WHEN $3 THEN $4 ELSE department_id END,
            position = CASE WHEN $5 THEN $6 ELSE position END,
            specialty = CASE WHEN $7 THEN $8 ELSE specialty END,
            profile_image_url = CASE WHEN $9 THEN $10 ELSE profile_image_url END,
            career = CASE WHEN $11 THEN $12 ELSE career END,
            display_order = COALESCE($13, display_order),
            is_active = COALESCE($14, is_active),
            updated_at = now()
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .bind(name)
    .bind(req.department_id.is_some())
    .bind(req.department_id.flatten())
    .bind(req.position.is_some())
    .bind(clean_opt(req.position.flatten().as_deref()))
    .bind(req.specialty.is_some())
    .bind(clean_opt(req.specialty.flatten().as_deref()))
    .bind(req.profile_image_url.is_some())
    .bind(clean_opt(req.profile_image_url.flatten().as_deref()))
    .bind(req.career.is_some())
    .bind(clean_opt(req.career.flatten().as_deref()))
    .bind(req.display_order)
    .bind(req.is_active)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }

    Ok(Json(ApiOk::new(fetch_one(&state, doctor_id, false).await?)))
}

/// Flips is_active; applying it twice restores the original value.
pub async fn toggle_doctor_active(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(
        r#"
        UPDATE doctor
        SET is_active = NOT is_active,
            updated_at = now()
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }

    Ok(Json(ApiOk::new(fetch_one(&state, doctor_id, false).await?)))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM doctor WHERE doctor_id = $1"#)
        .bind(doctor_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }

    tracing::info!(%doctor_id, by = %auth.user_id, "doctor deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_doctor_name() {
        assert_eq!(validate_doctor_name(" Dr. Kim ").unwrap(), "Dr. Kim");
        assert!(validate_doctor_name("").is_err());
        assert!(validate_doctor_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let req: UpdateDoctorRequest =
            serde_json::from_str(r#"{"department_id": null, "is_active": false}"#).unwrap();
        assert_eq!(req.department_id, Some(None));
        assert_eq!(req.position, None);
        assert_eq!(req.is_active, Some(false));
    }
}
