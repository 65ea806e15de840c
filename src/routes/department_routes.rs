// src/routes/department_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, deserialize_double_option, ApiOk, AppState},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/departments", get(list_public_departments))
        .route("/departments/{department_id}", get(get_public_department))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/departments", get(list_all_departments).post(create_department))
        .route(
            "/departments/{department_id}",
            get(get_department).patch(update_department).delete(delete_department),
        )
        .route("/departments/{department_id}/subjects", post(create_subject))
        .route("/subjects/{subject_id}", patch(update_subject).delete(delete_subject))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SubjectDto {
    pub subject_id: Uuid,
    pub department_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Serialize)]
pub struct DepartmentDto {
    pub department_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub subjects: Vec<SubjectDto>,
}

const DEPARTMENT_SELECT: &str = r#"
    SELECT
      d.department_id,
      d.name,
      d.description,
      d.image_url,
      d.display_order,
      d.is_active,
      d.created_at,
      d.updated_at,

      s.subject_id   AS s_id,
      s.name         AS s_name,
      s.description  AS s_description,
      s.display_order AS s_order
    FROM department d
    LEFT JOIN medical_subject s ON s.department_id = d.department_id
"#;

async fn fetch_departments(
    state: &AppState,
    department_id: Option<Uuid>,
    active_only: bool,
) -> Result<Vec<DepartmentDto>, ApiError> {
    let sql = format!(
        r#"{DEPARTMENT_SELECT}
        WHERE ($1::uuid IS NULL OR d.department_id = $1)
          AND (NOT $2 OR d.is_active)
        ORDER BY d.display_order ASC, d.name ASC, s.display_order ASC, s.name ASC
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(department_id)
        .bind(active_only)
        .fetch_all(&state.db)
        .await?;

    fold_rows_into_departments(rows)
}

/* ============================================================
   Public
   ============================================================ */

pub async fn list_public_departments(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<DepartmentDto>>>, ApiError> {
    Ok(Json(ApiOk::new(fetch_departments(&state, None, true).await?)))
}

pub async fn get_public_department(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
) -> Result<Json<ApiOk<DepartmentDto>>, ApiError> {
    let dept = fetch_departments(&state, Some(department_id), true)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("department"))?;
    Ok(Json(ApiOk::new(dept)))
}

/* ============================================================
   Admin
   ============================================================ */

pub async fn list_all_departments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DepartmentDto>>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_departments(&state, None, false).await?)))
}

pub async fn get_department(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(department_id): Path<Uuid>,
) -> Result<Json<ApiOk<DepartmentDto>>, ApiError> {
    auth.ensure_admin()?;
    let dept = fetch_departments(&state, Some(department_id), false)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("department"))?;
    Ok(Json(ApiOk::new(dept)))
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
    pub subjects: Option<Vec<CreateSubjectRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub display_order: Option<i32>,
}

fn required_name<'a>(name: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    if n.chars().count() > 100 {
        return Err(ApiError::validation(format!("{field} is too long (max 100)")));
    }
    Ok(n)
}

pub async fn create_department(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<DepartmentDto>>), ApiError> {
    auth.ensure_admin()?;
    let name = required_name(&req.name, "name")?;
    let subjects = req.subjects.unwrap_or_default();
    for s in &subjects {
        required_name(&s.name, "subject name")?;
    }

    let mut tx = state.db.begin().await?;

    let department_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO department (name, description, image_url, display_order, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING department_id
        "#,
    )
    .bind(name)
    .bind(clean_opt(req.description.as_deref()))
    .bind(clean_opt(req.image_url.as_deref()))
    .bind(req.display_order.unwrap_or(0))
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&mut *tx)
    .await?;

    for (idx, s) in subjects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO medical_subject (department_id, name, description, display_order)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(department_id)
        .bind(s.name.trim())
        .bind(clean_opt(s.description.as_deref()))
        .bind(s.display_order.unwrap_or(idx as i32))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let dept = fetch_departments(&state, Some(department_id), false)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("created department vanished".into()))?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(dept))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub image_url: Option<Option<String>>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn update_department(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(department_id): Path<Uuid>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<ApiOk<DepartmentDto>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(required_name(n, "name")?.to_string()),
        None => None,
    };

    let res = sqlx::query(
        r#"
        UPDATE department
        SET name = COALESCE($2, name),
            description = CASE WHEN $3 THEN $4 ELSE description END,
            image_url = CASE WHEN $5 THEN $6 ELSE image_url END,
            display_order = COALESCE($7, display_order),
            is_active = COALESCE($8, is_active),
            updated_at = now()
        WHERE department_id = $1
        "#,
    )
    .bind(department_id)
    .bind(name)
    .bind(req.description.is_some())
    .bind(clean_opt(req.description.flatten().as_deref()))
    .bind(req.image_url.is_some())
    .bind(clean_opt(req.image_url.flatten().as_deref()))
    .bind(req.display_order)
    .bind(req.is_active)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("department"));
    }

    get_department(State(state), auth, Path(department_id)).await
}

/// Subjects go with the department (FK cascade); doctors stay, unassigned.
pub async fn delete_department(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(department_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM department WHERE department_id = $1"#)
        .bind(department_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("department"));
    }

    tracing::info!(%department_id, by = %auth.user_id, "department deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(department_id): Path<Uuid>,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<ApiOk<SubjectDto>>), ApiError> {
    auth.ensure_admin()?;
    let name = required_name(&req.name, "name")?;

    let subject: SubjectDto = sqlx::query_as::<_, SubjectDto>(
        r#"
        INSERT INTO medical_subject (department_id, name, description, display_order)
        VALUES ($1, $2, $3, $4)
        RETURNING subject_id, department_id, name, description, display_order
        "#,
    )
    .bind(department_id)
    .bind(name)
    .bind(clean_opt(req.description.as_deref()))
    .bind(req.display_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::BadRequest("INVALID_REFERENCE", _) => ApiError::not_found("department"),
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(subject))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    pub display_order: Option<i32>,
}

pub async fn update_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subject_id): Path<Uuid>,
    Json(req): Json<UpdateSubjectRequest>,
) -> Result<Json<ApiOk<SubjectDto>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(required_name(n, "name")?.to_string()),
        None => None,
    };

    let subject: SubjectDto = sqlx::query_as::<_, SubjectDto>(
        r#"
        UPDATE medical_subject
        SET name = COALESCE($2, name),
            description = CASE WHEN $3 THEN $4 ELSE description END,
            display_order = COALESCE($5, display_order)
        WHERE subject_id = $1
        RETURNING subject_id, department_id, name, description, display_order
        "#,
    )
    .bind(subject_id)
    .bind(name)
    .bind(req.description.is_some())
    .bind(clean_opt(req.description.flatten().as_deref()))
    .bind(req.display_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("subject"))?;

    Ok(Json(ApiOk::new(subject)))
}

pub async fn delete_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subject_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM medical_subject WHERE subject_id = $1"#)
        .bind(subject_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("subject"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Helper: fold joined rows into departments
   ============================================================ */

fn fold_rows_into_departments(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<DepartmentDto>, ApiError> {
    // keep SQL order; one entry per department
    let mut out: Vec<DepartmentDto> = Vec::new();

    for r in rows {
        let department_id: Uuid = r.try_get("department_id").map_err(internal_row)?;

        if out.last().map(|d| d.department_id) != Some(department_id) {
            out.push(DepartmentDto {
                department_id,
                name: r.try_get("name").map_err(internal_row)?,
                description: r.try_get("description").map_err(internal_row)?,
                image_url: r.try_get("image_url").map_err(internal_row)?,
                display_order: r.try_get("display_order").map_err(internal_row)?,
                is_active: r.try_get("is_active").map_err(internal_row)?,
                created_at: r.try_get("created_at").map_err(internal_row)?,
                updated_at: r.try_get("updated_at").map_err(internal_row)?,
                subjects: vec![],
            });
        }

        let s_id: Option<Uuid> = r.try_get("s_id").map_err(internal_row)?;
        if let (Some(subject_id), Some(entry)) = (s_id, out.last_mut()) {
            entry.subjects.push(SubjectDto {
                subject_id,
                department_id,
                name: r.try_get("s_name").map_err(internal_row)?,
                description: r.try_get("s_description").map_err(internal_row)?,
                display_order: r.try_get("s_order").map_err(internal_row)?,
            });
        }
    }

    Ok(out)
}

fn internal_row(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("row decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name() {
        assert_eq!(required_name("  Internal Medicine ", "name").unwrap(), "Internal Medicine");
        assert!(required_name("   ", "name").is_err());
        assert!(required_name(&"가".repeat(101), "name").is_err());
        assert!(required_name(&"가".repeat(100), "name").is_ok());
    }
}
