// src/routes/treatment_case_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, deserialize_double_option, ApiOk, AppState, PageQuery, Paged},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/treatment_categories", get(list_categories))
        .route("/treatment_cases", get(list_published_cases))
        .route("/treatment_cases/{case_id}", get(get_published_case))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/treatment_categories", get(admin_list_categories).post(create_category))
        .route(
            "/treatment_categories/{category_id}",
            patch(update_category).delete(delete_category),
        )
        .route("/treatment_cases", get(admin_list_cases).post(create_case))
        .route(
            "/treatment_cases/{case_id}",
            get(admin_get_case).patch(update_case).delete(delete_case),
        )
        .route("/treatment_cases/{case_id}/toggle_publish", post(toggle_publish))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TreatmentCategoryRow {
    pub category_id: Uuid,
    pub name: String,
    pub display_order: i32,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TreatmentCaseRow {
    pub case_id: Uuid,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub before_image_url: Option<String>,
    pub after_image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CASE_SELECT: &str = r#"
    SELECT
      tc.case_id,
      tc.category_id,
      c.name AS category_name,
      tc.doctor_id,
      d.name AS doctor_name,
      tc.title,
      tc.description,
      tc.before_image_url,
      tc.after_image_url,
      tc.is_published,
      tc.created_at,
      tc.updated_at
    FROM treatment_case tc
    LEFT JOIN treatment_category c ON c.category_id = tc.category_id
    LEFT JOIN doctor d ON d.doctor_id = tc.doctor_id
"#;

#[derive(Debug, Deserialize)]
pub struct CaseListQuery {
    pub category_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/* ============================================================
   Categories
   ============================================================ */

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<TreatmentCategoryRow>>>, ApiError> {
    let rows: Vec<TreatmentCategoryRow> = sqlx::query_as::<_, TreatmentCategoryRow>(
        r#"
        SELECT category_id, name, display_order
        FROM treatment_category
        ORDER BY display_order ASC, name ASC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiOk::new(rows)))
}

pub async fn admin_list_categories(
    state: State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<TreatmentCategoryRow>>>, ApiError> {
    auth.ensure_admin()?;
    list_categories(state).await
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub display_order: Option<i32>,
}

fn category_conflict(e: sqlx::Error) -> ApiError {
    match ApiError::from(e) {
        ApiError::Conflict(..) => {
            ApiError::Conflict("CATEGORY_EXISTS", "a category with that name already exists".into())
        }
        other => other,
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiOk<TreatmentCategoryRow>>), ApiError> {
    auth.ensure_admin()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let row: TreatmentCategoryRow = sqlx::query_as::<_, TreatmentCategoryRow>(
        r#"
        INSERT INTO treatment_category (name, display_order)
        VALUES ($1, $2)
        RETURNING category_id, name, display_order
        "#,
    )
    .bind(name)
    .bind(req.display_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await
    .map_err(category_conflict)?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(row))))
}

pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(category_id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiOk<TreatmentCategoryRow>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("name cannot be empty")),
        other => other.map(str::to_string),
    };

    let row: TreatmentCategoryRow = sqlx::query_as::<_, TreatmentCategoryRow>(
        r#"
        UPDATE treatment_category
        SET name = COALESCE($2, name),
            display_order = COALESCE($3, display_order)
        WHERE category_id = $1
        RETURNING category_id, name, display_order
        "#,
    )
    .bind(category_id)
    .bind(name)
    .bind(req.display_order)
    .fetch_optional(&state.db)
    .await
    .map_err(category_conflict)?
    .ok_or_else(|| ApiError::not_found("treatment category"))?;

    Ok(Json(ApiOk::new(row)))
}

/// Cases in the category stay, uncategorized.
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM treatment_category WHERE category_id = $1"#)
        .bind(category_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("treatment category"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Cases
   ============================================================ */

async fn list_cases(
    state: &AppState,
    q: &CaseListQuery,
    published_only: bool,
) -> Result<Paged<TreatmentCaseRow>, ApiError> {
    let paging = PageQuery { page: q.page, per_page: q.per_page };
    let (page, per_page) = paging.resolve();

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*)
        FROM treatment_case tc
        WHERE ($1::uuid IS NULL OR tc.category_id = $1)
          AND (NOT $2 OR tc.is_published)
        "#,
    )
    .bind(q.category_id)
    .bind(published_only)
    .fetch_one(&state.db)
    .await?;

    let sql = format!(
        "{CASE_SELECT}
        WHERE ($1::uuid IS NULL OR tc.category_id = $1)
          AND (NOT $2 OR tc.is_published)
        ORDER BY tc.created_at DESC
        LIMIT $3 OFFSET $4"
    );
    let items: Vec<TreatmentCaseRow> = sqlx::query_as::<_, TreatmentCaseRow>(&sql)
        .bind(q.category_id)
        .bind(published_only)
        .bind(per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    Ok(Paged { items, total, page, per_page })
}

async fn fetch_case(state: &AppState, case_id: Uuid) -> Result<TreatmentCaseRow, ApiError> {
    let sql = format!("{CASE_SELECT} WHERE tc.case_id = $1");
    sqlx::query_as::<_, TreatmentCaseRow>(&sql)
        .bind(case_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("treatment case"))
}

pub async fn list_published_cases(
    State(state): State<AppState>,
    Query(q): Query<CaseListQuery>,
) -> Result<Json<ApiOk<Paged<TreatmentCaseRow>>>, ApiError> {
    Ok(Json(ApiOk::new(list_cases(&state, &q, true).await?)))
}

/// Unpublished cases are indistinguishable from missing ones here.
pub async fn get_published_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<ApiOk<TreatmentCaseRow>>, ApiError> {
    let case = fetch_case(&state, case_id).await?;
    if !case.is_published {
        return Err(ApiError::not_found("treatment case"));
    }
    Ok(Json(ApiOk::new(case)))
}

pub async fn admin_list_cases(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<CaseListQuery>,
) -> Result<Json<ApiOk<Paged<TreatmentCaseRow>>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(list_cases(&state, &q, false).await?)))
}

pub async fn admin_get_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
) -> Result<Json<ApiOk<TreatmentCaseRow>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_case(&state, case_id).await?)))
}

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub category_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub before_image_url: Option<String>,
    pub after_image_url: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCaseRequest {
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub doctor_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub before_image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub after_image_url: Option<Option<String>>,
    pub is_published: Option<bool>,
}

pub async fn create_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<ApiOk<TreatmentCaseRow>>), ApiError> {
    auth.ensure_admin()?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let case_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO treatment_case (
          category_id, doctor_id, title, description,
          before_image_url, after_image_url, is_published
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING case_id
        "#,
    )
    .bind(req.category_id)
    .bind(req.doctor_id)
    .bind(title)
    .bind(clean_opt(req.description.as_deref()))
    .bind(clean_opt(req.before_image_url.as_deref()))
    .bind(clean_opt(req.after_image_url.as_deref()))
    .bind(req.is_published.unwrap_or(false))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(fetch_case(&state, case_id).await?))))
}

pub async fn update_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
    Json(req): Json<UpdateCaseRequest>,
) -> Result<Json<ApiOk<TreatmentCaseRow>>, ApiError> {
    auth.ensure_admin()?;
    let title = match req.title.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("title cannot be empty")),
        other => other.map(str::to_string),
    };

    let res = sqlx::query(
        r#"
        UPDATE treatment_case
        SET category_id = CASE WHEN $2 THEN $3 ELSE category_id END,
            doctor_id = CASE WHEN $4 THEN $5 ELSE doctor_id END,
            title = COALESCE($6, title),
            description = CASE WHEN $7 THEN $8 ELSE description END,
            before_image_url = CASE WHEN $9 THEN $10 ELSE before_image_url END,
            after_image_url = CASE WHEN $11 THEN $12 ELSE after_image_url END,
            is_published = COALESCE($13, is_published),
            updated_at = now()
        WHERE case_id = $1
        "#,
    )
    .bind(case_id)
    .bind(req.category_id.is_some())
    .bind(req.category_id.flatten())
    .bind(req.doctor_id.is_some())
    .bind(req.doctor_id.flatten())
    .bind(title)
    .bind(req.description.is_some())
    .bind(clean_opt(req.description.flatten().as_deref()))
    .bind(req.before_image_url.is_some())
    .bind(clean_opt(req.before_image_url.flatten().as_deref()))
    .bind(req.after_image_url.is_some())
    .bind(clean_opt(req.after_image_url.flatten().as_deref()))
    .bind(req.is_published)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("treatment case"));
    }

    Ok(Json(ApiOk::new(fetch_case(&state, case_id).await?)))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
) -> Result<Json<ApiOk<TreatmentCaseRow>>, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(
        r#"
        UPDATE treatment_case
        SET is_published = NOT is_published,
            updated_at = now()
        WHERE case_id = $1
        "#,
    )
    .bind(case_id)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("treatment case"));
    }

    let case = fetch_case(&state, case_id).await?;
    tracing::info!(%case_id, published = case.is_published, "treatment case publish toggled");
    Ok(Json(ApiOk::new(case)))
}

pub async fn delete_case(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM treatment_case WHERE case_id = $1"#)
        .bind(case_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("treatment case"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateCaseRequest =
            serde_json::from_str(r#"{"category_id": null, "title": "Implant"}"#).unwrap();
        assert_eq!(req.category_id, Some(None));
        assert_eq!(req.doctor_id, None);
        assert_eq!(req.title.as_deref(), Some("Implant"));
    }

    #[test]
    fn test_category_conflict_passes_other_errors_through() {
        let err = category_conflict(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
