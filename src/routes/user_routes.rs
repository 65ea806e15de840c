// src/routes/user_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        clean_opt, deserialize_double_option, like_pattern, ApiOk, AppState, PageQuery, Paged,
        ROLE_ADMIN,
    },
    routes::auth_routes::validate_email,
};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub provider: String,
    pub role: i16,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub q: Option<String>,
    pub role: Option<i16>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    pub role: Option<i16>,
    pub is_active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/admin/users
        .route("/", get(list_users))
        // /api/admin/users/{user_id}
        .route("/{user_id}", get(get_user).patch(update_user).delete(delete_user))
}

fn validate_role(role: i16) -> Result<(), ApiError> {
    if !(0..=2).contains(&role) {
        return Err(ApiError::validation("role must be one of 0 (member), 1 (admin), 2 (staff)"));
    }
    Ok(())
}

/// An admin must not lock themselves out.
fn ensure_not_self_lockout(auth: &AuthContext, target: Uuid, req: &UpdateUserRequest) -> Result<(), ApiError> {
    if auth.user_id != target {
        return Ok(());
    }
    if req.role.is_some_and(|r| r != ROLE_ADMIN) || req.is_active == Some(false) {
        return Err(ApiError::BadRequest(
            "SELF_LOCKOUT",
            "You cannot demote or disable your own account".into(),
        ));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<UserListQuery>,
) -> Result<Json<ApiOk<Paged<UserPublicRow>>>, ApiError> {
    auth.ensure_admin()?;

    let paging = PageQuery { page: q.page, per_page: q.per_page };
    let (page, per_page) = paging.resolve();
    let search = clean_opt(q.q.as_deref()).map(|s| like_pattern(&s));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*)
        FROM app_user
        WHERE ($1::text IS NULL OR username ILIKE $1 OR display_name ILIKE $1 OR phone ILIKE $1)
          AND ($2::smallint IS NULL OR role = $2)
        "#,
    )
    .bind(search.as_deref())
    .bind(q.role)
    .fetch_one(&state.db)
    .await?;

    let items: Vec<UserPublicRow> = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, phone, email, provider, role, is_active, created_at
        FROM app_user
        WHERE ($1::text IS NULL OR username ILIKE $1 OR display_name ILIKE $1 OR phone ILIKE $1)
          AND ($2::smallint IS NULL OR role = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(search.as_deref())
    .bind(q.role)
    .bind(per_page)
    .bind(paging.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiOk::new(Paged { items, total, page, per_page })))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    auth.ensure_admin()?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, phone, email, provider, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("user"))?;

    Ok(Json(ApiOk::new(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    auth.ensure_admin()?;
    ensure_not_self_lockout(&auth, user_id, &req)?;

    if let Some(r) = req.role {
        validate_role(r)?;
    }
    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("display_name cannot be empty")),
        other => other.map(str::to_string),
    };
    let phone = match &req.phone {
        Some(Some(p)) => Some(Some(crate::routes::reservation_routes::normalize_phone(p)?)),
        Some(None) => Some(None),
        None => None,
    };
    if let Some(Some(e)) = &req.email {
        validate_email(e.trim())?;
    }

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        UPDATE app_user
        SET display_name = COALESCE($2, display_name),
            phone = CASE WHEN $3 THEN $4 ELSE phone END,
            email = CASE WHEN $5 THEN $6 ELSE email END,
            role = COALESCE($7, role),
            is_active = COALESCE($8, is_active)
        WHERE user_id = $1
        RETURNING user_id, username, display_name, phone, email, provider, role, is_active, created_at
        "#,
    )
    .bind(user_id)
    .bind(display_name)
    .bind(phone.is_some())
    .bind(phone.flatten())
    .bind(req.email.is_some())
    .bind(req.email.flatten().map(|e| e.trim().to_string()))
    .bind(req.role)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("user"))?;

    if req.is_active == Some(false) {
        sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE user_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&state.db)
        .await?;
    }

    Ok(Json(ApiOk::new(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;
    if auth.user_id == user_id {
        return Err(ApiError::BadRequest(
            "SELF_LOCKOUT",
            "You cannot delete your own account".into(),
        ));
    }

    let res = sqlx::query(r#"DELETE FROM app_user WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("user"));
    }

    tracing::info!(%user_id, by = %auth.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
