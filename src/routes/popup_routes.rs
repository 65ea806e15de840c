// src/routes/popup_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
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
    Router::new().route("/popups", get(list_visible_popups))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/popups", get(list_all_popups).post(create_popup))
        .route(
            "/popups/{popup_id}",
            get(get_popup).patch(update_popup).delete(delete_popup),
        )
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PopupRow {
    pub popup_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub display_order: i32,
    pub pos_x: i32,
    pub pos_y: i32,
    pub width: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopupRow {
    /// Active and inside `[starts_at, ends_at)`; a missing bound is open.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|s| s <= now)
            && self.ends_at.is_none_or(|e| now < e)
    }
}

const POPUP_COLUMNS: &str = r#"
    popup_id, title, content, image_url, link_url, starts_at, ends_at,
    is_active, display_order, pos_x, pos_y, width, created_at, updated_at
"#;

async fn fetch_all(state: &AppState) -> Result<Vec<PopupRow>, ApiError> {
    let sql = format!("SELECT {POPUP_COLUMNS} FROM popup ORDER BY display_order ASC, created_at DESC");
    Ok(sqlx::query_as::<_, PopupRow>(&sql).fetch_all(&state.db).await?)
}

async fn fetch_one(state: &AppState, popup_id: Uuid) -> Result<PopupRow, ApiError> {
    let sql = format!("SELECT {POPUP_COLUMNS} FROM popup WHERE popup_id = $1");
    sqlx::query_as::<_, PopupRow>(&sql)
        .bind(popup_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("popup"))
}

pub async fn list_visible_popups(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<PopupRow>>>, ApiError> {
    let now = Utc::now();
    let visible = fetch_all(&state)
        .await?
        .into_iter()
        .filter(|p| p.is_visible_at(now))
        .collect();
    Ok(Json(ApiOk::new(visible)))
}

pub async fn list_all_popups(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PopupRow>>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_all(&state).await?)))
}

pub async fn get_popup(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(popup_id): Path<Uuid>,
) -> Result<Json<ApiOk<PopupRow>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(fetch_one(&state, popup_id).await?)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePopupRequest {
    pub title: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
    pub pos_x: Option<i32>,
    pub pos_y: Option<i32>,
    pub width: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePopupRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub link_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
    pub pos_x: Option<i32>,
    pub pos_y: Option<i32>,
    pub width: Option<i32>,
}

fn validate_window(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> Result<(), ApiError> {
    if let (Some(s), Some(e)) = (starts_at, ends_at) {
        if e <= s {
            return Err(ApiError::validation("ends_at must be after starts_at"));
        }
    }
    Ok(())
}

fn validate_layout(pos_x: Option<i32>, pos_y: Option<i32>, width: Option<i32>) -> Result<(), ApiError> {
    if pos_x.is_some_and(|v| v < 0) || pos_y.is_some_and(|v| v < 0) {
        return Err(ApiError::validation("pos_x/pos_y must not be negative"));
    }
    if width.is_some_and(|w| !(100..=1920).contains(&w)) {
        return Err(ApiError::validation("width must be between 100 and 1920"));
    }
    Ok(())
}

pub async fn create_popup(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePopupRequest>,
) -> Result<(StatusCode, Json<ApiOk<PopupRow>>), ApiError> {
    auth.ensure_admin()?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    validate_window(req.starts_at, req.ends_at)?;
    validate_layout(req.pos_x, req.pos_y, req.width)?;

    let popup_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO popup (
          title, content, image_url, link_url, starts_at, ends_at,
          is_active, display_order, pos_x, pos_y, width
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING popup_id
        "#,
    )
    .bind(title)
    .bind(clean_opt(req.content.as_deref()))
    .bind(clean_opt(req.image_url.as_deref()))
    .bind(clean_opt(req.link_url.as_deref()))
    .bind(req.starts_at)
    .bind(req.ends_at)
    .bind(req.is_active.unwrap_or(true))
    .bind(req.display_order.unwrap_or(0))
    .bind(req.pos_x.unwrap_or(0))
    .bind(req.pos_y.unwrap_or(0))
    .bind(req.width.unwrap_or(400))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(fetch_one(&state, popup_id).await?))))
}

pub async fn update_popup(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(popup_id): Path<Uuid>,
    Json(req): Json<UpdatePopupRequest>,
) -> Result<Json<ApiOk<PopupRow>>, ApiError> {
    auth.ensure_admin()?;
    let title = match req.title.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("title cannot be empty")),
        other => other.map(str::to_string),
    };
    validate_layout(req.pos_x, req.pos_y, req.width)?;

    // The window check needs the merged result, so read-modify-write.
    let existing = fetch_one(&state, popup_id).await?;
    let starts_at = req.starts_at.unwrap_or(existing.starts_at);
    let ends_at = req.ends_at.unwrap_or(existing.ends_at);
    validate_window(starts_at, ends_at)?;

    sqlx::query(
        r#"
        UPDATE popup
        SET title = COALESCE($2, title),
            content = CASE WHEN $3 THEN $4 ELSE content END,
            image_url = CASE WHEN $5 THEN $6 ELSE image_url END,
            link_url = CASE WHEN $7 THEN $8 ELSE link_url END,
            starts_at = $9,
            ends_at = $10,
            is_active = COALESCE($11, is_active),
            display_order = COALESCE($12, display_order),
            pos_x = COALESCE($13, pos_x),
            pos_y = COALESCE($14, pos_y),
            width = COALESCE($15, width),
            updated_at = now()
        WHERE popup_id = $1
        "#,
    )
    .bind(popup_id)
    .bind(title)
    .bind(req.content.is_some())
    .bind(clean_opt(req.content.flatten().as_deref()))
    .bind(req.image_url.is_some())
    .bind(clean_opt(req.image_url.flatten().as_deref()))
    .bind(req.link_url.is_some())
    .bind(clean_opt(req.link_url.flatten().as_deref()))
    .bind(starts_at)
    .bind(ends_at)
    .bind(req.is_active)
    .bind(req.display_order)
    .bind(req.pos_x)
    .bind(req.pos_y)
    .bind(req.width)
    .execute(&state.db)
    .await?;

    Ok(Json(ApiOk::new(fetch_one(&state, popup_id).await?)))
}

pub async fn delete_popup(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(popup_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM popup WHERE popup_id = $1"#)
        .bind(popup_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("popup"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn popup(active: bool, starts: Option<DateTime<Utc>>, ends: Option<DateTime<Utc>>) -> PopupRow {
        let now = Utc::now();
        PopupRow {
            popup_id: Uuid::new_v4(),
            title: "Flu shots".into(),
            content: None,
            image_url: None,
            link_url: None,
            starts_at: starts,
            ends_at: ends,
            is_active: active,
            display_order: 0,
            pos_x: 0,
            pos_y: 0,
            width: 400,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visibility_window() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let hour = Duration::hours(1);

        assert!(popup(true, None, None).is_visible_at(now));
        assert!(!popup(false, None, None).is_visible_at(now));
        assert!(popup(true, Some(now - hour), Some(now + hour)).is_visible_at(now));
        assert!(popup(true, Some(now), None).is_visible_at(now));
        assert!(!popup(true, None, Some(now)).is_visible_at(now));
        assert!(!popup(true, Some(now + hour), None).is_visible_at(now));
        assert!(!popup(true, None, Some(now - hour)).is_visible_at(now));
    }

    #[test]
    fn test_validate_window() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(validate_window(Some(t), Some(t + Duration::days(1))).is_ok());
        assert!(validate_window(Some(t), Some(t)).is_err());
        assert!(validate_window(None, Some(t)).is_ok());
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(Some(10), Some(20), Some(500)).is_ok());
        assert!(validate_layout(Some(-1), None, None).is_err());
        assert!(validate_layout(None, None, Some(50)).is_err());
    }
}
