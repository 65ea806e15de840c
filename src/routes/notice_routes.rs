// src/routes/notice_routes.rs

use axum::{
    extract::{Path, Query, State},
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
    models::{clean_opt, like_pattern, ApiOk, AppState, PageQuery, Paged},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(list_notices))
        .route("/notices/{notice_id}", get(view_notice))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(admin_list_notices).post(create_notice))
        .route(
            "/notices/{notice_id}",
            get(get_notice).patch(update_notice).delete(delete_notice),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NoticeSummary {
    pub notice_id: Uuid,
    pub title: String,
    pub author: String,
    pub is_pinned: bool,
    pub view_count: i64,
    pub attachment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NoticeRow {
    pub notice_id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_pinned: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AttachmentRow {
    pub attachment_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub file_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NoticeDetail {
    #[serde(flatten)]
    pub notice: NoticeRow,
    pub attachments: Vec<AttachmentRow>,
    pub prev_id: Option<Uuid>,
    pub next_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NoticeListQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/* ============================================================
   Read
   ============================================================ */

pub async fn list_notices(
    State(state): State<AppState>,
    Query(q): Query<NoticeListQuery>,
) -> Result<Json<ApiOk<Paged<NoticeSummary>>>, ApiError> {
    let search = clean_opt(q.q.as_deref()).map(|s| like_pattern(&s));
    let paging = PageQuery { page: q.page, per_page: q.per_page };
    let (page, per_page) = paging.resolve();

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*)
        FROM notice
        WHERE ($1::text IS NULL OR title ILIKE $1 OR content ILIKE $1)
        "#,
    )
    .bind(search.as_deref())
    .fetch_one(&state.db)
    .await?;

    let items: Vec<NoticeSummary> = sqlx::query_as::<_, NoticeSummary>(
        r#"
        SELECT
          n.notice_id,
          n.title,
          n.author,
          n.is_pinned,
          n.view_count,
          (SELECT count(*) FROM notice_attachment a WHERE a.notice_id = n.notice_id) AS attachment_count,
          n.created_at
        FROM notice n
        WHERE ($1::text IS NULL OR n.title ILIKE $1 OR n.content ILIKE $1)
        ORDER BY n.is_pinned DESC, n.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search.as_deref())
    .bind(per_page)
    .bind(paging.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiOk::new(Paged { items, total, page, per_page })))
}

pub async fn admin_list_notices(
    state: State<AppState>,
    auth: AuthContext,
    query: Query<NoticeListQuery>,
) -> Result<Json<ApiOk<Paged<NoticeSummary>>>, ApiError> {
    auth.ensure_admin()?;
    list_notices(state, query).await
}

async fn load_detail(state: &AppState, notice: NoticeRow) -> Result<NoticeDetail, ApiError> {
    let attachments: Vec<AttachmentRow> = sqlx::query_as::<_, AttachmentRow>(
        r#"
        SELECT attachment_id, file_name, file_url, file_size
        FROM notice_attachment
        WHERE notice_id = $1
        ORDER BY sort_order ASC, file_name ASC
        "#,
    )
    .bind(notice.notice_id)
    .fetch_all(&state.db)
    .await?;

    // neighbours in plain chronological order
    let (prev_id, next_id): (Option<Uuid>, Option<Uuid>) = sqlx::query_as(
        r#"
        SELECT
          (SELECT notice_id FROM notice
            WHERE (created_at, notice_id) < ($1, $2)
            ORDER BY created_at DESC, notice_id DESC LIMIT 1),
          (SELECT notice_id FROM notice
            WHERE (created_at, notice_id) > ($1, $2)
            ORDER BY created_at ASC, notice_id ASC LIMIT 1)
        "#,
    )
    .bind(notice.created_at)
    .bind(notice.notice_id)
    .fetch_one(&state.db)
    .await?;

    Ok(NoticeDetail { notice, attachments, prev_id, next_id })
}

/// Public read; counts a view.
pub async fn view_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<Uuid>,
) -> Result<Json<ApiOk<NoticeDetail>>, ApiError> {
    let notice: NoticeRow = sqlx::query_as::<_, NoticeRow>(
        r#"
        UPDATE notice
        SET view_count = view_count + 1
        WHERE notice_id = $1
        RETURNING notice_id, title, content, author, is_pinned, view_count, created_at, updated_at
        "#,
    )
    .bind(notice_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("notice"))?;

    Ok(Json(ApiOk::new(load_detail(&state, notice).await?)))
}

async fn fetch_notice(state: &AppState, notice_id: Uuid) -> Result<NoticeRow, ApiError> {
    sqlx::query_as::<_, NoticeRow>(
        r#"
        SELECT notice_id, title, content, author, is_pinned, view_count, created_at, updated_at
        FROM notice
        WHERE notice_id = $1
        "#,
    )
    .bind(notice_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("notice"))
}

pub async fn get_notice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notice_id): Path<Uuid>,
) -> Result<Json<ApiOk<NoticeDetail>>, ApiError> {
    auth.ensure_admin()?;
    let notice = fetch_notice(&state, notice_id).await?;
    Ok(Json(ApiOk::new(load_detail(&state, notice).await?)))
}

/* ============================================================
   Write
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AttachmentInput {
    pub file_name: String,
    pub file_url: String,
    pub file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoticeRequest {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub is_pinned: Option<bool>,
    pub attachments: Option<Vec<AttachmentInput>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoticeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub is_pinned: Option<bool>,
    /// When present, replaces every attachment.
    pub attachments: Option<Vec<AttachmentInput>>,
}

fn validate_title(title: &str) -> Result<&str, ApiError> {
    let t = title.trim();
    if t.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if t.chars().count() > 200 {
        return Err(ApiError::validation("title is too long (max 200)"));
    }
    Ok(t)
}

fn validate_attachments(items: &[AttachmentInput]) -> Result<(), ApiError> {
    for a in items {
        if a.file_name.trim().is_empty() || a.file_url.trim().is_empty() {
            return Err(ApiError::validation("attachments need file_name and file_url"));
        }
        if !(a.file_url.starts_with("https://") || a.file_url.starts_with("http://") || a.file_url.starts_with('/')) {
            return Err(ApiError::validation("attachment file_url must be an http(s) URL or an absolute path"));
        }
        if a.file_size.is_some_and(|s| s < 0) {
            return Err(ApiError::validation("attachment file_size must not be negative"));
        }
    }
    Ok(())
}

async fn insert_attachments(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    notice_id: Uuid,
    items: &[AttachmentInput],
) -> Result<(), ApiError> {
    for (idx, a) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO notice_attachment (notice_id, file_name, file_url, file_size, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notice_id)
        .bind(a.file_name.trim())
        .bind(a.file_url.trim())
        .bind(a.file_size)
        .bind(idx as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn default_author(state: &AppState, auth: &AuthContext) -> Result<String, ApiError> {
    let name: String = sqlx::query_scalar(r#"SELECT display_name FROM app_user WHERE user_id = $1"#)
        .bind(auth.user_id)
        .fetch_one(&state.db)
        .await?;
    Ok(name)
}

pub async fn create_notice(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateNoticeRequest>,
) -> Result<(StatusCode, Json<ApiOk<NoticeDetail>>), ApiError> {
    auth.ensure_admin()?;
    let title = validate_title(&req.title)?;
    if req.content.trim().is_empty() {
        return Err(ApiError::validation("content is required"));
    }
    let attachments = req.attachments.unwrap_or_default();
    validate_attachments(&attachments)?;

    let author = match clean_opt(req.author.as_deref()) {
        Some(a) => a,
        None => default_author(&state, &auth).await?,
    };

    let mut tx = state.db.begin().await?;

    let notice_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO notice (title, content, author, is_pinned)
        VALUES ($1, $2, $3, $4)
        RETURNING notice_id
        "#,
    )
    .bind(title)
    .bind(&req.content)
    .bind(&author)
    .bind(req.is_pinned.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await?;

    insert_attachments(&mut tx, notice_id, &attachments).await?;

    tx.commit().await?;

    tracing::info!(%notice_id, "notice created");

    let notice = fetch_notice(&state, notice_id).await?;
    Ok((StatusCode::CREATED, Json(ApiOk::new(load_detail(&state, notice).await?))))
}

pub async fn update_notice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notice_id): Path<Uuid>,
    Json(req): Json<UpdateNoticeRequest>,
) -> Result<Json<ApiOk<NoticeDetail>>, ApiError> {
    auth.ensure_admin()?;
    let title = match req.title.as_deref() {
        Some(t) => Some(validate_title(t)?.to_string()),
        None => None,
    };
    if req.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::validation("content cannot be empty"));
    }
    if let Some(items) = &req.attachments {
        validate_attachments(items)?;
    }

    let mut tx = state.db.begin().await?;

    let res = sqlx::query(
        r#"
        UPDATE notice
        SET title = COALESCE($2, title),
            content = COALESCE($3, content),
            author = COALESCE($4, author),
            is_pinned = COALESCE($5, is_pinned),
            updated_at = now()
        WHERE notice_id = $1
        "#,
    )
    .bind(notice_id)
    .bind(title)
    .bind(req.content.as_deref())
    .bind(clean_opt(req.author.as_deref()))
    .bind(req.is_pinned)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notice"));
    }

    if let Some(items) = &req.attachments {
        sqlx::query(r#"DELETE FROM notice_attachment WHERE notice_id = $1"#)
            .bind(notice_id)
            .execute(&mut *tx)
            .await?;
        insert_attachments(&mut tx, notice_id, items).await?;
    }

    tx.commit().await?;

    let notice = fetch_notice(&state, notice_id).await?;
    Ok(Json(ApiOk::new(load_detail(&state, notice).await?)))
}

/// Attachments are removed with the notice (FK cascade).
pub async fn delete_notice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notice_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM notice WHERE notice_id = $1"#)
        .bind(notice_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notice"));
    }

    tracing::info!(%notice_id, by = %auth.user_id, "notice deleted");
    Ok(StatusCode::NO_CONTENT)
}
