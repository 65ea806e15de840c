use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

const REMEMBER_ME_TTL_HOURS: i64 = 24 * 14;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change_password", post(change_password))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
    pub remember_me: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

async fn load_user_by_username(state: &AppState, username: &str) -> Result<Option<UserRow>, ApiError> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, phone, email, role, is_active
        FROM app_user
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await?;
    Ok(user)
}

async fn issue_session(
    state: &AppState,
    user_id: Uuid,
    device_name: Option<&str>,
    ttl_hours: i64,
) -> Result<(String, SessionTokenRow), ApiError> {
    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, device_name, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user_id)
    .bind(&token_hash)
    .bind(device_name)
    .bind(expires_at)
    .fetch_one(&state.db)
    .await?;

    Ok((access_token, session))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }

    let user = load_user_by_username(&state, username)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !user.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    // OAuth-only accounts have no local password.
    let Some(stored) = user.password_hash.as_deref() else {
        return Err(ApiError::invalid_credentials());
    };
    if !verify_password(&req.password, stored) {
        return Err(ApiError::invalid_credentials());
    }

    let ttl_hours = if req.remember_me.unwrap_or(false) {
        REMEMBER_ME_TTL_HOURS
    } else {
        state.session_ttl_hours
    };
    let (access_token, session) =
        issue_session(&state, user.user_id, req.device_name.as_deref(), ttl_hours).await?;

    tracing::info!(user_id = %user.user_id, "login");

    Ok(Json(ApiOk::new(LoginData {
        access_token,
        expires_at: session.expires_at,
        user: user.into(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let u = username.trim();
    if u.len() < 3 {
        return Err(ApiError::validation("username must be at least 3 characters"));
    }
    if !u.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-') {
        return Err(ApiError::validation(
            "username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_new_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::validation("email is invalid"));
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(ApiError::validation("email is invalid"));
    }
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiOk<UserProfile>>), ApiError> {
    validate_username(&req.username)?;
    validate_new_password(&req.password)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::validation("display_name is required"));
    }
    let phone = match clean_opt(req.phone.as_deref()) {
        Some(p) => Some(crate::routes::reservation_routes::normalize_phone(&p)?),
        None => None,
    };
    let email = clean_opt(req.email.as_deref());
    if let Some(e) = email.as_deref() {
        validate_email(e)?;
    }

    let pw_hash = hash_password(req.password.trim())?;

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO app_user (username, display_name, password_hash, phone, email, role)
        VALUES ($1, $2, $3, $4, $5, 0)
        RETURNING user_id, username, display_name, password_hash, phone, email, role, is_active
        "#,
    )
    .bind(req.username.trim())
    .bind(display_name)
    .bind(&pw_hash)
    .bind(phone)
    .bind(email)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(..) => ApiError::Conflict("USERNAME_TAKEN", "username is already in use".into()),
        other => other,
    })?;

    tracing::info!(user_id = %user.user_id, "member signed up");

    Ok((StatusCode::CREATED, Json(ApiOk::new(user.into()))))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, phone, email, role, is_active
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(ApiError::session_expired)?;

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        SELECT expires_at
        FROM session_token
        WHERE session_token_id = $1
        "#,
    )
    .bind(auth.session_token_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(MeData {
        user: user.into(),
        session_token_id: auth.session_token_id,
        expires_at,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk::new(OkData { ok: true })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if req.old_password.is_empty() {
        return Err(ApiError::validation("old_password is required"));
    }
    validate_new_password(&req.new_password)?;

    let stored: Option<String> = sqlx::query_scalar(
        r#"
        SELECT password_hash
        FROM app_user
        WHERE user_id = $1
          AND is_active = true
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(ApiError::session_expired)?;

    let Some(stored) = stored else {
        return Err(ApiError::BadRequest(
            "NO_LOCAL_PASSWORD",
            "This account signs in through an external provider".into(),
        ));
    };
    if !verify_password(&req.old_password, &stored) {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(req.new_password.trim())?;

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        UPDATE app_user
        SET password_hash = $1
        WHERE user_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?;

    // Keep the current session, drop every other one.
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.session_token_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(ApiOk::new(OkData { ok: true })))
}
