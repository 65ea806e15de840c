use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, ROLE_ADMIN, ROLE_STAFF};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: i16,
    pub session_token_id: Uuid,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only administrators can perform this action".into(),
            ))
        }
    }

    /// Reservations may also be handled by front-desk staff.
    pub fn ensure_reservation_manager(&self) -> Result<(), ApiError> {
        if self.is_admin() || self.role == ROLE_STAFF {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only admin/staff can manage reservations".into(),
            ))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    role: i16,
}

async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<AuthContext, ApiError> {
    let TypedHeader(authz) =
        <TypedHeader<Authorization<Bearer>> as FromRequestParts<AppState>>::from_request_parts(
            parts, state,
        )
        .await
        .map_err(|_| ApiError::session_expired())?;

    let token_hash = hash_access_token(authz.token());

    let row: SessionLookupRow = sqlx::query_as::<_, SessionLookupRow>(
        r#"
        SELECT st.session_token_id, st.user_id, u.role
        FROM session_token st
        JOIN app_user u ON u.user_id = st.user_id
        WHERE st.session_token_hash = $1
          AND st.revoked_at IS NULL
          AND st.expires_at > now()
          AND u.is_active = true
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    // Touch last_seen_at (best-effort)
    let _ = sqlx::query(
        r#"
        UPDATE session_token
        SET last_seen_at = now()
        WHERE session_token_id = $1
        "#,
    )
    .bind(row.session_token_id)
    .execute(&state.db)
    .await;

    Ok(AuthContext {
        user_id: row.user_id,
        role: row.role,
        session_token_id: row.session_token_id,
    })
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await
    }
}

/// `Option<AuthContext>`: no Authorization header means anonymous (non-member),
/// a header carrying a bad or expired token is still rejected.
impl axum::extract::OptionalFromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }
        authenticate(parts, state).await.map(Some)
    }
}
