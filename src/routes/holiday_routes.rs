// src/routes/holiday_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/holidays", get(list_holidays))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/holidays", get(admin_list_holidays).post(create_holiday))
        .route("/holidays/{holiday_id}", delete(delete_holiday))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HolidayRow {
    pub holiday_id: Uuid,
    pub holiday_date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct HolidayQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Half-open `[from, to)` for the requested year / month.
fn query_range(q: &HolidayQuery, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let year = q.year.unwrap_or_else(|| today.year());
    let invalid = || ApiError::validation("invalid year/month");

    match q.month {
        Some(m) => {
            if !(1..=12).contains(&m) {
                return Err(ApiError::validation("month must be between 1 and 12"));
            }
            let from = NaiveDate::from_ymd_opt(year, m, 1).ok_or_else(invalid)?;
            let to = if m == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, m + 1, 1)
            }
            .ok_or_else(invalid)?;
            Ok((from, to))
        }
        None => {
            let from = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
            let to = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(invalid)?;
            Ok((from, to))
        }
    }
}

pub async fn list_holidays(
    State(state): State<AppState>,
    Query(q): Query<HolidayQuery>,
) -> Result<Json<ApiOk<Vec<HolidayRow>>>, ApiError> {
    let (from, to) = query_range(&q, state.clinic_now().date())?;

    let rows: Vec<HolidayRow> = sqlx::query_as::<_, HolidayRow>(
        r#"
        SELECT holiday_id, holiday_date, name
        FROM holiday
        WHERE holiday_date >= $1
          AND holiday_date <  $2
        ORDER BY holiday_date ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiOk::new(rows)))
}

pub async fn admin_list_holidays(
    state: State<AppState>,
    auth: AuthContext,
    q: Query<HolidayQuery>,
) -> Result<Json<ApiOk<Vec<HolidayRow>>>, ApiError> {
    auth.ensure_admin()?;
    list_holidays(state, q).await
}

pub async fn is_holiday(state: &AppState, date: NaiveDate) -> Result<bool, ApiError> {
    let found: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM holiday WHERE holiday_date = $1)
        "#,
    )
    .bind(date)
    .fetch_one(&state.db)
    .await?;
    Ok(found)
}

#[derive(Debug, Deserialize)]
pub struct CreateHolidayRequest {
    pub holiday_date: NaiveDate,
    pub name: String,
}

pub async fn create_holiday(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateHolidayRequest>,
) -> Result<(StatusCode, Json<ApiOk<HolidayRow>>), ApiError> {
    auth.ensure_admin()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let row: HolidayRow = sqlx::query_as::<_, HolidayRow>(
        r#"
        INSERT INTO holiday (holiday_date, name)
        VALUES ($1, $2)
        RETURNING holiday_id, holiday_date, name
        "#,
    )
    .bind(req.holiday_date)
    .bind(name)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(..) => {
            ApiError::Conflict("HOLIDAY_EXISTS", "a holiday is already registered for that date".into())
        }
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(row))))
}

pub async fn delete_holiday(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(holiday_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM holiday WHERE holiday_id = $1"#)
        .bind(holiday_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("holiday"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_query_range_month() {
        let q = HolidayQuery { year: Some(2026), month: Some(12) };
        assert_eq!(query_range(&q, d(2020, 1, 1)).unwrap(), (d(2026, 12, 1), d(2027, 1, 1)));

        let q = HolidayQuery { year: Some(2026), month: Some(2) };
        assert_eq!(query_range(&q, d(2020, 1, 1)).unwrap(), (d(2026, 2, 1), d(2026, 3, 1)));
    }

    #[test]
    fn test_query_range_defaults_to_current_year() {
        let q = HolidayQuery { year: None, month: None };
        assert_eq!(query_range(&q, d(2026, 10, 16)).unwrap(), (d(2026, 1, 1), d(2027, 1, 1)));
    }

    #[test]
    fn test_query_range_rejects_bad_month() {
        let q = HolidayQuery { year: Some(2026), month: Some(13) };
        assert!(query_range(&q, d(2026, 1, 1)).is_err());
    }
}
