// src/routes/reservation_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{
    auth::{hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, like_pattern, ApiOk, AppState, PageQuery, Paged, ReservationStatus},
    routes::holiday_routes::is_holiday,
    schedule::{self, DaySchedule},
};

const NON_MEMBER_PASSWORD_MIN: usize = 4;
const SYMPTOMS_MAX: usize = 1000;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/slots", get(get_slots))
        .route("/reservations/mine", get(list_my_reservations))
        .route("/reservations/lookup", post(lookup_reservations))
        .route("/reservations/{reservation_id}/cancel", post(cancel_reservation))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations))
        .route(
            "/reservations/{reservation_id}",
            get(get_reservation).delete(delete_reservation),
        )
        .route("/reservations/{reservation_id}/status", patch(update_status))
}

/* ============================================================
   DTOs
   ============================================================ */

fn serialize_slot<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&schedule::format_slot(*t))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReservationDto {
    pub reservation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_member: bool,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub patient_name: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub reserved_date: NaiveDate,
    #[serde(serialize_with = "serialize_slot")]
    pub reserved_time: NaiveTime,
    pub symptoms: Option<String>,
    pub status: ReservationStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const RESERVATION_SELECT: &str = r#"
    SELECT
      r.reservation_id,
      r.user_id,
      r.booked_as_member AS is_member,
      r.doctor_id,
      doc.name AS doctor_name,
      r.department_id,
      dep.name AS department_name,
      r.patient_name,
      r.phone,
      r.birth_date,
      r.reserved_date,
      r.reserved_time,
      r.symptoms,
      r.status,
      r.cancelled_at,
      r.created_at,
      r.updated_at
    FROM reservation r
    LEFT JOIN doctor doc ON doc.doctor_id = r.doctor_id
    LEFT JOIN department dep ON dep.department_id = r.department_id
"#;

async fn fetch_reservation(state: &AppState, reservation_id: Uuid) -> Result<ReservationDto, ApiError> {
    let sql = format!("{RESERVATION_SELECT} WHERE r.reservation_id = $1");
    sqlx::query_as::<_, ReservationDto>(&sql)
        .bind(reservation_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("reservation"))
}

/* ============================================================
   Validation
   ============================================================ */

/// Accepts Korean phone numbers with or without separators and returns the
/// hyphenated form, e.g. `01012345678` -> `010-1234-5678`.
pub fn normalize_phone(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ') {
        return Err(ApiError::validation("phone may only contain digits and '-'"));
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !digits.starts_with('0') || !(9..=11).contains(&digits.len()) {
        return Err(ApiError::validation("phone number is invalid"));
    }

    let seoul = digits.starts_with("02");
    let (a, b) = match (digits.len(), seoul) {
        (9, true) => (2, 5),
        (10, true) => (2, 6),
        (10, false) => (3, 6),
        (11, false) => (3, 7),
        _ => return Err(ApiError::validation("phone number is invalid")),
    };
    Ok(format!("{}-{}-{}", &digits[..a], &digits[a..b], &digits[b..]))
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    /// Non-member lookup password; ignored for signed-in members.
    pub password: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub department_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub reserved_date: NaiveDate,
    pub reserved_time: String,
    pub symptoms: Option<String>,
}

#[derive(Debug, PartialEq)]
struct ValidReservation {
    patient_name: String,
    phone: String,
    password: Option<String>,
    reserved_time: NaiveTime,
    symptoms: Option<String>,
}

/// Profile values used when a signed-in member omits name or phone.
#[derive(Debug, Default)]
struct MemberDefaults {
    display_name: Option<String>,
    phone: Option<String>,
}

fn validate_new_reservation(
    req: &CreateReservationRequest,
    member: Option<&MemberDefaults>,
    is_holiday: bool,
    now: NaiveDateTime,
) -> Result<ValidReservation, ApiError> {
    let patient_name = clean_opt(req.patient_name.as_deref())
        .or_else(|| member.and_then(|m| m.display_name.clone()))
        .ok_or_else(|| ApiError::validation("patient_name is required"))?;
    if patient_name.chars().count() > 50 {
        return Err(ApiError::validation("patient_name is too long (max 50)"));
    }

    let phone_raw = clean_opt(req.phone.as_deref())
        .or_else(|| member.and_then(|m| m.phone.clone()))
        .ok_or_else(|| ApiError::validation("phone is required"))?;
    let phone = normalize_phone(&phone_raw)?;

    let password = if member.is_some() {
        None
    } else {
        let pw = req.password.as_deref().map(str::trim).unwrap_or_default();
        if pw.chars().count() < NON_MEMBER_PASSWORD_MIN {
            return Err(ApiError::validation(format!(
                "password must be at least {NON_MEMBER_PASSWORD_MIN} characters"
            )));
        }
        Some(pw.to_string())
    };

    if let Some(birth) = req.birth_date {
        if birth > now.date() {
            return Err(ApiError::validation("birth_date cannot be in the future"));
        }
    }

    let reserved_time = schedule::parse_slot(&req.reserved_time)
        .ok_or_else(|| ApiError::validation("reserved_time must be HH:MM"))?;

    if req.reserved_date < now.date() {
        return Err(ApiError::BadRequest(
            "PAST_DATE",
            "reservations cannot be made for past dates".into(),
        ));
    }
    if req.reserved_date == now.date() && reserved_time <= now.time() {
        return Err(ApiError::BadRequest(
            "PAST_DATE",
            "that time has already passed".into(),
        ));
    }
    if !schedule::is_valid_slot(req.reserved_date, reserved_time, is_holiday) {
        return Err(ApiError::BadRequest(
            "CLOSED_SLOT",
            "the hospital is closed at the selected date/time".into(),
        ));
    }

    let symptoms = clean_opt(req.symptoms.as_deref());
    if symptoms.as_ref().is_some_and(|s| s.chars().count() > SYMPTOMS_MAX) {
        return Err(ApiError::validation(format!("symptoms is too long (max {SYMPTOMS_MAX})")));
    }

    Ok(ValidReservation {
        patient_name,
        phone,
        password,
        reserved_time,
        symptoms,
    })
}

/* ============================================================
   GET /reservations/slots
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: String,
}

pub async fn get_slots(
    State(state): State<AppState>,
    Query(q): Query<SlotQuery>,
) -> Result<Json<ApiOk<DaySchedule>>, ApiError> {
    let date = NaiveDate::parse_from_str(q.date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation("date must be YYYY-MM-DD"))?;
    let holiday = is_holiday(&state, date).await?;
    Ok(Json(ApiOk::new(schedule::day_slots(date, holiday, state.clinic_now()))))
}

/* ============================================================
   POST /reservations
   ============================================================ */

async fn resolve_department(
    state: &AppState,
    doctor_id: Option<Uuid>,
    department_id: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    let Some(doctor_id) = doctor_id else {
        return Ok(department_id);
    };

    let row: Option<(Option<Uuid>, bool)> = sqlx::query_as(
        r#"
        SELECT department_id, is_active
        FROM doctor
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .fetch_optional(&state.db)
    .await?;

    let Some((doctor_department, true)) = row else {
        return Err(ApiError::BadRequest(
            "DOCTOR_UNAVAILABLE",
            "the selected doctor is not available".into(),
        ));
    };

    match (department_id, doctor_department) {
        (Some(req), Some(actual)) if req != actual => Err(ApiError::validation(
            "doctor does not belong to the selected department",
        )),
        (Some(req), _) => Ok(Some(req)),
        (None, actual) => Ok(actual),
    }
}

pub async fn create_reservation(
    State(state): State<AppState>,
    auth: Option<AuthContext>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiOk<ReservationDto>>), ApiError> {
    let member = match &auth {
        Some(a) => {
            let row: Option<(String, Option<String>)> = sqlx::query_as(
                r#"SELECT display_name, phone FROM app_user WHERE user_id = $1"#,
            )
            .bind(a.user_id)
            .fetch_optional(&state.db)
            .await?;
            let (display_name, phone) = row.ok_or_else(ApiError::session_expired)?;
            Some(MemberDefaults { display_name: Some(display_name), phone })
        }
        None => None,
    };

    let holiday = is_holiday(&state, req.reserved_date).await?;
    let valid = validate_new_reservation(&req, member.as_ref(), holiday, state.clinic_now())?;
    let department_id = resolve_department(&state, req.doctor_id, req.department_id).await?;

    let password_hash = match valid.password.as_deref() {
        Some(pw) => Some(hash_password(pw)?),
        None => None,
    };

    let reservation_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO reservation (
          user_id, booked_as_member, doctor_id, department_id, patient_name, phone,
          password_hash, birth_date, reserved_date, reserved_time, symptoms, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING reservation_id
        "#,
    )
    .bind(auth.as_ref().map(|a| a.user_id))
    .bind(auth.is_some())
    .bind(req.doctor_id)
    .bind(department_id)
    .bind(&valid.patient_name)
    .bind(&valid.phone)
    .bind(password_hash)
    .bind(req.birth_date)
    .bind(req.reserved_date)
    .bind(valid.reserved_time)
    .bind(valid.symptoms)
    .bind(ReservationStatus::Pending)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        %reservation_id,
        member = auth.is_some(),
        date = %req.reserved_date,
        time = %schedule::format_slot(valid.reserved_time),
        "reservation created"
    );

    Ok((StatusCode::CREATED, Json(ApiOk::new(fetch_reservation(&state, reservation_id).await?))))
}

/* ============================================================
   Member / non-member access
   ============================================================ */

pub async fn list_my_reservations(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReservationDto>>>, ApiError> {
    let sql = format!(
        "{RESERVATION_SELECT} WHERE r.user_id = $1 ORDER BY r.reserved_date DESC, r.reserved_time DESC"
    );
    let rows = sqlx::query_as::<_, ReservationDto>(&sql)
        .bind(auth.user_id)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, sqlx::FromRow)]
struct NonMemberCredential {
    reservation_id: Uuid,
    password_hash: String,
}

pub async fn lookup_reservations(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<ApiOk<Vec<ReservationDto>>>, ApiError> {
    let phone = normalize_phone(&req.phone)?;
    if req.password.trim().is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let creds: Vec<NonMemberCredential> = sqlx::query_as::<_, NonMemberCredential>(
        r#"
        SELECT reservation_id, password_hash
        FROM reservation
        WHERE phone = $1
          AND user_id IS NULL
          AND password_hash IS NOT NULL
        "#,
    )
    .bind(&phone)
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = creds
        .into_iter()
        .filter(|c| verify_password(req.password.trim(), &c.password_hash))
        .map(|c| c.reservation_id)
        .collect();

    if ids.is_empty() {
        return Err(ApiError::NotFound(
            "NO_MATCH",
            "no reservation matches that phone number and password".into(),
        ));
    }

    let sql = format!(
        "{RESERVATION_SELECT} WHERE r.reservation_id = ANY($1) ORDER BY r.reserved_date DESC, r.reserved_time DESC"
    );
    let rows = sqlx::query_as::<_, ReservationDto>(&sql)
        .bind(&ids)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiOk::new(rows)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CancelTarget {
    user_id: Option<Uuid>,
    phone: String,
    password_hash: Option<String>,
    status: ReservationStatus,
}

fn may_cancel(target: &CancelTarget, auth: Option<&AuthContext>, req: &CancelRequest) -> bool {
    if let (Some(owner), Some(a)) = (target.user_id, auth) {
        return owner == a.user_id;
    }
    let (Some(hash), Some(phone), Some(pw)) =
        (target.password_hash.as_deref(), req.phone.as_deref(), req.password.as_deref())
    else {
        return false;
    };
    normalize_phone(phone).is_ok_and(|p| p == target.phone) && verify_password(pw.trim(), hash)
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    auth: Option<AuthContext>,
    Path(reservation_id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<ApiOk<ReservationDto>>, ApiError> {
    // members authenticate with their session and may omit the body
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let target: CancelTarget = sqlx::query_as::<_, CancelTarget>(
        r#"
        SELECT user_id, phone, password_hash, status
        FROM reservation
        WHERE reservation_id = $1
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("reservation"))?;

    if !may_cancel(&target, auth.as_ref(), &req) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You are not allowed to cancel this reservation".into(),
        ));
    }
    if !target.status.is_user_cancellable() {
        return Err(ApiError::Conflict(
            "NOT_CANCELLABLE",
            "this reservation can no longer be cancelled".into(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE reservation
        SET status = $2,
            cancelled_at = now(),
            updated_at = now()
        WHERE reservation_id = $1
        "#,
    )
    .bind(reservation_id)
    .bind(ReservationStatus::Cancelled)
    .execute(&state.db)
    .await?;

    tracing::info!(%reservation_id, member = auth.is_some(), "reservation cancelled by user");

    Ok(Json(ApiOk::new(fetch_reservation(&state, reservation_id).await?)))
}

/* ============================================================
   Admin
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Phone numbers are stored hyphenated; a search made only of digits and
/// separators is matched against the stored number with separators removed.
fn phone_search_pattern(q: &str) -> Option<String> {
    if !q.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ') {
        return None;
    }
    let digits: String = q.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= 3).then(|| format!("%{digits}%"))
}

pub async fn list_reservations(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<AdminListQuery>,
) -> Result<Json<ApiOk<Paged<ReservationDto>>>, ApiError> {
    auth.ensure_reservation_manager()?;

    let status = match clean_opt(q.status.as_deref()) {
        Some(s) => Some(
            ReservationStatus::parse(&s)
                .ok_or_else(|| ApiError::validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    let (from, to) = match q.date {
        Some(d) => (Some(d), Some(d)),
        None => (q.from, q.to),
    };
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(ApiError::validation("from must not be after to"));
        }
    }
    let search = clean_opt(q.q.as_deref()).map(|s| like_pattern(&s));
    let phone_digits = clean_opt(q.q.as_deref()).and_then(|s| phone_search_pattern(&s));
    let paging = PageQuery { page: q.page, per_page: q.per_page };
    let (page, per_page) = paging.resolve();

    let filter = r#"
        WHERE ($1::smallint IS NULL OR r.status = $1)
          AND ($2::date IS NULL OR r.reserved_date >= $2)
          AND ($3::date IS NULL OR r.reserved_date <= $3)
          AND ($4::uuid IS NULL OR r.doctor_id = $4)
          AND ($5::text IS NULL OR r.patient_name ILIKE $5
               OR ($6::text IS NOT NULL AND regexp_replace(r.phone, '[^0-9]', '', 'g') LIKE $6))
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM reservation r {filter}"))
        .bind(status)
        .bind(from)
        .bind(to)
        .bind(q.doctor_id)
        .bind(search.as_deref())
        .bind(phone_digits.as_deref())
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        "{RESERVATION_SELECT} {filter} ORDER BY r.reserved_date DESC, r.reserved_time DESC LIMIT $7 OFFSET $8"
    );
    let items = sqlx::query_as::<_, ReservationDto>(&sql)
        .bind(status)
        .bind(from)
        .bind(to)
        .bind(q.doctor_id)
        .bind(search.as_deref())
        .bind(phone_digits.as_deref())
        .bind(per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ApiOk::new(Paged { items, total, page, per_page })))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ApiOk<ReservationDto>>, ApiError> {
    auth.ensure_reservation_manager()?;
    Ok(Json(ApiOk::new(fetch_reservation(&state, reservation_id).await?)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReservationStatus,
}

/// Any status may be set; only authorization is checked.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiOk<ReservationDto>>, ApiError> {
    auth.ensure_reservation_manager()?;

    let res = sqlx::query(
        r#"
        UPDATE reservation
        SET status = $2,
            cancelled_at = CASE WHEN $2 = 3 THEN COALESCE(cancelled_at, now()) ELSE NULL END,
            updated_at = now()
        WHERE reservation_id = $1
        "#,
    )
    .bind(reservation_id)
    .bind(req.status)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("reservation"));
    }

    tracing::info!(%reservation_id, status = ?req.status, by = %auth.user_id, "reservation status changed");

    Ok(Json(ApiOk::new(fetch_reservation(&state, reservation_id).await?)))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reservation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM reservation WHERE reservation_id = $1"#)
        .bind(reservation_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("reservation"));
    }

    tracing::info!(%reservation_id, by = %auth.user_id, "reservation deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn base_request() -> CreateReservationRequest {
        CreateReservationRequest {
            patient_name: Some("Hong Gildong".into()),
            phone: Some("010 1234 5678".into()),
            password: Some("1234".into()),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 1),
            department_id: None,
            doctor_id: None,
            // Monday
            reserved_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            reserved_time: "10:30".into(),
            symptoms: Some("  cough  ".into()),
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("01012345678").unwrap(), "010-1234-5678");
        assert_eq!(normalize_phone("010-1234-5678").unwrap(), "010-1234-5678");
        assert_eq!(normalize_phone("0311234567").unwrap(), "031-123-4567");
        assert_eq!(normalize_phone("02-123-4567").unwrap(), "02-123-4567");
        assert_eq!(normalize_phone("0212345678").unwrap(), "02-1234-5678");
        assert!(normalize_phone("1012345678").is_err());
        assert!(normalize_phone("010-12a4-5678").is_err());
        assert!(normalize_phone("0101234").is_err());
    }

    #[test]
    fn test_non_member_reservation_is_valid() {
        let v = validate_new_reservation(&base_request(), None, false, at(2026, 10, 16, 12, 0)).unwrap();
        assert_eq!(v.phone, "010-1234-5678");
        assert_eq!(v.password.as_deref(), Some("1234"));
        assert_eq!(schedule::format_slot(v.reserved_time), "10:30");
        assert_eq!(v.symptoms.as_deref(), Some("cough"));
    }

    #[test]
    fn test_non_member_requires_password() {
        let mut req = base_request();
        req.password = Some("12".into());
        assert!(validate_new_reservation(&req, None, false, at(2026, 10, 16, 12, 0)).is_err());
        req.password = None;
        assert!(validate_new_reservation(&req, None, false, at(2026, 10, 16, 12, 0)).is_err());
    }

    #[test]
    fn test_member_falls_back_to_profile() {
        let mut req = base_request();
        req.patient_name = None;
        req.phone = None;
        req.password = None;
        let member = MemberDefaults {
            display_name: Some("Kim".into()),
            phone: Some("01099998888".into()),
        };
        let v = validate_new_reservation(&req, Some(&member), false, at(2026, 10, 16, 12, 0)).unwrap();
        assert_eq!(v.patient_name, "Kim");
        assert_eq!(v.phone, "010-9999-8888");
        assert_eq!(v.password, None);

        let empty = MemberDefaults::default();
        assert!(validate_new_reservation(&req, Some(&empty), false, at(2026, 10, 16, 12, 0)).is_err());
    }

    #[test]
    fn test_past_date_rejected_consistently() {
        let req = base_request();
        let err = validate_new_reservation(&req, None, false, at(2026, 10, 20, 8, 0)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("PAST_DATE", _)));

        // same day, slot already started
        let err = validate_new_reservation(&req, None, false, at(2026, 10, 19, 10, 30)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("PAST_DATE", _)));

        assert!(validate_new_reservation(&req, None, false, at(2026, 10, 19, 10, 0)).is_ok());
    }

    #[test]
    fn test_past_slot_judged_on_clinic_clock() {
        use chrono::{FixedOffset, TimeZone};

        // Monday 10:30 slot; 08:00 UTC is 17:00 in Seoul
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let utc = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let now = crate::models::wall_clock(kst, utc);

        let err = validate_new_reservation(&base_request(), None, false, now).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("PAST_DATE", _)));
    }

    #[test]
    fn test_closed_slots_rejected() {
        let now = at(2026, 10, 16, 12, 0);

        let mut lunch = base_request();
        lunch.reserved_time = "13:00".into();
        assert!(matches!(
            validate_new_reservation(&lunch, None, false, now).unwrap_err(),
            ApiError::BadRequest("CLOSED_SLOT", _)
        ));

        let mut sunday = base_request();
        sunday.reserved_date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(validate_new_reservation(&sunday, None, false, now).is_err());

        assert!(validate_new_reservation(&base_request(), None, true, now).is_err());

        let mut odd = base_request();
        odd.reserved_time = "10:15".into();
        assert!(validate_new_reservation(&odd, None, false, now).is_err());

        let mut garbage = base_request();
        garbage.reserved_time = "soon".into();
        assert!(validate_new_reservation(&garbage, None, false, now).is_err());
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let mut req = base_request();
        req.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(validate_new_reservation(&req, None, false, at(2026, 10, 16, 12, 0)).is_err());
    }

    fn target(user_id: Option<Uuid>, password: Option<&str>) -> CancelTarget {
        CancelTarget {
            user_id,
            phone: "010-1234-5678".into(),
            password_hash: password.map(|p| hash_password(p).unwrap()),
            status: ReservationStatus::Pending,
        }
    }

    #[test]
    fn test_may_cancel_member() {
        let owner = Uuid::new_v4();
        let t = target(Some(owner), None);
        let me = AuthContext { user_id: owner, role: 0, session_token_id: Uuid::new_v4() };
        let other = AuthContext { user_id: Uuid::new_v4(), role: 0, session_token_id: Uuid::new_v4() };

        assert!(may_cancel(&t, Some(&me), &CancelRequest::default()));
        assert!(!may_cancel(&t, Some(&other), &CancelRequest::default()));
        assert!(!may_cancel(&t, None, &CancelRequest::default()));
    }

    #[test]
    fn test_may_cancel_non_member() {
        let t = target(None, Some("4321"));
        let ok = CancelRequest { phone: Some("01012345678".into()), password: Some("4321".into()) };
        let bad_pw = CancelRequest { phone: Some("01012345678".into()), password: Some("0000".into()) };
        let bad_phone = CancelRequest { phone: Some("01000000000".into()), password: Some("4321".into()) };

        assert!(may_cancel(&t, None, &ok));
        assert!(!may_cancel(&t, None, &bad_pw));
        assert!(!may_cancel(&t, None, &bad_phone));
        assert!(!may_cancel(&t, None, &CancelRequest::default()));
    }

    #[test]
    fn test_phone_search_pattern_ignores_separators() {
        assert_eq!(phone_search_pattern("01012345678").as_deref(), Some("%01012345678%"));
        assert_eq!(phone_search_pattern("010-1234").as_deref(), Some("%0101234%"));
        assert_eq!(phone_search_pattern("Hong"), None);
        assert_eq!(phone_search_pattern("01"), None);
    }

    #[test]
    fn test_cancel_request_defaults_to_no_credentials() {
        let req = CancelRequest::default();
        assert!(req.phone.is_none() && req.password.is_none());
    }

    #[test]
    fn test_status_request_parses_lowercase() {
        let req: UpdateStatusRequest = serde_json::from_str(r#"{"status":"confirmed"}"#).unwrap();
        assert_eq!(req.status, ReservationStatus::Confirmed);
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"archived"}"#).is_err());
    }
}
