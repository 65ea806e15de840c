use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    /// Offset of the hospital's wall clock, independent of the host zone.
    pub clinic_offset: FixedOffset,
}

impl AppState {
    /// Current wall-clock time at the hospital.
    pub fn clinic_now(&self) -> NaiveDateTime {
        wall_clock(self.clinic_offset, Utc::now())
    }
}

pub fn wall_clock(offset: FixedOffset, at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&offset).naive_local()
}

/* -------------------------
   Response envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/* -------------------------
   Pagination
--------------------------*/

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// 1-based page, clamped per_page.
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }

    pub fn offset(&self) -> i64 {
        let (page, per_page) = self.resolve();
        (page - 1) * per_page
    }
}

/* -------------------------
   Users & sessions
--------------------------*/

pub const ROLE_MEMBER: i16 = 0;
pub const ROLE_ADMIN: i16 = 1;
pub const ROLE_STAFF: i16 = 2;

pub fn role_to_string(role: i16) -> String {
    match role {
        ROLE_MEMBER => "member",
        ROLE_ADMIN => "admin",
        ROLE_STAFF => "staff",
        _ => "unknown",
    }
    .to_string()
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: i16,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

impl From<UserRow> for UserProfile {
    fn from(u: UserRow) -> Self {
        UserProfile {
            user_id: u.user_id,
            username: u.username,
            display_name: u.display_name,
            phone: u.phone,
            email: u.email,
            role: role_to_string(u.role),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Reservation status
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ReservationStatus {
    Pending = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl ReservationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Users may withdraw a booking until it has been carried out.
    pub fn is_user_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// Distinguishes an absent field (None) from an explicit null (Some(None)) in PATCH bodies.
pub fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims and drops empty strings.
pub fn clean_opt(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Escapes LIKE wildcards and wraps for a contains-match.
pub fn like_pattern(q: &str) -> String {
    let escaped = q
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wall_clock_ignores_host_zone() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        // 08:00 UTC is already 17:00 at a Seoul hospital
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let local = wall_clock(kst, at);
        assert_eq!(local.to_string(), "2026-10-16 17:00:00");

        // 20:00 UTC is the next morning
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        assert_eq!(wall_clock(kst, at).date().to_string(), "2026-10-17");
    }

    #[test]
    fn test_page_query_defaults_and_clamps() {
        let q = PageQuery::default();
        assert_eq!(q.resolve(), (1, DEFAULT_PER_PAGE));
        assert_eq!(q.offset(), 0);

        let q = PageQuery { page: Some(0), per_page: Some(1000) };
        assert_eq!(q.resolve(), (1, MAX_PER_PAGE));

        let q = PageQuery { page: Some(3), per_page: Some(10) };
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn test_status_parse_and_serde() {
        assert_eq!(ReservationStatus::parse("Pending"), Some(ReservationStatus::Pending));
        assert_eq!(ReservationStatus::parse("canceled"), Some(ReservationStatus::Cancelled));
        assert_eq!(ReservationStatus::parse("done"), None);

        let json = serde_json::to_string(&ReservationStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        let back: ReservationStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, ReservationStatus::Completed);
    }

    #[test]
    fn test_user_cancellable() {
        assert!(ReservationStatus::Pending.is_user_cancellable());
        assert!(ReservationStatus::Confirmed.is_user_cancellable());
        assert!(!ReservationStatus::Completed.is_user_cancellable());
        assert!(!ReservationStatus::Cancelled.is_user_cancellable());
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "deserialize_double_option")]
            note: Option<Option<String>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);
        let null: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(null.note, Some(None));
        let set: Patch = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".into())));
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern(" flu "), "%flu%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_clean_opt() {
        assert_eq!(clean_opt(Some("  ")), None);
        assert_eq!(clean_opt(Some(" a ")), Some("a".into()));
        assert_eq!(clean_opt(None), None);
    }
}
