// src/routes/hospital_routes.rs

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, ApiOk, AppState},
};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/hospital", get(get_hospital))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/hospital", put(update_hospital))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HospitalInfo {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
    pub business_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

impl Default for HospitalInfo {
    fn default() -> Self {
        HospitalInfo {
            name: "Hospital".to_string(),
            address: None,
            phone: None,
            fax: None,
            email: None,
            business_hours: None,
            latitude: None,
            longitude: None,
            description: None,
            logo_url: None,
        }
    }
}

pub async fn get_hospital(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<HospitalInfo>>, ApiError> {
    let info: Option<HospitalInfo> = sqlx::query_as::<_, HospitalInfo>(
        r#"
        SELECT name, address, phone, fax, email, business_hours, latitude, longitude, description, logo_url
        FROM hospital_info
        WHERE singleton_id = TRUE
        "#,
    )
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(ApiOk::new(info.unwrap_or_default())))
}

#[derive(Debug, Deserialize)]
pub struct UpdateHospitalRequest {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
    pub business_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

fn validate_hospital(req: &UpdateHospitalRequest) -> Result<(), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if name.chars().count() > 128 {
        return Err(ApiError::validation("name is too long (max 128)"));
    }
    if req.latitude.is_some() != req.longitude.is_some() {
        return Err(ApiError::validation("latitude and longitude must be given together"));
    }
    if let Some(lat) = req.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::validation("latitude must be between -90 and 90"));
        }
    }
    if let Some(lng) = req.longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ApiError::validation("longitude must be between -180 and 180"));
        }
    }
    Ok(())
}

/// Replaces the whole profile; omitted optional fields are cleared.
pub async fn update_hospital(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateHospitalRequest>,
) -> Result<Json<ApiOk<HospitalInfo>>, ApiError> {
    auth.ensure_admin()?;
    validate_hospital(&req)?;

    let info: HospitalInfo = sqlx::query_as::<_, HospitalInfo>(
        r#"
        INSERT INTO hospital_info (
          singleton_id, name, address, phone, fax, email,
          business_hours, latitude, longitude, description, logo_url
        )
        VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (singleton_id)
        DO UPDATE SET
          name = EXCLUDED.name,
          address = EXCLUDED.address,
          phone = EXCLUDED.phone,
          fax = EXCLUDED.fax,
          email = EXCLUDED.email,
          business_hours = EXCLUDED.business_hours,
          latitude = EXCLUDED.latitude,
          longitude = EXCLUDED.longitude,
          description = EXCLUDED.description,
          logo_url = EXCLUDED.logo_url,
          updated_at = now()
        RETURNING name, address, phone, fax, email, business_hours, latitude, longitude, description, logo_url
        "#,
    )
    .bind(req.name.trim())
    .bind(clean_opt(req.address.as_deref()))
    .bind(clean_opt(req.phone.as_deref()))
    .bind(clean_opt(req.fax.as_deref()))
    .bind(clean_opt(req.email.as_deref()))
    .bind(clean_opt(req.business_hours.as_deref()))
    .bind(req.latitude)
    .bind(req.longitude)
    .bind(clean_opt(req.description.as_deref()))
    .bind(clean_opt(req.logo_url.as_deref()))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ApiOk::new(info)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, lat: Option<f64>, lng: Option<f64>) -> UpdateHospitalRequest {
        UpdateHospitalRequest {
            name: name.into(),
            address: None,
            phone: None,
            fax: None,
            email: None,
            business_hours: None,
            latitude: lat,
            longitude: lng,
            description: None,
            logo_url: None,
        }
    }

    #[test]
    fn test_validate_hospital() {
        assert!(validate_hospital(&req("Seoul Clinic", Some(37.56), Some(126.97))).is_ok());
        assert!(validate_hospital(&req("  ", None, None)).is_err());
        assert!(validate_hospital(&req("A", Some(37.0), None)).is_err());
        assert!(validate_hospital(&req("A", Some(91.0), Some(0.0))).is_err());
        assert!(validate_hospital(&req(&"x".repeat(129), None, None)).is_err());
    }
}
