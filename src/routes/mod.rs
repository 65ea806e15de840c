use crate::models::AppState;
use axum::Router;

pub mod auth_routes;
pub mod department_routes;
pub mod doctor_routes;
pub mod health_routes;
pub mod holiday_routes;
pub mod hospital_routes;
pub mod notice_routes;
pub mod popup_routes;
pub mod price_routes;
pub mod reservation_routes;
pub mod treatment_case_routes;
pub mod user_routes;

fn public_api() -> Router<AppState> {
    Router::new()
        .merge(hospital_routes::public_router())
        .merge(department_routes::public_router())
        .merge(doctor_routes::public_router())
        .merge(holiday_routes::public_router())
        .merge(reservation_routes::public_router())
        .merge(notice_routes::public_router())
        .merge(popup_routes::public_router())
        .merge(price_routes::public_router())
        .merge(treatment_case_routes::public_router())
}

fn admin_api() -> Router<AppState> {
    Router::new()
        .merge(hospital_routes::admin_router())
        .merge(department_routes::admin_router())
        .merge(doctor_routes::admin_router())
        .merge(holiday_routes::admin_router())
        .merge(reservation_routes::admin_router())
        .merge(notice_routes::admin_router())
        .merge(popup_routes::admin_router())
        .merge(price_routes::admin_router())
        .merge(treatment_case_routes::admin_router())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/admin/users", user_routes::router())
        .nest("/api/admin", admin_api())
        .nest("/api", public_api())
        .merge(health_routes::router())
        .with_state(state)
}
