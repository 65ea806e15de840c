// src/routes/price_routes.rs

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{clean_opt, deserialize_double_option, ApiOk, AppState},
    price_tree::{build_tree, creates_cycle, PriceCategoryNode, PriceCategoryRow, PriceItemRow},
};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/prices", get(get_price_list))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/prices", get(admin_price_list))
        .route("/prices/categories", post(create_category))
        .route("/prices/categories/{category_id}", patch(update_category).delete(delete_category))
        .route("/prices/items", post(create_item))
        .route("/prices/items/{item_id}", patch(update_item).delete(delete_item))
}

async fn load_tree(state: &AppState) -> Result<Vec<PriceCategoryNode>, ApiError> {
    let categories: Vec<PriceCategoryRow> = sqlx::query_as::<_, PriceCategoryRow>(
        r#"
        SELECT category_id, parent_id, name, display_order
        FROM price_category
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let items: Vec<PriceItemRow> = sqlx::query_as::<_, PriceItemRow>(
        r#"
        SELECT item_id, category_id, name, price, note, display_order
        FROM price_item
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(build_tree(categories, items))
}

pub async fn get_price_list(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<PriceCategoryNode>>>, ApiError> {
    Ok(Json(ApiOk::new(load_tree(&state).await?)))
}

pub async fn admin_price_list(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PriceCategoryNode>>>, ApiError> {
    auth.ensure_admin()?;
    Ok(Json(ApiOk::new(load_tree(&state).await?)))
}

/* ============================================================
   Categories
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub display_order: Option<i32>,
}

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if n.chars().count() > 100 {
        return Err(ApiError::validation("name is too long (max 100)"));
    }
    Ok(n)
}

pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiOk<PriceCategoryRow>>), ApiError> {
    auth.ensure_admin()?;
    let name = validate_name(&req.name)?;

    let row: PriceCategoryRow = sqlx::query_as::<_, PriceCategoryRow>(
        r#"
        INSERT INTO price_category (parent_id, name, display_order)
        VALUES ($1, $2, $3)
        RETURNING category_id, parent_id, name, display_order
        "#,
    )
    .bind(req.parent_id)
    .bind(name)
    .bind(req.display_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(row))))
}

pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(category_id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiOk<PriceCategoryRow>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(validate_name(n)?.to_string()),
        None => None,
    };

    if let Some(Some(parent)) = req.parent_id {
        let parents: HashMap<Uuid, Option<Uuid>> = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"SELECT category_id, parent_id FROM price_category"#,
        )
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .collect();

        if !parents.contains_key(&parent) {
            return Err(ApiError::not_found("parent category"));
        }
        if creates_cycle(category_id, parent, &parents) {
            return Err(ApiError::BadRequest(
                "CATEGORY_CYCLE",
                "a category cannot be placed under itself or its descendants".into(),
            ));
        }
    }

    let row: PriceCategoryRow = sqlx::query_as::<_, PriceCategoryRow>(
        r#"
        UPDATE price_category
        SET name = COALESCE($2, name),
            parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END,
            display_order = COALESCE($5, display_order)
        WHERE category_id = $1
        RETURNING category_id, parent_id, name, display_order
        "#,
    )
    .bind(category_id)
    .bind(name)
    .bind(req.parent_id.is_some())
    .bind(req.parent_id.flatten())
    .bind(req.display_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("category"))?;

    Ok(Json(ApiOk::new(row)))
}

/// Sub-categories and items go with it (FK cascade).
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM price_category WHERE category_id = $1"#)
        .bind(category_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("category"));
    }

    tracing::info!(%category_id, by = %auth.user_id, "price category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Items
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub category_id: Uuid,
    pub name: String,
    pub price: Option<i32>,
    pub note: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub price: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub note: Option<Option<String>>,
    pub display_order: Option<i32>,
}

fn validate_price(price: Option<i32>) -> Result<(), ApiError> {
    if price.is_some_and(|p| p < 0) {
        return Err(ApiError::validation("price must not be negative"));
    }
    Ok(())
}

pub async fn create_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiOk<PriceItemRow>>), ApiError> {
    auth.ensure_admin()?;
    let name = validate_name(&req.name)?;
    validate_price(req.price)?;

    let row: PriceItemRow = sqlx::query_as::<_, PriceItemRow>(
        r#"
        INSERT INTO price_item (category_id, name, price, note, display_order)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING item_id, category_id, name, price, note, display_order
        "#,
    )
    .bind(req.category_id)
    .bind(name)
    .bind(req.price)
    .bind(clean_opt(req.note.as_deref()))
    .bind(req.display_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(row))))
}

pub async fn update_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ApiOk<PriceItemRow>>, ApiError> {
    auth.ensure_admin()?;
    let name = match req.name.as_deref() {
        Some(n) => Some(validate_name(n)?.to_string()),
        None => None,
    };
    validate_price(req.price.flatten())?;

    let row: PriceItemRow = sqlx::query_as::<_, PriceItemRow>(
        r#"
        UPDATE price_item
        SET category_id = COALESCE($2, category_id),
            name = COALESCE($3, name),
            price = CASE WHEN $4 THEN $5 ELSE price END,
            note = CASE WHEN $6 THEN $7 ELSE note END,
            display_order = COALESCE($8, display_order)
        WHERE item_id = $1
        RETURNING item_id, category_id, name, price, note, display_order
        "#,
    )
    .bind(item_id)
    .bind(req.category_id)
    .bind(name)
    .bind(req.price.is_some())
    .bind(req.price.flatten())
    .bind(req.note.is_some())
    .bind(clean_opt(req.note.flatten().as_deref()))
    .bind(req.display_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("price item"))?;

    Ok(Json(ApiOk::new(row)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.ensure_admin()?;

    let res = sqlx::query(r#"DELETE FROM price_item WHERE item_id = $1"#)
        .bind(item_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("price item"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_price() {
        assert!(validate_price(None).is_ok());
        assert!(validate_price(Some(0)).is_ok());
        assert!(validate_price(Some(55_000)).is_ok());
        assert!(validate_price(Some(-1)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(" MRI ").unwrap(), "MRI");
        assert!(validate_name(" ").is_err());
    }
}
