use crate::api::{ApiError, MessageResponse};
use crate::auth::CurrentUser;
use crate::models::{NewProduct, Product};
use crate::schema::products;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inventory::schema::inventory_units;
use inventory::{InventoryUnit, ReservationStore};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use shared::{Error, Role};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub available_quantity: i32,
    pub shop_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub shop_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub available_quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl ProductResponse {
    fn from_parts(product: Product, unit: &InventoryUnit) -> Self {
        Self {
            id: product.id,
            seller_id: product.seller_id,
            shop_id: product.shop_id,
            name: product.name,
            description: product.description,
            price: product.price,
            available_quantity: unit.capacity_remaining,
            created_at: product.created_at,
        }
    }
}

fn parse_price(price: f64) -> Result<BigDecimal, Error> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation("invalid price"));
    }
    BigDecimal::from_f64(price).ok_or_else(|| Error::validation("invalid price"))
}

pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    user.require(Role::Seller)?;
    if request.name.trim().is_empty() {
        return Err(Error::validation("product name is required").into());
    }
    let price = parse_price(request.price)?;

    // the stock pool is provisioned once, at listing time
    let unit = state.inventory.create_unit(request.available_quantity).await?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let product = diesel::insert_into(products::table)
        .values(&NewProduct {
            id: Uuid::new_v4(),
            seller_id: user.id,
            shop_id: request.shop_id,
            name: request.name.trim().to_string(),
            description: request.description,
            price,
            inventory_unit_id: unit.id,
        })
        .get_result::<Product>(&mut conn)
        .await?;

    info!(product = %product.id, stock = unit.capacity_total, "Listed product");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse::from_parts(product, &unit)),
    ))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let mut products_query = products::table.into_boxed();
    if let Some(shop_id) = query.shop_id {
        products_query = products_query.filter(products::shop_id.eq(shop_id));
    }
    if let Some(seller_id) = query.seller_id {
        products_query = products_query.filter(products::seller_id.eq(seller_id));
    }
    let rows = products_query
        .order(products::created_at.desc())
        .load::<Product>(&mut conn)
        .await?;

    let unit_ids: Vec<Uuid> = rows.iter().map(|p| p.inventory_unit_id).collect();
    let units: HashMap<Uuid, InventoryUnit> = inventory_units::table
        .filter(inventory_units::id.eq_any(unit_ids))
        .load::<InventoryUnit>(&mut conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut responses = Vec::with_capacity(rows.len());
    for product in rows {
        let unit = units
            .get(&product.inventory_unit_id)
            .ok_or(Error::NotFound("inventory unit"))?;
        responses.push(ProductResponse::from_parts(product, unit));
    }
    Ok(Json(responses))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let product = products::table
        .filter(products::id.eq(product_id))
        .first::<Product>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("product"))?;

    let unit = state
        .inventory
        .inventory_unit(product.inventory_unit_id)
        .await?
        .ok_or(Error::NotFound("inventory unit"))?;
    Ok(Json(ProductResponse::from_parts(product, &unit)))
}

pub async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    user.require(Role::Seller)?;
    let price = request.price.map(parse_price).transpose()?;

    #[derive(AsChangeset)]
    #[diesel(table_name = crate::schema::products)]
    struct ProductChanges {
        name: Option<String>,
        description: Option<String>,
        price: Option<BigDecimal>,
        updated_at: DateTime<Utc>,
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let product = diesel::update(
        products::table
            .filter(products::id.eq(product_id))
            .filter(products::seller_id.eq(user.id)),
    )
    .set(&ProductChanges {
        name: request.name,
        description: request.description,
        price,
        updated_at: Utc::now(),
    })
    .get_result::<Product>(&mut conn)
    .await
    .optional()?
    .ok_or(Error::NotFound("product"))?;

    let unit = state
        .inventory
        .inventory_unit(product.inventory_unit_id)
        .await?
        .ok_or(Error::NotFound("inventory unit"))?;
    Ok(Json(ProductResponse::from_parts(product, &unit)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require(Role::Seller)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let deleted = diesel::delete(
        products::table
            .filter(products::id.eq(product_id))
            .filter(products::seller_id.eq(user.id)),
    )
    .execute(&mut conn)
    .await?;
    if deleted == 0 {
        return Err(Error::NotFound("product").into());
    }
    Ok(Json(MessageResponse {
        message: "Product deleted".to_string(),
    }))
}
