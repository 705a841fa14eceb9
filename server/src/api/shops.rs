use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{NewRetailShop, RetailShop};
use crate::schema::retail_shops;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::{Error, Role};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub description: Option<String>,
}

pub async fn list_shops(State(state): State<AppState>) -> Result<Json<Vec<RetailShop>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = retail_shops::table
        .order(retail_shops::name.asc())
        .load::<RetailShop>(&mut conn)
        .await?;
    Ok(Json(rows))
}

pub async fn create_shop(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateShopRequest>,
) -> Result<(StatusCode, Json<RetailShop>), ApiError> {
    user.require(Role::Seller)?;
    if request.name.trim().is_empty() {
        return Err(Error::validation("shop name is required").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(retail_shops::table)
        .values(&NewRetailShop {
            id: Uuid::new_v4(),
            owner_id: user.id,
            name: request.name.trim().to_string(),
            location: request.location,
            contact_info: request.contact_info,
            description: request.description,
        })
        .get_result::<RetailShop>(&mut conn)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn get_shop(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
) -> Result<Json<RetailShop>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = retail_shops::table
        .filter(retail_shops::id.eq(shop_id))
        .first::<RetailShop>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("shop"))?;
    Ok(Json(row))
}
