use crate::api::{ApiError, MessageResponse};
use crate::auth::CurrentUser;
use crate::models::{NewRoute, Route};
use crate::schema::routes;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::{Error, Role};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub origin: String,
    pub destination: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub description: Option<String>,
}

pub async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<Route>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = routes::table
        .order(routes::origin.asc())
        .load::<Route>(&mut conn)
        .await?;
    Ok(Json(rows))
}

pub async fn create_route(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<Route>), ApiError> {
    user.require(Role::Admin)?;
    if request.origin.trim().is_empty() || request.destination.trim().is_empty() {
        return Err(Error::validation("origin and destination are required").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(routes::table)
        .values(&NewRoute {
            id: Uuid::new_v4(),
            origin: request.origin.trim().to_string(),
            destination: request.destination.trim().to_string(),
            description: request.description,
        })
        .get_result::<Route>(&mut conn)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<Json<Route>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = routes::table
        .filter(routes::id.eq(route_id))
        .first::<Route>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("route"))?;
    Ok(Json(row))
}

pub async fn update_route(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(route_id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> Result<Json<Route>, ApiError> {
    user.require(Role::Admin)?;

    #[derive(AsChangeset)]
    #[diesel(table_name = crate::schema::routes)]
    struct RouteChanges {
        origin: Option<String>,
        destination: Option<String>,
        description: Option<String>,
        updated_at: chrono::DateTime<Utc>,
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::update(routes::table.filter(routes::id.eq(route_id)))
        .set(&RouteChanges {
            origin: request.origin,
            destination: request.destination,
            description: request.description,
            updated_at: Utc::now(),
        })
        .get_result::<Route>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("route"))?;
    Ok(Json(row))
}

pub async fn delete_route(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(route_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let deleted = diesel::delete(routes::table.filter(routes::id.eq(route_id)))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(Error::NotFound("route").into());
    }
    Ok(Json(MessageResponse {
        message: "Route deleted".to_string(),
    }))
}
