use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{Bus, BusOperator, NewBus, NewBusOperator};
use crate::schema::{bus_operators, buses};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::{Error, Role};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateOperatorRequest {
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusRequest {
    pub operator_id: Option<Uuid>,
    pub bus_number: String,
    pub seat_capacity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBusRequest {
    pub operator_id: Option<Uuid>,
    pub bus_number: Option<String>,
}

pub async fn list_operators(
    State(state): State<AppState>,
) -> Result<Json<Vec<BusOperator>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = bus_operators::table
        .order(bus_operators::name.asc())
        .load::<BusOperator>(&mut conn)
        .await?;
    Ok(Json(rows))
}

pub async fn create_operator(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateOperatorRequest>,
) -> Result<(StatusCode, Json<BusOperator>), ApiError> {
    user.require(Role::Admin)?;
    if request.name.trim().is_empty() {
        return Err(Error::validation("operator name is required").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(bus_operators::table)
        .values(&NewBusOperator {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            contact_info: request.contact_info,
        })
        .get_result::<BusOperator>(&mut conn)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_buses(State(state): State<AppState>) -> Result<Json<Vec<Bus>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = buses::table
        .order(buses::bus_number.asc())
        .load::<Bus>(&mut conn)
        .await?;
    Ok(Json(rows))
}

pub async fn create_bus(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateBusRequest>,
) -> Result<(StatusCode, Json<Bus>), ApiError> {
    user.require(Role::Driver)?;
    if request.bus_number.trim().is_empty() {
        return Err(Error::validation("bus number is required").into());
    }
    if request.seat_capacity <= 0 {
        return Err(Error::validation("seat capacity must be positive").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(buses::table)
        .values(&NewBus {
            id: Uuid::new_v4(),
            operator_id: request.operator_id,
            bus_number: request.bus_number.trim().to_string(),
            seat_capacity: request.seat_capacity,
        })
        .get_result::<Bus>(&mut conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::Duplicate("bus number")
            }
            other => other.into(),
        })?;

    info!(bus = %row.id, "Registered bus {}", row.bus_number);
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn get_bus(
    State(state): State<AppState>,
    Path(bus_id): Path<Uuid>,
) -> Result<Json<Bus>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = buses::table
        .filter(buses::id.eq(bus_id))
        .first::<Bus>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("bus"))?;
    Ok(Json(row))
}

pub async fn update_bus(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bus_id): Path<Uuid>,
    Json(request): Json<UpdateBusRequest>,
) -> Result<Json<Bus>, ApiError> {
    user.require(Role::Driver)?;

    #[derive(AsChangeset)]
    #[diesel(table_name = crate::schema::buses)]
    struct BusChanges {
        operator_id: Option<Uuid>,
        bus_number: Option<String>,
        updated_at: chrono::DateTime<Utc>,
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::update(buses::table.filter(buses::id.eq(bus_id)))
        .set(&BusChanges {
            operator_id: request.operator_id,
            bus_number: request.bus_number.map(|n| n.trim().to_string()),
            updated_at: Utc::now(),
        })
        .get_result::<Bus>(&mut conn)
        .await
        .optional()
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::Duplicate("bus number")
            }
            other => other.into(),
        })?
        .ok_or(Error::NotFound("bus"))?;
    Ok(Json(row))
}

pub async fn delete_bus(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bus_id): Path<Uuid>,
) -> Result<Json<crate::api::MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let deleted = diesel::delete(buses::table.filter(buses::id.eq(bus_id)))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(Error::NotFound("bus").into());
    }
    Ok(Json(crate::api::MessageResponse {
        message: "Bus deleted".to_string(),
    }))
}
