use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{Bus, NewSchedule, Schedule};
use crate::schema::{buses, routes, schedules};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inventory::schema::inventory_units;
use inventory::{InventoryUnit, ReservationStore};
use serde::{Deserialize, Serialize};
use shared::{Error, Role};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub route_id: Option<Uuid>,
    pub travel_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub seat_capacity: i32,
    pub available_seats: i32,
}

impl ScheduleResponse {
    fn from_parts(schedule: Schedule, unit: &InventoryUnit) -> Self {
        Self {
            id: schedule.id,
            bus_id: schedule.bus_id,
            route_id: schedule.route_id,
            travel_date: schedule.travel_date,
            departure_time: schedule.departure_time,
            arrival_time: schedule.arrival_time,
            seat_capacity: unit.capacity_total,
            available_seats: unit.capacity_remaining,
        }
    }
}

pub async fn create_schedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError> {
    user.require(Role::Driver)?;
    if request.arrival_time <= request.departure_time {
        return Err(Error::validation("arrival must be after departure").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let bus = buses::table
        .filter(buses::id.eq(request.bus_id))
        .first::<Bus>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("bus"))?;
    let route_exists = routes::table
        .filter(routes::id.eq(request.route_id))
        .count()
        .get_result::<i64>(&mut conn)
        .await?;
    if route_exists == 0 {
        return Err(Error::NotFound("route").into());
    }

    // the seat pool for this departure is sized by the bus
    let unit = state.inventory.create_unit(bus.seat_capacity).await?;
    let schedule = diesel::insert_into(schedules::table)
        .values(&NewSchedule {
            id: Uuid::new_v4(),
            bus_id: request.bus_id,
            route_id: request.route_id,
            inventory_unit_id: unit.id,
            travel_date: request.travel_date,
            departure_time: request.departure_time,
            arrival_time: request.arrival_time,
        })
        .get_result::<Schedule>(&mut conn)
        .await?;

    info!(schedule = %schedule.id, seats = unit.capacity_total, "Created schedule");
    Ok((
        StatusCode::CREATED,
        Json(ScheduleResponse::from_parts(schedule, &unit)),
    ))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleResponse>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let mut schedules_query = schedules::table.into_boxed();
    if let Some(route_id) = query.route_id {
        schedules_query = schedules_query.filter(schedules::route_id.eq(route_id));
    }
    if let Some(travel_date) = query.travel_date {
        schedules_query = schedules_query.filter(schedules::travel_date.eq(travel_date));
    }
    let rows = schedules_query
        .order(schedules::travel_date.asc())
        .load::<Schedule>(&mut conn)
        .await?;

    let unit_ids: Vec<Uuid> = rows.iter().map(|s| s.inventory_unit_id).collect();
    let units: HashMap<Uuid, InventoryUnit> = inventory_units::table
        .filter(inventory_units::id.eq_any(unit_ids))
        .load::<InventoryUnit>(&mut conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut responses = Vec::with_capacity(rows.len());
    for schedule in rows {
        let unit = units
            .get(&schedule.inventory_unit_id)
            .ok_or(Error::NotFound("inventory unit"))?;
        responses.push(ScheduleResponse::from_parts(schedule, unit));
    }
    Ok(Json(responses))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let schedule = schedules::table
        .filter(schedules::id.eq(schedule_id))
        .first::<Schedule>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("schedule"))?;

    let unit = state
        .inventory
        .inventory_unit(schedule.inventory_unit_id)
        .await?
        .ok_or(Error::NotFound("inventory unit"))?;
    Ok(Json(ScheduleResponse::from_parts(schedule, &unit)))
}
