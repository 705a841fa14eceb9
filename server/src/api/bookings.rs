use crate::api::{ApiError, MessageResponse};
use crate::auth::CurrentUser;
use crate::models::{Booking, NewBooking, Schedule};
use crate::schema::{bookings, schedules};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inventory::schema::reservations;
use inventory::{Reservation, ReservationStore};
use serde::{Deserialize, Serialize};
use shared::{Error, Role};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub schedule_id: Uuid,
    pub seats: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub reservation_id: Uuid,
    pub ticket_number: String,
    pub seats: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl BookingResponse {
    fn from_parts(booking: Booking, reservation: &Reservation) -> Self {
        Self {
            id: booking.id,
            schedule_id: booking.schedule_id,
            reservation_id: booking.reservation_id,
            ticket_number: booking.ticket_number,
            seats: reservation.quantity,
            status: reservation.status.clone(),
            created_at: booking.created_at,
        }
    }
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

pub async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    user.require(Role::Passenger)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let schedule = schedules::table
        .filter(schedules::id.eq(request.schedule_id))
        .first::<Schedule>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("schedule"))?;

    let key = idempotency_key(&headers);
    let reservation = state
        .engine
        .reserve(
            schedule.inventory_unit_id,
            user.id,
            request.seats,
            key.as_deref(),
        )
        .await?;

    // a retried request maps onto the booking its reservation already has
    let existing = bookings::table
        .filter(bookings::reservation_id.eq(reservation.id))
        .first::<Booking>(&mut conn)
        .await
        .optional()?;
    if let Some(existing) = existing {
        return Ok((
            StatusCode::OK,
            Json(BookingResponse::from_parts(existing, &reservation)),
        ));
    }

    let booking = diesel::insert_into(bookings::table)
        .values(&NewBooking {
            id: Uuid::new_v4(),
            user_id: user.id,
            schedule_id: schedule.id,
            reservation_id: reservation.id,
            ticket_number: Uuid::new_v4().to_string(),
        })
        .get_result::<Booking>(&mut conn)
        .await?;

    info!(
        booking = %booking.id,
        seats = reservation.quantity,
        "Created booking for schedule {}", schedule.id
    );
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_parts(booking, &reservation)),
    ))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = bookings::table
        .filter(bookings::user_id.eq(user.id))
        .order(bookings::created_at.desc())
        .load::<Booking>(&mut conn)
        .await?;

    let reservation_ids: Vec<Uuid> = rows.iter().map(|b| b.reservation_id).collect();
    let held: HashMap<Uuid, Reservation> = reservations::table
        .filter(reservations::id.eq_any(reservation_ids))
        .load::<Reservation>(&mut conn)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let mut responses = Vec::with_capacity(rows.len());
    for booking in rows {
        let reservation = held
            .get(&booking.reservation_id)
            .ok_or(Error::NotFound("reservation"))?;
        responses.push(BookingResponse::from_parts(booking, reservation));
    }
    Ok(Json(responses))
}

pub async fn get_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let booking = bookings::table
        .filter(bookings::id.eq(booking_id))
        .filter(bookings::user_id.eq(user.id))
        .first::<Booking>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("booking"))?;

    let reservation = state
        .engine
        .store()
        .reservation(booking.reservation_id)
        .await?
        .ok_or(Error::NotFound("reservation"))?;
    Ok(Json(BookingResponse::from_parts(booking, &reservation)))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let booking = bookings::table
        .filter(bookings::id.eq(booking_id))
        .filter(bookings::user_id.eq(user.id))
        .first::<Booking>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("booking"))?;

    state.engine.release(booking.reservation_id).await?;
    diesel::delete(bookings::table.filter(bookings::id.eq(booking.id)))
        .execute(&mut conn)
        .await?;

    info!(booking = %booking.id, "Cancelled booking");
    Ok(Json(MessageResponse {
        message: "Booking cancelled".to_string(),
    }))
}
