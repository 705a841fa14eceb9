use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{Booking, Order, OrderItem};
use crate::schema::{bookings, order_items, orders};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use num_traits::FromPrimitive;
use payments::Payment;
use serde::{Deserialize, Serialize};
use shared::{Error, PaymentOutcome};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StkPushRequest {
    pub phone: String,
    pub amount: f64,
    pub booking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub transaction_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

pub async fn stk_push(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StkPushRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    if request.phone.trim().is_empty() {
        return Err(Error::validation("phone number is required").into());
    }
    let amount = request
        .amount
        .is_finite()
        .then(|| BigDecimal::from_f64(request.amount))
        .flatten()
        .ok_or_else(|| Error::validation("invalid amount"))?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let reservation_id = match request.booking_id {
        Some(booking_id) => {
            let booking = bookings::table
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::user_id.eq(user.id))
                .first::<Booking>(&mut conn)
                .await
                .optional()?
                .ok_or(Error::NotFound("booking"))?;
            Some(booking.reservation_id)
        }
        None => None,
    };
    if let Some(order_id) = request.order_id {
        orders::table
            .filter(orders::id.eq(order_id))
            .filter(orders::buyer_id.eq(user.id))
            .first::<Order>(&mut conn)
            .await
            .optional()?
            .ok_or(Error::NotFound("order"))?;
    }

    let payment = state
        .payments
        .initiate(reservation_id, request.order_id, amount, request.phone.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn provider_callback(
    State(state): State<AppState>,
    Json(envelope): Json<StkCallbackEnvelope>,
) -> Result<Json<CallbackAck>, ApiError> {
    let callback = envelope.body.stk_callback;
    let outcome = if callback.result_code == 0 {
        PaymentOutcome::Completed
    } else {
        PaymentOutcome::Failed
    };
    info!(
        transaction_id = %callback.checkout_request_id,
        result_code = callback.result_code,
        result = callback.result_desc.as_deref().unwrap_or(""),
        "Provider callback received"
    );

    let payment = state
        .payments
        .confirm(&callback.checkout_request_id, outcome)
        .await?;

    // an order payment also marks the order and confirms its item holds
    if outcome == PaymentOutcome::Completed {
        if let Some(order_id) = payment.order_id {
            settle_order(&state, order_id).await?;
        }
    }

    Ok(Json(CallbackAck {
        result_code: 0,
        result_desc: "Accepted".to_string(),
    }))
}

async fn settle_order(state: &AppState, order_id: Uuid) -> Result<(), Error> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let items = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .load::<OrderItem>(&mut conn)
        .await?;
    for item in &items {
        state.engine.confirm(item.reservation_id).await?;
    }

    // guarded so a replayed callback cannot double-transition
    diesel::update(
        orders::table
            .filter(orders::id.eq(order_id))
            .filter(orders::status.eq(super::orders::STATUS_PENDING)),
    )
    .set((
        orders::status.eq(super::orders::STATUS_PAID),
        orders::updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .await?;
    Ok(())
}

pub async fn payment_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let payment = state.payments.status(&transaction_id).await?;
    Ok(Json(PaymentStatusResponse {
        transaction_id: payment.transaction_id,
        status: payment.status,
    }))
}
