use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, Product};
use crate::schema::{order_items, orders, products};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::{AsyncConnection, RunQueryDsl};
use inventory::Reservation;
use serde::{Deserialize, Serialize};
use shared::{Error, Role};
use tracing::{info, warn};
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PAID: &str = "paid";
pub const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub reservation_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_price: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_parts(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            buyer_id: order.buyer_id,
            total_price: order.total_price,
            status: order.status,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    reservation_id: item.reservation_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

async fn release_all(state: &AppState, reserved: &[(Product, Reservation)]) {
    for (_, reservation) in reserved {
        if let Err(e) = state.engine.release(reservation.id).await {
            if !matches!(e, Error::AlreadyReleased) {
                warn!("Failed to release reservation {}: {}", reservation.id, e);
            }
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    user.require(Role::Buyer)?;
    if request.items.is_empty() {
        return Err(Error::validation("order needs at least one item").into());
    }

    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    // reserve stock item by item; roll the earlier holds back if one fails
    let mut reserved: Vec<(Product, Reservation)> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = match products::table
            .filter(products::id.eq(item.product_id))
            .first::<Product>(&mut conn)
            .await
            .optional()
        {
            Ok(Some(product)) => product,
            Ok(None) => {
                release_all(&state, &reserved).await;
                return Err(Error::NotFound("product").into());
            }
            Err(e) => {
                release_all(&state, &reserved).await;
                return Err(e.into());
            }
        };

        let key = idempotency_key
            .as_ref()
            .map(|k| format!("{k}:{}", product.id));
        match state
            .engine
            .reserve(product.inventory_unit_id, user.id, item.quantity, key.as_deref())
            .await
        {
            Ok(reservation) => reserved.push((product, reservation)),
            Err(e) => {
                release_all(&state, &reserved).await;
                return Err(e.into());
            }
        }
    }

    // a retried request maps onto the order its reservations already belong to
    if let Some((_, first)) = reserved.as_slice().first() {
        let existing_item = order_items::table
            .filter(order_items::reservation_id.eq(first.id))
            .first::<OrderItem>(&mut conn)
            .await
            .optional()?;
        if let Some(existing_item) = existing_item {
            let order = orders::table
                .filter(orders::id.eq(existing_item.order_id))
                .first::<Order>(&mut conn)
                .await?;
            let items = order_items::table
                .filter(order_items::order_id.eq(order.id))
                .load::<OrderItem>(&mut conn)
                .await?;
            return Ok((StatusCode::OK, Json(OrderResponse::from_parts(order, items))));
        }
    }

    let total_price = reserved
        .iter()
        .map(|(product, reservation)| {
            product.price.clone() * BigDecimal::from(reservation.quantity)
        })
        .fold(BigDecimal::from(0), |acc, line| acc + line);

    let new_order = NewOrder {
        id: Uuid::new_v4(),
        buyer_id: user.id,
        total_price,
        status: STATUS_PENDING.to_string(),
    };
    let new_items: Vec<NewOrderItem> = reserved
        .iter()
        .map(|(product, reservation)| NewOrderItem {
            id: Uuid::new_v4(),
            order_id: new_order.id,
            product_id: product.id,
            reservation_id: reservation.id,
            quantity: reservation.quantity,
            unit_price: product.price.clone(),
        })
        .collect();

    let stored = conn
        .transaction::<_, DieselError, _>(|conn| {
            let new_order = new_order.clone();
            let new_items = new_items.clone();
            Box::pin(async move {
                let order = diesel::insert_into(orders::table)
                    .values(&new_order)
                    .get_result::<Order>(conn)
                    .await?;
                let items = diesel::insert_into(order_items::table)
                    .values(&new_items)
                    .get_results::<OrderItem>(conn)
                    .await?;
                Ok((order, items))
            })
        })
        .await;

    let (order, items) = match stored {
        Ok(parts) => parts,
        Err(e) => {
            release_all(&state, &reserved).await;
            return Err(ApiError(e.into()));
        }
    };

    info!(order = %order.id, items = items.len(), "Created order");
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_parts(order, items)),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let mut orders_query = orders::table.into_boxed();
    if user.role != Role::Admin {
        orders_query = orders_query.filter(orders::buyer_id.eq(user.id));
    }
    let rows = orders_query
        .order(orders::created_at.desc())
        .load::<Order>(&mut conn)
        .await?;

    let mut responses = Vec::with_capacity(rows.len());
    for order in rows {
        let items = order_items::table
            .filter(order_items::order_id.eq(order.id))
            .load::<OrderItem>(&mut conn)
            .await?;
        responses.push(OrderResponse::from_parts(order, items));
    }
    Ok(Json(responses))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let mut order_query = orders::table.filter(orders::id.eq(order_id)).into_boxed();
    if user.role != Role::Admin {
        order_query = order_query.filter(orders::buyer_id.eq(user.id));
    }
    let order = order_query
        .first::<Order>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("order"))?;

    let items = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .load::<OrderItem>(&mut conn)
        .await?;
    Ok(Json(OrderResponse::from_parts(order, items)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let mut order_query = orders::table.filter(orders::id.eq(order_id)).into_boxed();
    if user.role != Role::Admin {
        order_query = order_query.filter(orders::buyer_id.eq(user.id));
    }
    let order = order_query
        .first::<Order>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("order"))?;

    if order.status == STATUS_CANCELLED {
        return Err(Error::Conflict("order already cancelled".to_string()).into());
    }
    if order.status == STATUS_PAID {
        return Err(Error::Conflict("paid orders cannot be cancelled".to_string()).into());
    }

    let items = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .load::<OrderItem>(&mut conn)
        .await?;
    for item in &items {
        match state.engine.release(item.reservation_id).await {
            Ok(_) | Err(Error::AlreadyReleased) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let order = diesel::update(orders::table.filter(orders::id.eq(order.id)))
        .set((
            orders::status.eq(STATUS_CANCELLED),
            orders::updated_at.eq(Utc::now()),
        ))
        .get_result::<Order>(&mut conn)
        .await?;

    info!(order = %order.id, "Cancelled order");
    Ok(Json(OrderResponse::from_parts(order, items)))
}
