pub mod auth;
pub mod bookings;
pub mod buses;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod routes;
pub mod schedules;
pub mod shops;
pub mod users;

use crate::models::User;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::Error;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            phone: user.phone,
            is_verified: user.is_verified,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Duplicate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Conflict(_)
            | Error::InsufficientCapacity { .. }
            | Error::AlreadyReleased
            | Error::AlreadyFinalized
            | Error::Contention => StatusCode::CONFLICT,
            Error::ProviderUnavailable(_)
            | Error::ProviderRejected(_)
            | Error::ProviderTimeout => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify/request", post(auth::request_email_verification))
        .route("/auth/verify/confirm", post(auth::confirm_email))
        .route("/auth/password-reset/request", post(auth::request_password_reset))
        .route("/auth/password-reset/confirm", post(auth::reset_password))
        .route("/profile", get(users::profile).put(users::update_profile))
        .route("/users", get(users::list_users))
        .route("/users/:user_id/deactivate", put(users::deactivate_user))
        .route("/operators", get(buses::list_operators).post(buses::create_operator))
        .route("/buses", get(buses::list_buses).post(buses::create_bus))
        .route(
            "/buses/:bus_id",
            get(buses::get_bus).put(buses::update_bus).delete(buses::delete_bus),
        )
        .route("/routes", get(routes::list_routes).post(routes::create_route))
        .route(
            "/routes/:route_id",
            get(routes::get_route)
                .put(routes::update_route)
                .delete(routes::delete_route),
        )
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route("/schedules/:schedule_id", get(schedules::get_schedule))
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/bookings/:booking_id",
            get(bookings::get_booking).delete(bookings::cancel_booking),
        )
        .route("/shops", get(shops::list_shops).post(shops::create_shop))
        .route("/shops/:shop_id", get(shops::get_shop))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:product_id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:order_id", get(orders::get_order))
        .route("/orders/:order_id/cancel", put(orders::cancel_order))
        .route(
            "/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/comments",
            get(reviews::list_comments).post(reviews::create_comment),
        )
        .route("/payments/stk-push", post(payments::stk_push))
        .route("/payments/callback", post(payments::provider_callback))
        .route(
            "/payments/:transaction_id/status",
            get(payments::payment_status),
        )
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: Error) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn errors_map_to_documented_status_codes() {
        assert_eq!(status_of(Error::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(Error::InvalidQuantity(0)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(Error::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(Error::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(Error::NotFound("booking")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::Duplicate("username or email")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(Error::InsufficientCapacity {
                requested: 3,
                available: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(Error::Contention), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::AlreadyFinalized), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::ProviderTimeout), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(Error::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
