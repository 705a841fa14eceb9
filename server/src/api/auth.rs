use crate::api::{ApiError, UserResponse};
use crate::auth::{self, CurrentUser};
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use shared::{Error, Role};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct IssuedTokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = Role::parse(&request.role).ok_or_else(|| Error::validation("unknown role"))?;
    if role == Role::Admin {
        return Err(Error::Forbidden.into());
    }
    if request.username.trim().is_empty() {
        return Err(Error::validation("username is required").into());
    }
    if request.password.len() < 8 {
        return Err(Error::validation("password must be at least 8 characters").into());
    }
    if !request.email.contains('@') {
        return Err(Error::validation("invalid email address").into());
    }

    let password_hash = auth::hash_password(&request.password)?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: request.username.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        password_hash,
        role: role.as_str().to_string(),
        phone: request.phone,
    };

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result::<User>(&mut conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::Duplicate("username or email")
            }
            other => other.into(),
        })?;

    info!(user = %user.id, role = %user.role, "Registered user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let user = users::table
        .filter(users::email.eq(request.email.trim().to_lowercase()))
        .first::<User>(&mut conn)
        .await
        .optional()?;

    let Some(user) = user else {
        return Err(Error::Unauthenticated.into());
    };
    if !auth::verify_password(&user.password_hash, &request.password) {
        return Err(Error::Unauthenticated.into());
    }
    if !user.is_active {
        return Err(Error::Forbidden.into());
    }

    let role = Role::parse(&user.role).ok_or_else(|| Error::internal("unknown stored role"))?;
    let access_token = auth::issue_token(
        &state.jwt,
        user.id,
        role,
        auth::PURPOSE_ACCESS,
        Duration::hours(24),
    )?;

    Ok(Json(TokenResponse {
        access_token,
        user: user.into(),
    }))
}

pub async fn request_email_verification(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<IssuedTokenResponse>, ApiError> {
    let token = auth::issue_token(
        &state.jwt,
        user.id,
        user.role,
        auth::PURPOSE_VERIFY_EMAIL,
        Duration::hours(24),
    )?;
    // delivery happens out of band; the token is surfaced for the mailer
    info!(user = %user.id, "Issued email verification token");
    Ok(Json(IssuedTokenResponse { token }))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<Json<UserResponse>, ApiError> {
    let claims = auth::decode_token(&state.jwt, &body.token, auth::PURPOSE_VERIFY_EMAIL)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let user = diesel::update(users::table.filter(users::id.eq(claims.sub)))
        .set((users::is_verified.eq(true), users::updated_at.eq(Utc::now())))
        .get_result::<User>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("user"))?;

    info!(user = %user.id, "Email verified");
    Ok(Json(user.into()))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<Json<IssuedTokenResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let user = users::table
        .filter(users::email.eq(body.email.trim().to_lowercase()))
        .first::<User>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("user"))?;

    let role = Role::parse(&user.role).ok_or_else(|| Error::internal("unknown stored role"))?;
    let token = auth::issue_token(
        &state.jwt,
        user.id,
        role,
        auth::PURPOSE_RESET_PASSWORD,
        Duration::minutes(15),
    )?;
    info!(user = %user.id, "Issued password reset token");
    Ok(Json(IssuedTokenResponse { token }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let claims = auth::decode_token(&state.jwt, &request.token, auth::PURPOSE_RESET_PASSWORD)?;
    if request.new_password.len() < 8 {
        return Err(Error::validation("password must be at least 8 characters").into());
    }

    let password_hash = auth::hash_password(&request.new_password)?;
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let user = diesel::update(users::table.filter(users::id.eq(claims.sub)))
        .set((
            users::password_hash.eq(password_hash),
            users::updated_at.eq(Utc::now()),
        ))
        .get_result::<User>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("user"))?;

    info!(user = %user.id, "Password reset");
    Ok(Json(user.into()))
}
