use crate::api::{ApiError, UserResponse};
use crate::auth::CurrentUser;
use crate::models::User;
use crate::schema::users;
use crate::state::AppState;
use axum::extract::{Path, State};
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
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub phone: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::users)]
struct ProfileChanges {
    username: Option<String>,
    phone: Option<String>,
    updated_at: chrono::DateTime<Utc>,
}

pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = users::table
        .filter(users::id.eq(user.id))
        .first::<User>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("user"))?;
    Ok(Json(row.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(username) = &request.username {
        if username.trim().is_empty() {
            return Err(Error::validation("username cannot be empty").into());
        }
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::update(users::table.filter(users::id.eq(user.id)))
        .set(&ProfileChanges {
            username: request.username.map(|u| u.trim().to_string()),
            phone: request.phone,
            updated_at: Utc::now(),
        })
        .get_result::<User>(&mut conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::Duplicate("username")
            }
            other => other.into(),
        })?;
    Ok(Json(row.into()))
}

pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    user.require(Role::Admin)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let rows = users::table
        .order(users::created_at.desc())
        .load::<User>(&mut conn)
        .await?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::update(users::table.filter(users::id.eq(user_id)))
        .set((users::is_active.eq(false), users::updated_at.eq(Utc::now())))
        .get_result::<User>(&mut conn)
        .await
        .optional()?
        .ok_or(Error::NotFound("user"))?;

    info!(user = %row.id, "Deactivated user");
    Ok(Json(row.into()))
}
