use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::models::{Comment, NewComment, NewReview, Review};
use crate::schema::{comments, reviews};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::Error;
use uuid::Uuid;

const COMMENT_ENTITY_TYPES: [&str; 4] = ["bus", "retail_shop", "product", "accommodation"];

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub bus_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub bus_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub entity_id: Uuid,
    pub entity_type: String,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub entity_id: Option<Uuid>,
    pub entity_type: Option<String>,
}

fn check_rating(rating: i32) -> Result<(), Error> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(Error::validation("rating must be between 1 and 5"))
    }
}

pub async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    check_rating(request.rating)?;
    let targets = [
        request.bus_id.is_some(),
        request.shop_id.is_some(),
        request.product_id.is_some(),
    ];
    if targets.iter().filter(|set| **set).count() != 1 {
        return Err(
            Error::validation("exactly one of bus_id, shop_id or product_id is required").into(),
        );
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(reviews::table)
        .values(&NewReview {
            id: Uuid::new_v4(),
            user_id: user.id,
            bus_id: request.bus_id,
            shop_id: request.shop_id,
            product_id: request.product_id,
            rating: request.rating,
            review: request.review,
        })
        .get_result::<Review>(&mut conn)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let mut reviews_query = reviews::table.into_boxed();
    if let Some(bus_id) = query.bus_id {
        reviews_query = reviews_query.filter(reviews::bus_id.eq(bus_id));
    }
    if let Some(shop_id) = query.shop_id {
        reviews_query = reviews_query.filter(reviews::shop_id.eq(shop_id));
    }
    if let Some(product_id) = query.product_id {
        reviews_query = reviews_query.filter(reviews::product_id.eq(product_id));
    }
    let rows = reviews_query
        .order(reviews::created_at.desc())
        .load::<Review>(&mut conn)
        .await?;
    Ok(Json(rows))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    check_rating(request.rating)?;
    if !COMMENT_ENTITY_TYPES.contains(&request.entity_type.as_str()) {
        return Err(Error::validation("unknown entity type").into());
    }

    let mut conn = state.pool.get().await.map_err(Error::internal)?;
    let row = diesel::insert_into(comments::table)
        .values(&NewComment {
            id: Uuid::new_v4(),
            user_id: user.id,
            entity_id: request.entity_id,
            entity_type: request.entity_type,
            rating: request.rating,
            comment: request.comment,
        })
        .get_result::<Comment>(&mut conn)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let mut conn = state.pool.get().await.map_err(Error::internal)?;

    let mut comments_query = comments::table.into_boxed();
    if let Some(entity_id) = query.entity_id {
        comments_query = comments_query.filter(comments::entity_id.eq(entity_id));
    }
    if let Some(entity_type) = query.entity_type {
        comments_query = comments_query.filter(comments::entity_type.eq(entity_type));
    }
    let rows = comments_query
        .order(comments::created_at.desc())
        .load::<Comment>(&mut conn)
        .await?;
    Ok(Json(rows))
}
