use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    recipes::repo as recipes_repo,
    reviews::{
        dto::{ReviewList, ReviewRequest, ReviewView},
        repo,
        services::{load, normalize_comment, save, validate_rating},
    },
    state::AppState,
};

pub fn review_routes() -> Router<AppState> {
    Router::new().route(
        "/recipes/:id/reviews",
        post(upsert_review).get(list_reviews).delete(delete_review),
    )
}

/// POST /recipes/:id/reviews { rating, comment? }
#[instrument(skip(state, body))]
pub async fn upsert_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(recipe_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewView>), AppError> {
    let rating = validate_rating(body.rating).map_err(|e| {
        warn!(%recipe_id, rating = ?body.rating, "rating out of range");
        e
    })?;
    let comment = normalize_comment(body.comment);

    if !recipes_repo::exists(&state.db, recipe_id).await? {
        return Err(AppError::NotFound("Recipe"));
    }

    let (review, inserted) =
        save(&state.db, recipe_id, user_id, rating, comment.as_deref()).await?;

    info!(%recipe_id, %user_id, rating, inserted, "review saved");
    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(review.into())))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<ReviewList>, AppError> {
    if !recipes_repo::exists(&state.db, recipe_id).await? {
        return Err(AppError::NotFound("Recipe"));
    }
    let (reviews, review_count, avg_rating) = load(&state.db, recipe_id).await?;
    Ok(Json(ReviewList {
        recipe_id,
        review_count,
        avg_rating,
        reviews,
    }))
}

#[instrument(skip(state))]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repo::delete_mine(&state.db, recipe_id, user_id).await? {
        return Err(AppError::NotFound("Review"));
    }
    info!(%recipe_id, %user_id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}
