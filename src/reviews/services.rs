use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{is_foreign_key_violation, AppError},
    reviews::{dto::ReviewView, repo, repo_types::ReviewRow},
};

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

pub fn validate_rating(rating: Option<i64>) -> Result<i32, AppError> {
    match rating {
        Some(r) if (RATING_MIN..=RATING_MAX).contains(&r) => Ok(r as i32),
        _ => Err(AppError::BadRequest(format!(
            "Rating must be between {RATING_MIN} and {RATING_MAX}"
        ))),
    }
}

/// Trimmed comment; blank comments are stored as none.
pub fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Mean rating as displayed: two decimals, 0.0 without reviews.
pub fn display_rating(avg: f64) -> f64 {
    if avg.is_finite() {
        (avg * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Upserts the caller's review. A recipe or user removed since the caller
/// was checked surfaces as a foreign key violation and reads as 404.
pub async fn save(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    rating: i32,
    comment: Option<&str>,
) -> Result<(ReviewRow, bool), AppError> {
    repo::upsert(db, recipe_id, user_id, rating, comment)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Recipe")
            } else {
                AppError::Internal(e)
            }
        })
}

/// Reviews of a recipe with their count and displayed average.
pub async fn load(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<(Vec<ReviewView>, i64, f64)> {
    let reviews = repo::list_for_recipe(db, recipe_id)
        .await?
        .into_iter()
        .map(ReviewView::from)
        .collect();
    let stats = repo::stats(db, recipe_id).await?;
    Ok((reviews, stats.review_count, display_rating(stats.avg_rating)))
}
