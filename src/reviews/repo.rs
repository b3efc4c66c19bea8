use anyhow::Context;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::reviews::repo_types::{RatingStats, ReviewRow};

#[derive(Debug, FromRow)]
struct SavedReview {
    #[sqlx(flatten)]
    review: ReviewRow,
    inserted: bool,
}

/// Inserts the caller's review of a recipe or replaces it. The flag is true
/// when a new row was created.
pub async fn upsert(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    rating: i32,
    comment: Option<&str>,
) -> anyhow::Result<(ReviewRow, bool)> {
    let saved = sqlx::query_as::<_, SavedReview>(
        r#"
        WITH saved AS (
            INSERT INTO reviews (recipe_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (recipe_id, user_id) DO UPDATE
               SET rating = EXCLUDED.rating,
                   comment = EXCLUDED.comment,
                   updated_at = now()
            RETURNING id, recipe_id, user_id, rating, comment, created_at, updated_at,
                      (xmax = 0) AS inserted
        )
        SELECT s.id, s.recipe_id, s.user_id, u.username, s.rating, s.comment,
               s.created_at, s.updated_at, s.inserted
          FROM saved s
          JOIN users u ON u.id = s.user_id
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(rating)
    .bind(comment)
    .fetch_one(db)
    .await
    .context("upsert review")?;

    Ok((saved.review, saved.inserted))
}

/// Reviews of a recipe, best rated first.
pub async fn list_for_recipe(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<ReviewRow>> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        r#"
        SELECT rv.id, rv.recipe_id, rv.user_id, u.username, rv.rating, rv.comment,
               rv.created_at, rv.updated_at
          FROM reviews rv
          JOIN users u ON u.id = rv.user_id
         WHERE rv.recipe_id = $1
         ORDER BY rv.rating DESC, rv.updated_at DESC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list reviews")?;
    Ok(rows)
}

pub async fn stats(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<RatingStats> {
    let stats = sqlx::query_as::<_, RatingStats>(
        r#"
        SELECT COUNT(*) AS review_count,
               COALESCE(AVG(rating), 0)::float8 AS avg_rating
          FROM reviews
         WHERE recipe_id = $1
        "#,
    )
    .bind(recipe_id)
    .fetch_one(db)
    .await
    .context("review stats")?;
    Ok(stats)
}

pub async fn delete_mine(db: &PgPool, recipe_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM reviews WHERE recipe_id = $1 AND user_id = $2")
        .bind(recipe_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete review")?;
    Ok(res.rows_affected() > 0)
}
