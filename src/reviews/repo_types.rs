use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Review joined with the reviewer's username.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Count and raw mean of a recipe's ratings.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct RatingStats {
    pub review_count: i64,
    pub avg_rating: f64,
}
