use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Category with the number of recipes filed under it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryCount {
    pub id: Uuid,
    pub name: String,
    pub recipe_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub is_allergen: bool,
}

/// Recipe joined with its author and category names.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cook_time_min: i32,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub user_id: Uuid,
    pub author: String,
    pub category_id: Uuid,
    pub category: String,
}
