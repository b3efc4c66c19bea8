use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub step: String,
}

/// Need row joined with its ingredient.
#[derive(Debug, Clone, FromRow)]
pub struct NeedRow {
    pub ingredient_id: Uuid,
    pub name: String,
    pub is_allergen: bool,
    pub quantity: f64,
    pub unit: String,
}
