use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::dto::RecipeSummary;
use crate::reviews::dto::ReviewView;

/// One ingredient of a recipe with its amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// Body of create and update, and the shape returned for the edit form.
///
/// Steps and ingredients may be given as lists, as text (one step per line,
/// one `name,quantity,unit` per line), or both; lists come first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cook_time_min: Option<i64>,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default)]
    pub steps_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<IngredientLine>,
    #[serde(default)]
    pub ingredients_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NeedView {
    pub ingredient_id: Uuid,
    pub name: String,
    pub is_allergen: bool,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: RecipeSummary,
    pub steps: Vec<String>,
    pub ingredients: Vec<NeedView>,
    pub reviews: Vec<ReviewView>,
    pub review_count: i64,
    pub avg_rating: f64,
    pub is_owner: bool,
}
