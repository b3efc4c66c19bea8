use tracing::info;

use crate::{
    auth::{password::hash_password, repo_types::User},
    catalog::repo as catalog_repo,
    recipes::{
        dto::IngredientLine,
        repo as recipes_repo,
        services::{self as recipe_services, RecipeDraft},
    },
    reviews::repo as reviews_repo,
    state::AppState,
};

const DEMO_USER: &str = "sam";
const DEMO_RECIPE: &str = "French toast";

fn demo_recipe() -> RecipeDraft {
    RecipeDraft {
        name: DEMO_RECIPE.into(),
        description: Some("Breakfast classic".into()),
        cook_time_min: 10,
        category: "Main dish".into(),
        image_url: None,
        steps: vec!["Beat the eggs".into(), "Dip both sides of the bread".into()],
        ingredients: vec![
            IngredientLine { name: "Egg".into(), quantity: 2.0, unit: "pcs".into() },
            IngredientLine { name: "Milk".into(), quantity: 50.0, unit: "ml".into() },
        ],
    }
}

/// Inserts the demo user, allergens, recipe and review. Safe to run twice.
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    let db = &state.db;

    let user = match User::find_by_username(db, DEMO_USER).await? {
        Some(u) => u,
        None => User::create(db, DEMO_USER, "sam@example.com", &hash_password("secret")?).await?,
    };

    let mut tx = db.begin().await?;
    let mut allergens = Vec::new();
    for name in ["Egg", "Milk"] {
        allergens.push(catalog_repo::find_or_create_ingredient_tx(&mut tx, name).await?);
    }
    tx.commit().await?;
    for ingredient in &allergens {
        catalog_repo::set_allergen(db, ingredient.id, true).await?;
    }

    if recipes_repo::find_id_by_name(db, DEMO_RECIPE).await?.is_none() {
        let recipe_id = recipe_services::create(db, user.id, &demo_recipe())
            .await
            .map_err(|e| anyhow::anyhow!("seed recipe: {e}"))?;
        reviews_repo::upsert(db, recipe_id, user.id, 5, Some("So good!")).await?;
    }

    info!(user_id = %user.id, "demo data seeded");
    Ok(())
}
