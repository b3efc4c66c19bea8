use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::catalog::{repo::RECIPE_ROW_SELECT, repo_types::RecipeRow};
use crate::recipes::repo_types::{NeedRow, StepRow};
use crate::recipes::services::RecipeDraft;

// ---- Writes (inside a transaction) ----

pub async fn insert_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    category_id: Uuid,
    draft: &RecipeDraft,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO recipes (name, description, cook_time_min, image_url, user_id, category_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&draft.name)
    .bind(draft.description.as_deref())
    .bind(draft.cook_time_min)
    .bind(draft.image_url.as_deref())
    .bind(owner_id)
    .bind(category_id)
    .fetch_one(&mut **tx)
    .await
    .context("insert recipe")?;
    Ok(id)
}

/// Overwrites the scalar fields; false when the recipe is gone.
pub async fn update_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    category_id: Uuid,
    draft: &RecipeDraft,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE recipes
           SET name = $2,
               description = $3,
               cook_time_min = $4,
               image_url = $5,
               category_id = $6
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&draft.name)
    .bind(draft.description.as_deref())
    .bind(draft.cook_time_min)
    .bind(draft.image_url.as_deref())
    .bind(category_id)
    .execute(&mut **tx)
    .await
    .context("update recipe")?;
    Ok(res.rows_affected() > 0)
}

/// Drops every step and need of a recipe before they are rebuilt.
pub async fn clear_children_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM cook_instructions WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete steps")?;
    sqlx::query("DELETE FROM needs WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete needs")?;
    Ok(())
}

pub async fn insert_step_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    position: i32,
    step: &str,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO cook_instructions (recipe_id, position, step) VALUES ($1, $2, $3)")
        .bind(recipe_id)
        .bind(position)
        .bind(step)
        .execute(&mut **tx)
        .await
        .context("insert step")?;
    Ok(())
}

pub async fn insert_need_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    ingredient_id: Uuid,
    position: i32,
    quantity: f64,
    unit: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO needs (recipe_id, ingredient_id, position, quantity, unit)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(recipe_id)
    .bind(ingredient_id)
    .bind(position)
    .bind(quantity)
    .bind(unit)
    .execute(&mut **tx)
    .await
    .context("insert need")?;
    Ok(())
}

/// Deletes the recipe; steps, needs and reviews cascade.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(res.rows_affected() > 0)
}

// ---- Queries ----

pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let (found,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
        .context("recipe exists")?;
    Ok(found)
}

pub async fn owner_of(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("recipe owner")?;
    Ok(row.map(|(owner,)| owner))
}

pub async fn find_row(db: &PgPool, id: Uuid) -> anyhow::Result<Option<RecipeRow>> {
    let sql = format!("{RECIPE_ROW_SELECT} WHERE r.id = $1");
    let row = sqlx::query_as::<_, RecipeRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find recipe")?;
    Ok(row)
}

pub async fn list_steps(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<StepRow>> {
    let rows = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT step
          FROM cook_instructions
         WHERE recipe_id = $1
         ORDER BY position ASC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list steps")?;
    Ok(rows)
}

pub async fn list_needs(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<NeedRow>> {
    let rows = sqlx::query_as::<_, NeedRow>(
        r#"
        SELECT n.ingredient_id, i.name, i.is_allergen, n.quantity, n.unit
          FROM needs n
          JOIN ingredients i ON i.id = n.ingredient_id
         WHERE n.recipe_id = $1
         ORDER BY n.position ASC, i.name ASC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list needs")?;
    Ok(rows)
}

pub async fn find_id_by_name(db: &PgPool, name: &str) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE name = $1")
        .bind(name)
        .fetch_optional(db)
        .await
        .context("find recipe by name")?;
    Ok(row.map(|(id,)| id))
}
