use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::catalog::dto::SearchFilter;
use crate::catalog::repo_types::{Category, CategoryCount, Ingredient, RecipeRow};

pub(crate) const RECIPE_ROW_SELECT: &str = r#"
    SELECT r.id, r.name, r.description, r.cook_time_min, r.image_url, r.created_at,
           r.user_id, u.username AS author, r.category_id, c.name AS category
      FROM recipes r
      JOIN users u ON u.id = r.user_id
      JOIN categories c ON c.id = r.category_id
"#;

/// Escapes `LIKE` wildcards so the keyword matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Builds the listing query. A recipe passes the allergen filter only when
/// none of its needs reference that ingredient.
pub fn search_query(filter: &SearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(RECIPE_ROW_SELECT);
    qb.push(" WHERE TRUE");

    if let Some(q) = &filter.q {
        let like = format!("%{}%", escape_like(q));
        qb.push(" AND (r.name ILIKE ")
            .push_bind(like.clone())
            .push(" OR r.description ILIKE ")
            .push_bind(like)
            .push(")");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND r.category_id = ").push_bind(category_id);
    }
    if let Some(allergen_id) = filter.allergen_id {
        qb.push(" AND NOT EXISTS (SELECT 1 FROM needs n WHERE n.recipe_id = r.id AND n.ingredient_id = ")
            .push_bind(allergen_id)
            .push(")");
    }

    qb.push(" ORDER BY r.created_at DESC, r.name ASC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
    qb
}

pub async fn search(db: &PgPool, filter: &SearchFilter) -> anyhow::Result<Vec<RecipeRow>> {
    let rows = search_query(filter)
        .build_query_as::<RecipeRow>()
        .fetch_all(db)
        .await
        .context("search recipes")?;
    Ok(rows)
}

pub async fn recent(db: &PgPool, limit: i64) -> anyhow::Result<Vec<RecipeRow>> {
    let sql = format!("{RECIPE_ROW_SELECT} ORDER BY r.created_at DESC LIMIT $1");
    let rows = sqlx::query_as::<_, RecipeRow>(&sql)
        .bind(limit)
        .fetch_all(db)
        .await
        .context("recent recipes")?;
    Ok(rows)
}

pub async fn category_counts(db: &PgPool) -> anyhow::Result<Vec<CategoryCount>> {
    let rows = sqlx::query_as::<_, CategoryCount>(
        r#"
        SELECT c.id, c.name, COUNT(r.id) AS recipe_count
          FROM categories c
          LEFT JOIN recipes r ON r.category_id = c.id
         GROUP BY c.id, c.name
         ORDER BY c.name ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list categories")?;
    Ok(rows)
}

pub async fn find_category(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find category")?;
    Ok(row)
}

pub async fn allergens(db: &PgPool) -> anyhow::Result<Vec<Ingredient>> {
    let rows = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, is_allergen
          FROM ingredients
         WHERE is_allergen
         ORDER BY name ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list allergens")?;
    Ok(rows)
}

pub async fn ingredients(db: &PgPool) -> anyhow::Result<Vec<Ingredient>> {
    let rows = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, is_allergen FROM ingredients ORDER BY name ASC",
    )
    .fetch_all(db)
    .await
    .context("list ingredients")?;
    Ok(rows)
}

pub async fn set_allergen(
    db: &PgPool,
    id: Uuid,
    is_allergen: bool,
) -> anyhow::Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        r#"
        UPDATE ingredients
           SET is_allergen = $2
         WHERE id = $1
        RETURNING id, name, is_allergen
        "#,
    )
    .bind(id)
    .bind(is_allergen)
    .fetch_optional(db)
    .await
    .context("flag ingredient")?;
    Ok(row)
}

// ---- Lookups used while saving a recipe ----

/// Category with this name, compared case-insensitively; created when missing.
pub async fn find_or_create_category_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> anyhow::Result<Category> {
    sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(name)
        .execute(&mut **tx)
        .await
        .context("insert category")?;

    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name FROM categories WHERE lower(name) = lower($1)",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
    .context("select category")?;
    Ok(category)
}

/// Ingredient with this name, compared case-insensitively; created as a
/// non-allergen when missing.
pub async fn find_or_create_ingredient_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> anyhow::Result<Ingredient> {
    sqlx::query("INSERT INTO ingredients (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(name)
        .execute(&mut **tx)
        .await
        .context("insert ingredient")?;

    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, is_allergen FROM ingredients WHERE lower(name) = lower($1)",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
    .context("select ingredient")?;
    Ok(ingredient)
}
