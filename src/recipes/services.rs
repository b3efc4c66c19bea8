use std::collections::HashSet;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::services::ensure_owner,
    catalog::{dto::RecipeSummary, repo as catalog_repo, repo_types::RecipeRow},
    error::{is_unique_violation, AppError},
    recipes::{
        dto::{IngredientLine, NeedView, RecipeDetail, RecipeForm},
        repo,
        repo_types::{NeedRow, StepRow},
    },
    reviews::services as reviews,
};

pub const NAME_MAX: usize = 120;
pub const CATEGORY_MAX: usize = 80;
pub const IMAGE_URL_MAX: usize = 255;
pub const INGREDIENT_MAX: usize = 120;
pub const UNIT_MAX: usize = 32;

/// A validated recipe form, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub cook_time_min: i32,
    pub category: String,
    pub image_url: Option<String>,
    pub steps: Vec<String>,
    pub ingredients: Vec<IngredientLine>,
}

/// One step per non-blank line.
pub fn parse_steps(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One `name,quantity,unit` per line. Lines with fewer than three parts are
/// skipped and an unreadable quantity counts as zero.
pub fn parse_ingredient_lines(text: &str) -> Vec<IngredientLine> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 3 {
                return None;
            }
            let quantity = parts[1]
                .parse::<f64>()
                .ok()
                .filter(|q| q.is_finite())
                .unwrap_or(0.0);
            Some(IngredientLine {
                name: parts[0].to_string(),
                quantity,
                unit: parts[2].to_string(),
            })
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn too_long(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

fn has_line_break(value: &str) -> bool {
    value.contains(|c: char| c == '\n' || c == '\r')
}

/// Characters that would split a value when the recipe is written back as
/// `name,quantity,unit` lines.
fn breaks_ingredient_line(value: &str) -> bool {
    value.contains(',') || has_line_break(value)
}

impl TryFrom<RecipeForm> for RecipeDraft {
    type Error = AppError;

    fn try_from(form: RecipeForm) -> Result<Self, Self::Error> {
        let name = form.name.trim().to_string();
        if name.is_empty() || too_long(&name, NAME_MAX) {
            return Err(AppError::BadRequest(format!(
                "Recipe name must be 1 to {NAME_MAX} characters"
            )));
        }

        let category = form.category.trim().to_string();
        if category.is_empty() || too_long(&category, CATEGORY_MAX) {
            return Err(AppError::BadRequest(format!(
                "Category must be 1 to {CATEGORY_MAX} characters"
            )));
        }

        let cook_time_min = match form.cook_time_min {
            Some(t) if (0..=i32::MAX as i64).contains(&t) => t as i32,
            Some(_) => {
                return Err(AppError::BadRequest(
                    "Cook time must be a non-negative number of minutes".into(),
                ))
            }
            None => return Err(AppError::BadRequest("Cook time is required".into())),
        };

        let image_url = non_blank(form.image_url);
        if image_url.as_deref().is_some_and(|u| too_long(u, IMAGE_URL_MAX)) {
            return Err(AppError::BadRequest(format!(
                "Image URL must be at most {IMAGE_URL_MAX} characters"
            )));
        }

        let mut steps: Vec<String> = form
            .steps
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(text) = &form.steps_text {
            steps.extend(parse_steps(text));
        }
        if steps.iter().any(|s| has_line_break(s)) {
            return Err(AppError::BadRequest(
                "A step may not contain line breaks".into(),
            ));
        }

        let mut ingredients = form.ingredients;
        if let Some(text) = &form.ingredients_text {
            ingredients.extend(parse_ingredient_lines(text));
        }

        let mut seen = HashSet::new();
        for line in ingredients.iter_mut() {
            line.name = line.name.trim().to_string();
            line.unit = line.unit.trim().to_string();
            if line.name.is_empty() || too_long(&line.name, INGREDIENT_MAX) {
                return Err(AppError::BadRequest(format!(
                    "Ingredient name must be 1 to {INGREDIENT_MAX} characters"
                )));
            }
            if line.unit.is_empty() || too_long(&line.unit, UNIT_MAX) {
                return Err(AppError::BadRequest(format!(
                    "Unit of {} must be 1 to {UNIT_MAX} characters",
                    line.name
                )));
            }
            if breaks_ingredient_line(&line.name) || breaks_ingredient_line(&line.unit) {
                return Err(AppError::BadRequest(format!(
                    "Ingredient {} may not contain commas or line breaks in its name or unit",
                    line.name.escape_debug()
                )));
            }
            if !line.quantity.is_finite() || line.quantity < 0.0 {
                return Err(AppError::BadRequest(format!(
                    "Quantity of {} must be a non-negative number",
                    line.name
                )));
            }
            if !seen.insert(line.name.to_lowercase()) {
                return Err(AppError::BadRequest(format!(
                    "duplicate ingredient: {}",
                    line.name
                )));
            }
        }

        Ok(Self {
            name,
            description: non_blank(form.description),
            cook_time_min,
            category,
            image_url,
            steps,
            ingredients,
        })
    }
}

/// The stored recipe written back as an editable form.
pub fn render_form(row: RecipeRow, steps: Vec<StepRow>, needs: Vec<NeedRow>) -> RecipeForm {
    let steps_text = steps
        .into_iter()
        .map(|s| s.step)
        .collect::<Vec<_>>()
        .join("\n");
    let ingredients_text = needs
        .into_iter()
        .map(|n| format!("{},{},{}", n.name, n.quantity, n.unit))
        .collect::<Vec<_>>()
        .join("\n");
    RecipeForm {
        name: row.name,
        description: row.description,
        cook_time_min: Some(row.cook_time_min as i64),
        category: row.category,
        image_url: Some(row.image_url.unwrap_or_default()),
        steps: Vec::new(),
        steps_text: Some(steps_text),
        ingredients: Vec::new(),
        ingredients_text: Some(ingredients_text),
    }
}

fn conflict_or_internal(e: anyhow::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Recipe name already exists".into())
    } else {
        AppError::Internal(e)
    }
}

async fn write_children(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    draft: &RecipeDraft,
) -> anyhow::Result<()> {
    for (position, step) in draft.steps.iter().enumerate() {
        repo::insert_step_tx(tx, recipe_id, position as i32, step).await?;
    }
    for (position, line) in draft.ingredients.iter().enumerate() {
        let ingredient = catalog_repo::find_or_create_ingredient_tx(tx, &line.name).await?;
        repo::insert_need_tx(
            tx,
            recipe_id,
            ingredient.id,
            position as i32,
            line.quantity,
            &line.unit,
        )
        .await?;
    }
    Ok(())
}

/// Inserts the recipe with its steps and needs in one transaction.
pub async fn create(db: &PgPool, owner_id: Uuid, draft: &RecipeDraft) -> Result<Uuid, AppError> {
    let mut tx = db.begin().await.map_err(anyhow::Error::from)?;

    let category = catalog_repo::find_or_create_category_tx(&mut tx, &draft.category).await?;
    let recipe_id = repo::insert_recipe_tx(&mut tx, owner_id, category.id, draft)
        .await
        .map_err(conflict_or_internal)?;
    write_children(&mut tx, recipe_id, draft).await?;

    tx.commit().await.map_err(anyhow::Error::from)?;
    info!(%recipe_id, %owner_id, name = %draft.name, "recipe created");
    Ok(recipe_id)
}

/// Rewrites the recipe: scalar fields in place, children deleted and rebuilt.
pub async fn update(db: &PgPool, recipe_id: Uuid, draft: &RecipeDraft) -> Result<(), AppError> {
    let mut tx = db.begin().await.map_err(anyhow::Error::from)?;

    let category = catalog_repo::find_or_create_category_tx(&mut tx, &draft.category).await?;
    let found = repo::update_recipe_tx(&mut tx, recipe_id, category.id, draft)
        .await
        .map_err(conflict_or_internal)?;
    if !found {
        return Err(AppError::NotFound("Recipe"));
    }
    repo::clear_children_tx(&mut tx, recipe_id).await?;
    write_children(&mut tx, recipe_id, draft).await?;

    tx.commit().await.map_err(anyhow::Error::from)?;
    info!(%recipe_id, name = %draft.name, "recipe updated");
    Ok(())
}

/// Fails with 404 for a missing recipe and 403 for someone else's.
pub async fn authorize_owner(db: &PgPool, recipe_id: Uuid, caller: Uuid) -> Result<(), AppError> {
    let owner = repo::owner_of(db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    ensure_owner(owner, caller).map_err(|e| {
        warn!(%recipe_id, %caller, "not the recipe owner");
        e
    })
}

pub async fn load_detail(
    db: &PgPool,
    recipe_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<RecipeDetail, AppError> {
    let row = repo::find_row(db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    let steps = repo::list_steps(db, recipe_id).await?;
    let needs = repo::list_needs(db, recipe_id).await?;
    let (reviews, review_count, avg_rating) = reviews::load(db, recipe_id).await?;

    let is_owner = viewer == Some(row.user_id);
    Ok(RecipeDetail {
        recipe: RecipeSummary::from(row),
        steps: steps.into_iter().map(|s| s.step).collect(),
        ingredients: needs
            .into_iter()
            .map(|n| NeedView {
                ingredient_id: n.ingredient_id,
                name: n.name,
                is_allergen: n.is_allergen,
                quantity: n.quantity,
                unit: n.unit,
            })
            .collect(),
        reviews,
        review_count,
        avg_rating,
        is_owner,
    })
}

pub async fn load_form(db: &PgPool, recipe_id: Uuid) -> Result<RecipeForm, AppError> {
    let row = repo::find_row(db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    let steps = repo::list_steps(db, recipe_id).await?;
    let needs = repo::list_needs(db, recipe_id).await?;
    Ok(render_form(row, steps, needs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo_types::User, reviews::repo as review_repo};
    use time::OffsetDateTime;

    fn form() -> RecipeForm {
        RecipeForm {
            name: "  French toast ".into(),
            description: Some("Breakfast classic".into()),
            cook_time_min: Some(10),
            category: " Main dish ".into(),
            ..Default::default()
        }
    }

    fn bad_request(form: RecipeForm) -> String {
        match RecipeDraft::try_from(form) {
            Err(AppError::BadRequest(msg)) => msg,
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn steps_skip_blank_lines() {
        assert_eq!(
            parse_steps("  beat the eggs \n\n   \r\ndip the bread\n"),
            vec!["beat the eggs", "dip the bread"]
        );
        assert!(parse_steps("").is_empty());
    }

    #[test]
    fn ingredient_lines_follow_name_quantity_unit() {
        let lines = parse_ingredient_lines("Egg, 2, pcs\n\nMilk,50,ml\nSalt\nSugar,a pinch,g");
        assert_eq!(
            lines,
            vec![
                IngredientLine { name: "Egg".into(), quantity: 2.0, unit: "pcs".into() },
                IngredientLine { name: "Milk".into(), quantity: 50.0, unit: "ml".into() },
                IngredientLine { name: "Sugar".into(), quantity: 0.0, unit: "g".into() },
            ]
        );
    }

    #[test]
    fn non_finite_quantity_text_counts_as_zero() {
        let lines = parse_ingredient_lines("Egg,NaN,pcs\nMilk,inf,ml");
        assert!(lines.iter().all(|l| l.quantity == 0.0));
    }

    #[test]
    fn draft_merges_lists_and_text() {
        let draft = RecipeDraft::try_from(RecipeForm {
            steps: vec!["beat the eggs".into(), "   ".into()],
            steps_text: Some("dip the bread\nfry".into()),
            ingredients: vec![IngredientLine {
                name: " Egg ".into(),
                quantity: 2.0,
                unit: " pcs ".into(),
            }],
            ingredients_text: Some("Milk,50,ml".into()),
            image_url: Some("   ".into()),
            ..form()
        })
        .expect("valid draft");

        assert_eq!(draft.name, "French toast");
        assert_eq!(draft.category, "Main dish");
        assert_eq!(draft.image_url, None);
        assert_eq!(draft.steps, vec!["beat the eggs", "dip the bread", "fry"]);
        assert_eq!(draft.ingredients[0].name, "Egg");
        assert_eq!(draft.ingredients[0].unit, "pcs");
        assert_eq!(draft.ingredients[1].name, "Milk");
    }

    #[test]
    fn required_fields() {
        assert!(bad_request(RecipeForm { name: "  ".into(), ..form() }).contains("name"));
        assert!(bad_request(RecipeForm { category: "".into(), ..form() }).contains("Category"));
        assert!(bad_request(RecipeForm { cook_time_min: None, ..form() }).contains("required"));
        assert!(bad_request(RecipeForm { cook_time_min: Some(-1), ..form() }).contains("Cook time"));
    }

    #[test]
    fn length_limits() {
        bad_request(RecipeForm { name: "x".repeat(NAME_MAX + 1), ..form() });
        bad_request(RecipeForm { category: "x".repeat(CATEGORY_MAX + 1), ..form() });
        bad_request(RecipeForm { image_url: Some("x".repeat(IMAGE_URL_MAX + 1)), ..form() });
        bad_request(RecipeForm {
            ingredients_text: Some(format!("Egg,1,{}", "u".repeat(UNIT_MAX + 1))),
            ..form()
        });
        assert!(RecipeDraft::try_from(RecipeForm { name: "x".repeat(NAME_MAX), ..form() }).is_ok());
    }

    #[test]
    fn same_ingredient_twice_is_rejected() {
        let msg = bad_request(RecipeForm {
            ingredients_text: Some("Egg,1,pcs\negg,2,pcs".into()),
            ..form()
        });
        assert!(msg.contains("duplicate ingredient"));
    }

    #[test]
    fn commas_and_line_breaks_are_rejected_in_list_entries() {
        let msg = bad_request(RecipeForm {
            ingredients: vec![IngredientLine {
                name: "Salt, coarse".into(),
                quantity: 2.0,
                unit: "g".into(),
            }],
            ..form()
        });
        assert!(msg.contains("commas"));
        bad_request(RecipeForm {
            ingredients: vec![IngredientLine { name: "Salt".into(), quantity: 2.0, unit: "g\nkg".into() }],
            ..form()
        });
        let msg = bad_request(RecipeForm { steps: vec!["boil\nthen stir".into()], ..form() });
        assert!(msg.contains("line breaks"));
    }

    #[test]
    fn accepted_form_survives_the_edit_form_unchanged() {
        let draft = RecipeDraft::try_from(RecipeForm {
            steps: vec!["boil; then stir".into(), "serve, hot".into()],
            ingredients: vec![
                IngredientLine { name: "Salt (coarse)".into(), quantity: 2.5, unit: "g".into() },
                IngredientLine { name: "Water".into(), quantity: 0.1, unit: "l".into() },
            ],
            ..form()
        })
        .expect("valid draft");

        let row = RecipeRow {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            cook_time_min: draft.cook_time_min,
            image_url: None,
            created_at: OffsetDateTime::now_utc(),
            user_id: Uuid::new_v4(),
            author: "sam".into(),
            category_id: Uuid::new_v4(),
            category: draft.category.clone(),
        };
        let steps = draft.steps.iter().map(|s| StepRow { step: s.clone() }).collect();
        let needs = draft
            .ingredients
            .iter()
            .map(|l| NeedRow {
                ingredient_id: Uuid::new_v4(),
                name: l.name.clone(),
                is_allergen: false,
                quantity: l.quantity,
                unit: l.unit.clone(),
            })
            .collect();

        let resubmitted = RecipeDraft::try_from(render_form(row, steps, needs)).expect("still valid");
        assert_eq!(resubmitted, draft);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let msg = bad_request(RecipeForm {
            ingredients: vec![IngredientLine { name: "Egg".into(), quantity: -1.0, unit: "pcs".into() }],
            ..form()
        });
        assert!(msg.contains("Quantity"));
    }

    #[test]
    fn rendered_form_round_trips_through_draft() {
        let row = RecipeRow {
            id: Uuid::new_v4(),
            name: "French toast".into(),
            description: None,
            cook_time_min: 10,
            image_url: None,
            created_at: OffsetDateTime::now_utc(),
            user_id: Uuid::new_v4(),
            author: "sam".into(),
            category_id: Uuid::new_v4(),
            category: "Main dish".into(),
        };
        let steps = vec![
            StepRow { step: "beat the eggs".into() },
            StepRow { step: "dip the bread".into() },
        ];
        let needs = vec![NeedRow {
            ingredient_id: Uuid::new_v4(),
            name: "Milk".into(),
            is_allergen: true,
            quantity: 50.0,
            unit: "ml".into(),
        }];

        let form = render_form(row, steps, needs);
        assert_eq!(form.steps_text.as_deref(), Some("beat the eggs\ndip the bread"));
        assert_eq!(form.ingredients_text.as_deref(), Some("Milk,50,ml"));
        assert_eq!(form.image_url.as_deref(), Some(""));

        let draft = RecipeDraft::try_from(form).expect("stored recipe is valid");
        assert_eq!(draft.steps.len(), 2);
        assert_eq!(draft.ingredients[0].quantity, 50.0);
    }

    async fn user(db: &PgPool, name: &str) -> Uuid {
        User::create(db, name, &format!("{name}@example.com"), "not-a-real-hash")
            .await
            .expect("create user")
            .id
    }

    fn toast(name: &str) -> RecipeDraft {
        RecipeDraft::try_from(RecipeForm {
            name: name.into(),
            steps_text: Some("beat the eggs\ndip the bread".into()),
            ingredients_text: Some("Egg,2,pcs\nMilk,50,ml".into()),
            ..form()
        })
        .expect("valid draft")
    }

    async fn count(db: &PgPool, table: &str, recipe_id: Uuid) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE recipe_id = $1");
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(recipe_id)
            .fetch_one(db)
            .await
            .expect("count rows")
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_recipe_name_is_a_conflict(pool: PgPool) {
        let sam = user(&pool, "sam").await;
        let kim = user(&pool, "kim").await;
        create(&pool, sam, &toast("French toast")).await.expect("first recipe");

        let err = create(&pool, kim, &toast("French toast")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_rewrites_steps_and_needs(pool: PgPool) {
        let sam = user(&pool, "sam").await;
        let id = create(&pool, sam, &toast("French toast")).await.expect("create");

        let changed = RecipeDraft::try_from(RecipeForm {
            name: "Eggy bread".into(),
            steps_text: Some("fry".into()),
            ingredients_text: Some("Bread,2,slices\negg,1,pcs".into()),
            ..form()
        })
        .expect("valid draft");
        update(&pool, id, &changed).await.expect("update");

        let detail = load_detail(&pool, id, Some(sam)).await.expect("detail");
        assert_eq!(detail.recipe.name, "Eggy bread");
        assert_eq!(detail.steps, vec!["fry"]);
        let names: Vec<_> = detail.ingredients.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Bread", "Egg"]);
        assert_eq!(detail.ingredients[1].quantity, 1.0);
        assert!(detail.is_owner);
        assert_eq!(count(&pool, "cook_instructions", id).await, 1);
        assert_eq!(count(&pool, "needs", id).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_of_missing_recipe_is_not_found(pool: PgPool) {
        let err = update(&pool, Uuid::new_v4(), &toast("Ghost")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Recipe")));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_takes_steps_needs_and_reviews_along(pool: PgPool) {
        let sam = user(&pool, "sam").await;
        let kim = user(&pool, "kim").await;
        let id = create(&pool, sam, &toast("French toast")).await.expect("create");
        review_repo::upsert(&pool, id, kim, 4, None).await.expect("review");
        assert_eq!(count(&pool, "reviews", id).await, 1);

        assert!(repo::delete(&pool, id).await.expect("delete"));

        for table in ["cook_instructions", "needs", "reviews"] {
            assert_eq!(count(&pool, table, id).await, 0, "{table} left behind");
        }
        assert!(!repo::exists(&pool, id).await.expect("exists"));
        assert!(!repo::delete(&pool, id).await.expect("second delete"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn only_the_author_passes_the_owner_check(pool: PgPool) {
        let sam = user(&pool, "sam").await;
        let kim = user(&pool, "kim").await;
        let id = create(&pool, sam, &toast("French toast")).await.expect("create");

        authorize_owner(&pool, id, sam).await.expect("author");
        assert!(matches!(authorize_owner(&pool, id, kim).await, Err(AppError::Forbidden)));
        assert!(matches!(
            authorize_owner(&pool, Uuid::new_v4(), sam).await,
            Err(AppError::NotFound(_))
        ));
    }
}
