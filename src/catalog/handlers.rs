use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, repo_types::User},
    catalog::{
        dto::{
            AllergenFlag, Dashboard, RecipeSummary, SearchFilter, SearchParams, SearchResponse,
            DASHBOARD_RECENT,
        },
        repo,
        repo_types::{CategoryCount, Ingredient},
    },
    error::AppError,
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/allergens", get(list_allergens))
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id/allergen", put(set_allergen))
        .route("/dashboard", get(dashboard))
}

/// GET /recipes?q=&category_id=&allergen_id=&limit=&offset=
#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let filter = SearchFilter::from(params);

    let recipes = repo::search(&state.db, &filter).await?;
    let categories = repo::category_counts(&state.db).await?;
    let allergens = repo::allergens(&state.db).await?;
    let current_category = match filter.category_id {
        Some(id) => repo::find_category(&state.db, id).await?,
        None => None,
    };

    Ok(Json(SearchResponse {
        recipes: recipes.into_iter().map(RecipeSummary::from).collect(),
        categories,
        allergens,
        current_category,
        filter,
    }))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    Ok(Json(repo::category_counts(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_allergens(
    State(state): State<AppState>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    Ok(Json(repo::allergens(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    Ok(Json(repo::ingredients(&state.db).await?))
}

#[instrument(skip(state, body))]
pub async fn set_allergen(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AllergenFlag>,
) -> Result<Json<Ingredient>, AppError> {
    let ingredient = repo::set_allergen(&state.db, id, body.is_allergen)
        .await?
        .ok_or(AppError::NotFound("Ingredient"))?;
    info!(%user_id, ingredient_id = %id, is_allergen = body.is_allergen, "ingredient flagged");
    Ok(Json(ingredient))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    let user = User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        warn!(%user_id, "session for missing user");
        AppError::Unauthorized("User not found".into())
    })?;
    let recipes = repo::recent(&state.db, DASHBOARD_RECENT).await?;
    Ok(Json(Dashboard {
        user: user.into(),
        recipes: recipes.into_iter().map(RecipeSummary::from).collect(),
    }))
}
