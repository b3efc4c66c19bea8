use axum::{
    extract::{Path, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    catalog::handlers::search_recipes,
    error::AppError,
    recipes::{
        dto::{RecipeDetail, RecipeForm},
        repo,
        services::{self, RecipeDraft},
    },
    state::AppState,
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(search_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(show_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/edit", get(edit_form))
}

fn validate(form: RecipeForm) -> Result<RecipeDraft, AppError> {
    RecipeDraft::try_from(form).map_err(|e| {
        warn!(error = %e, "invalid recipe form");
        e
    })
}

/// POST /recipes
#[instrument(skip(state, form))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<RecipeForm>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeDetail>), AppError> {
    let draft = validate(form)?;
    let recipe_id = services::create(&state.db, user_id, &draft).await?;
    let detail = services::load_detail(&state.db, recipe_id, Some(user_id)).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/recipes/{recipe_id}"))
        .map_err(anyhow::Error::from)?;
    headers.insert(LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(detail)))
}

/// GET /recipes/:id
#[instrument(skip(state))]
pub async fn show_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetail>, AppError> {
    Ok(Json(services::load_detail(&state.db, id, viewer).await?))
}

/// GET /recipes/:id/edit
#[instrument(skip(state))]
pub async fn edit_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeForm>, AppError> {
    services::authorize_owner(&state.db, id, user_id).await?;
    Ok(Json(services::load_form(&state.db, id).await?))
}

/// PUT /recipes/:id
#[instrument(skip(state, form))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(form): Json<RecipeForm>,
) -> Result<Json<RecipeDetail>, AppError> {
    let draft = validate(form)?;
    services::authorize_owner(&state.db, id, user_id).await?;
    services::update(&state.db, id, &draft).await?;
    Ok(Json(services::load_detail(&state.db, id, Some(user_id)).await?))
}

/// DELETE /recipes/:id
#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::authorize_owner(&state.db, id, user_id).await?;
    if !repo::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Recipe"));
    }
    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{body::Body, extract::FromRef, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn token(state: &AppState) -> String {
        JwtKeys::from_ref(state).sign_access(Uuid::new_v4()).unwrap()
    }

    fn send(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn create_requires_session() {
        let app = recipe_routes().with_state(AppState::fake());
        let res = app
            .oneshot(send("POST", "/recipes", None, r#"{"name":"x","category":"y","cook_time_min":1}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_rejects_invalid_form_before_writing() {
        let state = AppState::fake();
        let token = token(&state);
        let app = recipe_routes().with_state(state);
        let body = r#"{
            "name": "French toast",
            "category": "Main dish",
            "cook_time_min": 10,
            "ingredients_text": "Egg,2,pcs\nEGG,1,pcs"
        }"#;
        let res = app
            .oneshot(send("POST", "/recipes", Some(&token), body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("duplicate ingredient"));
    }

    #[tokio::test]
    async fn update_rejects_missing_cook_time() {
        let state = AppState::fake();
        let token = token(&state);
        let app = recipe_routes().with_state(state);
        let uri = format!("/recipes/{}", Uuid::new_v4());
        let res = app
            .oneshot(send("PUT", &uri, Some(&token), r#"{"name":"x","category":"y"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_requires_session() {
        let app = recipe_routes().with_state(AppState::fake());
        let uri = format!("/recipes/{}", Uuid::new_v4());
        let res = app.oneshot(send("DELETE", &uri, None, "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn edit_form_requires_session() {
        let app = recipe_routes().with_state(AppState::fake());
        let uri = format!("/recipes/{}/edit", Uuid::new_v4());
        let res = app.oneshot(send("GET", &uri, None, "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
