use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::PublicUser;
use crate::catalog::repo_types::{Category, CategoryCount, Ingredient, RecipeRow};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;
pub const DASHBOARD_RECENT: i64 = 8;

/// Query string of the recipe listing. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub allergen_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

/// Normalized listing filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFilter {
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub allergen_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl From<SearchParams> for SearchFilter {
    fn from(p: SearchParams) -> Self {
        let q = p
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        Self {
            q,
            category_id: p.category_id,
            allergen_id: p.allergen_id,
            limit: p.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: p.offset.unwrap_or(0).max(0),
        }
    }
}

fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cook_time_min: i32,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author: String,
    pub category: Category,
}

impl From<RecipeRow> for RecipeSummary {
    fn from(r: RecipeRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            cook_time_min: r.cook_time_min,
            image_url: r.image_url,
            created_at: r.created_at,
            author_id: r.user_id,
            author: r.author,
            category: Category {
                id: r.category_id,
                name: r.category,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub recipes: Vec<RecipeSummary>,
    pub categories: Vec<CategoryCount>,
    pub allergens: Vec<Ingredient>,
    pub current_category: Option<Category>,
    pub filter: SearchFilter,
}

#[derive(Debug, Deserialize)]
pub struct AllergenFlag {
    pub is_allergen: bool,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: PublicUser,
    pub recipes: Vec<RecipeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let f: SearchFilter = SearchParams::default().into();
        assert_eq!(f.q, None);
        assert_eq!(f.limit, DEFAULT_LIMIT);
        assert_eq!(f.offset, 0);
    }

    #[test]
    fn blank_values_are_absent() {
        let p: SearchParams = serde_json::from_value(json!({
            "q": "   ",
            "category_id": "",
            "allergen_id": " ",
            "limit": ""
        }))
        .unwrap();
        let f: SearchFilter = p.into();
        assert_eq!(f.q, None);
        assert_eq!(f.category_id, None);
        assert_eq!(f.allergen_id, None);
        assert_eq!(f.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn values_parse_from_strings() {
        let id = Uuid::new_v4();
        let p: SearchParams = serde_json::from_value(json!({
            "q": "  toast ",
            "allergen_id": id.to_string(),
            "offset": "20"
        }))
        .unwrap();
        let f: SearchFilter = p.into();
        assert_eq!(f.q.as_deref(), Some("toast"));
        assert_eq!(f.allergen_id, Some(id));
        assert_eq!(f.offset, 20);
    }

    #[test]
    fn malformed_id_is_rejected() {
        let res: Result<SearchParams, _> =
            serde_json::from_value(json!({ "category_id": "seven" }));
        assert!(res.is_err());
    }

    #[test]
    fn paging_is_clamped() {
        let f: SearchFilter = SearchParams {
            limit: Some(1000),
            offset: Some(-5),
            ..Default::default()
        }
        .into();
        assert_eq!(f.limit, MAX_LIMIT);
        assert_eq!(f.offset, 0);

        let f: SearchFilter = SearchParams {
            limit: Some(0),
            ..Default::default()
        }
        .into();
        assert_eq!(f.limit, 1);
    }
}
