use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    /// Argon2 PHC string, never the plaintext credential.
    pub password: String,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i32,
    pub title: String,
    pub category: String,
    pub prep_time: i32,
    /// Either a `/uploads/<name>` reference or an external URL.
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    /// Free-text username, intentionally not a foreign key.
    pub author: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Like {
    pub id: i32,
    pub user_id: i32,
    pub recipe_id: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Favorite {
    pub id: i32,
    pub user_id: i32,
    pub recipe_id: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Rating {
    pub id: i32,
    pub user_id: i32,
    pub recipe_id: i32,
    pub stars: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i32,
    pub user_id: i32,
    pub recipe_id: i32,
    pub content: String,
}

/// A recipe as served to clients: the stored row plus aggregates derived
/// live from the interaction tables, and the viewer's own flags when a
/// username was supplied with the request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeView {
    pub id: i32,
    pub title: String,
    pub category: String,
    pub prep_time: i32,
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub author: String,

    pub likes: i64,
    pub rating: f64,

    pub user_liked: bool,
    pub user_favorited: bool,
    pub user_rating: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub user: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeAction {
    Liked,
    Unliked,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeToggle {
    pub status: LikeAction,
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteToggle {
    pub status: FavoriteAction,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub avg_rating: f64,
    pub user_rating: i32,
}

/// Input for recipe creation. `title` is the only required field; the
/// API surface fills everything else with defaults before calling in.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub category: String,
    pub prep_time: i32,
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub author: String,
}

/// Partial update payload: absent fields keep their stored values.
/// `ingredients`/`steps` stay raw JSON here so both array and delimited
/// string submissions normalize through the same path as creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "prepTime")]
    pub prep_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Option<Value>,
    pub steps: Option<Value>,
}
