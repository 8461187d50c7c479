use sqlx::{Executor, Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        identity::Identity,
        permissions::ActionType,
    },
    constants::{RATING_MAX, RATING_MIN},
    media::store::MediaStore,
};

use super::{
    error::DomainError,
    form::parse_list_field,
    schema::{
        Comment, CommentView, FavoriteAction, FavoriteToggle, LikeAction, LikeToggle, NewRecipe,
        Rating, RatingSummary, Recipe, RecipePatch, RecipeView, User,
    },
};

const SCHEMA: &[&str] = &[
    "DO $$ BEGIN
        CREATE TYPE user_role AS ENUM ('user', 'admin');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$",
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        role user_role NOT NULL DEFAULT 'user'
    )",
    "CREATE TABLE IF NOT EXISTS recipes (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT '',
        prep_time INTEGER NOT NULL DEFAULT 0,
        image TEXT NOT NULL DEFAULT '',
        ingredients TEXT[] NOT NULL DEFAULT '{}',
        steps TEXT[] NOT NULL DEFAULT '{}',
        author TEXT NOT NULL DEFAULT ''
    )",
    // recipe_id is intentionally not a foreign key: interactions on a
    // nonexistent recipe persist as orphaned rows.
    "CREATE TABLE IF NOT EXISTS likes (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        recipe_id INTEGER NOT NULL,
        UNIQUE (user_id, recipe_id)
    )",
    "CREATE TABLE IF NOT EXISTS favorites (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        recipe_id INTEGER NOT NULL,
        UNIQUE (user_id, recipe_id)
    )",
    "CREATE TABLE IF NOT EXISTS ratings (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        recipe_id INTEGER NOT NULL,
        stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
        UNIQUE (user_id, recipe_id)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        recipe_id INTEGER NOT NULL,
        content TEXT NOT NULL
    )",
];

pub async fn init_schema(pool: &Pool<Postgres>) -> Result<(), DomainError> {
    for statement in SCHEMA {
        pool.execute(*statement).await?;
    }
    Ok(())
}

pub async fn get_user(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, DomainError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: i32,
) -> Result<Option<User>, DomainError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Resolves the username a request carries into an [`Identity`]. There is
/// no session layer; this lookup is the whole of request authentication.
pub async fn resolve_identity(
    username: &str,
    pool: &Pool<Postgres>,
) -> Result<Identity, DomainError> {
    match get_user(pool, username).await? {
        Some(user) => Ok(Identity::from(user)),
        None => Err(DomainError::NotFound(String::from("User not found"))),
    }
}

/// Creates a user with the default role. The stored credential is the
/// argon2 hash of the password, never the plaintext.
pub async fn register_user(
    username: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, DomainError> {
    let hashed = hash_password(password)?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, password)
        VALUES ($1, $2)
        ON CONFLICT (username) DO NOTHING RETURNING *;
    ",
    )
    .bind(username)
    .bind(&hashed)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(user),
        None => Err(DomainError::AlreadyExists(String::from("User exists"))),
    }
}

pub async fn login_user(
    username: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, DomainError> {
    let user = get_user(pool, username)
        .await?
        .ok_or_else(|| DomainError::Unauthenticated(String::from("Invalid credentials")))?;

    let authenticated = verify_password(password, &user.password)?;
    if !authenticated {
        return Err(DomainError::Unauthenticated(String::from(
            "Invalid credentials",
        )));
    }

    Ok(user)
}

pub async fn create_recipe(recipe: NewRecipe, pool: &Pool<Postgres>) -> Result<i32, DomainError> {
    if recipe.title.trim().is_empty() {
        return Err(DomainError::InvalidArgument(String::from(
            "Missing required field: title",
        )));
    }

    let id: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (title, category, prep_time, image, ingredients, steps, author)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
    ",
    )
    .bind(recipe.title)
    .bind(recipe.category)
    .bind(recipe.prep_time)
    .bind(recipe.image)
    .bind(recipe.ingredients)
    .bind(recipe.steps)
    .bind(recipe.author)
    .fetch_one(pool)
    .await?;

    Ok(id.0)
}

pub async fn get_recipe(id: i32, pool: &Pool<Postgres>) -> Result<Option<Recipe>, DomainError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetches a recipe for mutation. Admins pass; everyone else must match
/// the recipe's author string with their username.
pub async fn get_recipe_mut(
    id: i32,
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<Recipe, DomainError> {
    let recipe = get_recipe(id, pool).await?;
    identity.authorize(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match identity.authorize(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author != identity.username {
                    Err(DomainError::Forbidden(String::from(
                        "Only the author or an admin may modify this recipe",
                    )))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(DomainError::NotFound(String::from(
            "No recipe exists with specified id",
        ))),
    }
}

/// Partial update: fields absent from the patch keep their stored values.
/// The authorization gate runs before any field is touched.
pub async fn update_recipe(
    username: &str,
    id: i32,
    patch: RecipePatch,
    pool: &Pool<Postgres>,
) -> Result<Recipe, DomainError> {
    let identity = resolve_identity(username, pool).await?;
    let current = get_recipe_mut(id, &identity, pool).await?;

    let title = patch.title.unwrap_or(current.title);
    if title.trim().is_empty() {
        return Err(DomainError::InvalidArgument(String::from(
            "Missing required field: title",
        )));
    }
    let category = patch.category.unwrap_or(current.category);
    let prep_time = patch.prep_time.unwrap_or(current.prep_time);
    let image = patch.image.unwrap_or(current.image);
    let ingredients = match &patch.ingredients {
        Some(value) => parse_list_field(Some(value)),
        None => current.ingredients,
    };
    let steps = match &patch.steps {
        Some(value) => parse_list_field(Some(value)),
        None => current.steps,
    };

    let row: Recipe = sqlx::query_as(
        "
        UPDATE recipes
        SET title = $1, category = $2, prep_time = $3, image = $4, ingredients = $5, steps = $6
        WHERE id = $7
        RETURNING *
    ",
    )
    .bind(title)
    .bind(category)
    .bind(prep_time)
    .bind(image)
    .bind(ingredients)
    .bind(steps)
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Deletes a recipe and everything hanging off it. The row deletions run
/// in one transaction; the image file removal sits between the dependent
/// rows and the recipe row and is best-effort, since filesystem effects
/// cannot roll back with the transaction.
pub async fn delete_recipe(
    username: &str,
    id: i32,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<(), DomainError> {
    let identity = resolve_identity(username, pool).await?;
    let recipe = get_recipe_mut(id, &identity, pool).await?;

    let mut tx = pool.begin().await?;

    for table in ["likes", "favorites", "ratings", "comments"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Err(e) = media.remove(&recipe.image) {
        log::warn!("failed to remove image {}: {e}", recipe.image);
    }

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn list_recipes(
    viewer: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, DomainError> {
    let viewer: Option<User> = match viewer {
        Some(username) => get_user(pool, username).await?,
        None => None,
    };

    let recipes: Vec<Recipe> = sqlx::query_as("SELECT * FROM recipes ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let likes = like_count(recipe.id, pool).await?;
        let rating = avg_rating(recipe.id, pool).await?;

        let (user_liked, user_favorited, user_rating) = match &viewer {
            Some(user) => (
                pair_exists("likes", user.id, recipe.id, pool).await?,
                pair_exists("favorites", user.id, recipe.id, pool).await?,
                user_rating(user.id, recipe.id, pool).await?,
            ),
            None => (false, false, 0),
        };

        views.push(RecipeView {
            id: recipe.id,
            title: recipe.title,
            category: recipe.category,
            prep_time: recipe.prep_time,
            image: recipe.image,
            ingredients: recipe.ingredients,
            steps: recipe.steps,
            author: recipe.author,
            likes,
            rating,
            user_liked,
            user_favorited,
            user_rating,
        });
    }

    Ok(views)
}

pub async fn like_count(recipe_id: i32, pool: &Pool<Postgres>) -> Result<i64, DomainError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Arithmetic mean of all submitted stars, rounded to one decimal, 0 when
/// the recipe has no ratings. Always derived live, never cached.
pub async fn avg_rating(recipe_id: i32, pool: &Pool<Postgres>) -> Result<f64, DomainError> {
    let avg: Option<f64> =
        sqlx::query_scalar("SELECT AVG(stars)::float8 FROM ratings WHERE recipe_id = $1")
            .bind(recipe_id)
            .fetch_one(pool)
            .await?;

    Ok(round_rating(avg))
}

async fn pair_exists(
    table: &str,
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<bool, DomainError> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE user_id = $1 AND recipe_id = $2)"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn user_rating(
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<i32, DomainError> {
    let row: Option<Rating> =
        sqlx::query_as("SELECT * FROM ratings WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(recipe_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|r| r.stars).unwrap_or(0))
}

/// Pure toggle: an existing (user, recipe) row is removed, a missing one
/// is inserted. The delete-then-insert runs in one transaction and the
/// unique constraint turns a lost race into a no-op instead of a
/// duplicate row. The recipe id is deliberately not checked for
/// existence.
pub async fn toggle_like(
    username: &str,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<LikeToggle, DomainError> {
    let identity = resolve_identity(username, pool).await?;
    identity.authorize(ActionType::ManageOwnInteractions)?;

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND recipe_id = $2")
        .bind(identity.user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

    let status = if removed.rows_affected() > 0 {
        LikeAction::Unliked
    } else {
        sqlx::query(
            "INSERT INTO likes (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(identity.user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
        LikeAction::Liked
    };

    let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(LikeToggle { status, likes })
}

pub async fn toggle_favorite(
    username: &str,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<FavoriteToggle, DomainError> {
    let identity = resolve_identity(username, pool).await?;
    identity.authorize(ActionType::ManageOwnInteractions)?;

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(identity.user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

    let status = if removed.rows_affected() > 0 {
        FavoriteAction::Removed
    } else {
        sqlx::query(
            "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(identity.user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
        FavoriteAction::Added
    };

    tx.commit().await?;

    Ok(FavoriteToggle { status })
}

/// Upserts the caller's rating. Stars are validated before the identity
/// lookup so an out-of-range value never touches the store at all.
pub async fn rate_recipe(
    username: &str,
    recipe_id: i32,
    stars: i32,
    pool: &Pool<Postgres>,
) -> Result<RatingSummary, DomainError> {
    if !(RATING_MIN..=RATING_MAX).contains(&stars) {
        return Err(DomainError::InvalidArgument(String::from(
            "Rating must be 1-5",
        )));
    }

    let identity = resolve_identity(username, pool).await?;
    identity.authorize(ActionType::ManageOwnInteractions)?;

    sqlx::query(
        "
        INSERT INTO ratings (user_id, recipe_id, stars)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, recipe_id) DO UPDATE
        SET stars = EXCLUDED.stars;
    ",
    )
    .bind(identity.user_id)
    .bind(recipe_id)
    .bind(stars)
    .execute(pool)
    .await?;

    Ok(RatingSummary {
        avg_rating: avg_rating(recipe_id, pool).await?,
        user_rating: stars,
    })
}

pub async fn list_comments(
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Vec<CommentView>, DomainError> {
    let rows: Vec<CommentView> = sqlx::query_as(
        r#"
        SELECT c.id AS id, u.username AS "user", c.content AS content
        FROM comments c
        INNER JOIN users u ON u.id = c.user_id
        WHERE c.recipe_id = $1
        ORDER BY c.id
    "#,
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn add_comment(
    username: &str,
    recipe_id: i32,
    content: &str,
    pool: &Pool<Postgres>,
) -> Result<CommentView, DomainError> {
    let identity = resolve_identity(username, pool).await?;
    identity.authorize(ActionType::ManageOwnInteractions)?;

    let row: Comment = sqlx::query_as(
        "
        INSERT INTO comments (user_id, recipe_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
    ",
    )
    .bind(identity.user_id)
    .bind(recipe_id)
    .bind(content)
    .fetch_one(pool)
    .await?;

    Ok(CommentView {
        id: row.id,
        user: identity.username,
        content: row.content,
    })
}

fn round_rating(avg: Option<f64>) -> f64 {
    match avg {
        Some(value) => (value * 10.0).round() / 10.0,
        None => 0.0,
    }
}
