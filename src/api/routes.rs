use std::collections::HashMap;
use std::convert::Infallible;

use bytes::BufMut;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::multipart::{FormData as MultipartForm, Part};
use warp::{Filter, Rejection, Reply};

use crate::constants::MAX_UPLOAD_BYTES;
use crate::database::actions;
use crate::database::error::DomainError;
use crate::database::form::{Form, FormData};
use crate::database::schema::{NewRecipe, RecipePatch};
use crate::media::store::{MediaStore, UploadedImage};

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct IdentityBody {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateBody {
    username: Option<String>,
    stars: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    username: Option<String>,
    content: String,
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    username: Option<String>,
    #[serde(flatten)]
    patch: RecipePatch,
}

/// The full route tree, ready for a host binary to mount with
/// `warp::serve`. Every handler is thin: decode the payload, call the
/// matching action, serialize the result. Errors surface as rejections
/// and get mapped to statuses in [`handle_rejection`].
pub fn routes(
    pool: Pool<Postgres>,
    media: MediaStore,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let health = warp::path::end()
        .and(warp::get())
        .map(|| "Pocket Chef API running");

    let uploads = warp::path("uploads").and(warp::fs::dir(media.root().to_path_buf()));

    let list_recipes = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_pool(pool.clone()))
        .and_then(list_recipes_handler);

    let create_recipe_multipart = warp::path!("recipes")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_media(media.clone()))
        .and(with_pool(pool.clone()))
        .and_then(create_recipe_multipart_handler);

    let create_recipe_json = warp::path!("recipes")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::json::<FormData>())
        .and(with_media(media.clone()))
        .and(with_pool(pool.clone()))
        .and_then(create_recipe_json_handler);

    let update_recipe = warp::path!("recipes" / i32)
        .and(warp::put())
        .and(json_body::<UpdateBody>())
        .and(with_pool(pool.clone()))
        .and_then(update_recipe_handler);

    let delete_recipe = warp::path!("recipes" / i32)
        .and(warp::delete())
        .and(json_body::<IdentityBody>())
        .and(with_media(media.clone()))
        .and(with_pool(pool.clone()))
        .and_then(delete_recipe_handler);

    let toggle_like = warp::path!("recipes" / i32 / "like")
        .and(warp::post())
        .and(json_body::<IdentityBody>())
        .and(with_pool(pool.clone()))
        .and_then(toggle_like_handler);

    let toggle_favorite = warp::path!("recipes" / i32 / "favorite")
        .and(warp::post())
        .and(json_body::<IdentityBody>())
        .and(with_pool(pool.clone()))
        .and_then(toggle_favorite_handler);

    let rate_recipe = warp::path!("recipes" / i32 / "rate")
        .and(warp::post())
        .and(json_body::<RateBody>())
        .and(with_pool(pool.clone()))
        .and_then(rate_recipe_handler);

    let list_comments = warp::path!("comments" / i32)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_comments_handler);

    let add_comment = warp::path!("comments" / i32)
        .and(warp::post())
        .and(json_body::<CommentBody>())
        .and(with_pool(pool.clone()))
        .and_then(add_comment_handler);

    let register = warp::path!("register")
        .and(warp::post())
        .and(json_body::<CredentialsBody>())
        .and(with_pool(pool.clone()))
        .and_then(register_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(json_body::<CredentialsBody>())
        .and(with_pool(pool))
        .and_then(login_handler);

    health
        .or(uploads)
        .or(list_recipes)
        .or(create_recipe_multipart)
        .or(create_recipe_json)
        .or(update_recipe)
        .or(delete_recipe)
        .or(toggle_like)
        .or(toggle_favorite)
        .or(rate_recipe)
        .or(list_comments)
        .or(add_comment)
        .or(register)
        .or(login)
        .recover(handle_rejection)
}

fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

fn with_media(media: MediaStore) -> impl Filter<Extract = (MediaStore,), Error = Infallible> + Clone {
    warp::any().map(move || media.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_UPLOAD_BYTES).and(warp::body::json())
}

async fn list_recipes_handler(
    query: HashMap<String, String>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = query.get("username").map(String::as_str);
    let views = actions::list_recipes(viewer, &pool).await?;

    Ok(warp::reply::json(&views))
}

async fn create_recipe_multipart_handler(
    form: MultipartForm,
    media: MediaStore,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let (fields, upload) = collect_multipart(form).await?;
    let id = create_from_fields(fields, upload, &media, &pool).await?;

    Ok(created_reply(id))
}

async fn create_recipe_json_handler(
    fields: FormData,
    media: MediaStore,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let id = create_from_fields(fields, None, &media, &pool).await?;

    Ok(created_reply(id))
}

fn created_reply(id: i32) -> impl Reply {
    warp::reply::with_status(
        warp::reply::json(&json!({ "status": "ok", "id": id })),
        StatusCode::CREATED,
    )
}

/// Common tail of both creation paths. An uploaded file wins over a plain
/// `image` URL field; everything but the title falls back to a default.
async fn create_from_fields(
    fields: FormData,
    upload: Option<UploadedImage>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<i32, DomainError> {
    let form = Form::from_data(fields);
    let title = form.get_str("title").map_err(|_| {
        DomainError::InvalidArgument(String::from("Missing required field: title"))
    })?;

    let image = match upload {
        Some(file) => media.store(&file.filename, &file.data)?,
        None => form.get_str("image").unwrap_or_default(),
    };

    let recipe = NewRecipe {
        title,
        category: form.get_str("category").unwrap_or_default(),
        prep_time: form.get_number("prepTime").unwrap_or(0),
        image,
        ingredients: form.get_list("ingredients"),
        steps: form.get_list("steps"),
        author: form.get_str("author").unwrap_or_default(),
    };

    actions::create_recipe(recipe, pool).await
}

async fn update_recipe_handler(
    id: i32,
    body: UpdateBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let username = body.username.unwrap_or_default();
    let recipe = actions::update_recipe(&username, id, body.patch, &pool).await?;

    Ok(warp::reply::json(&recipe))
}

async fn delete_recipe_handler(
    id: i32,
    body: IdentityBody,
    media: MediaStore,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let username = body.username.unwrap_or_default();
    actions::delete_recipe(&username, id, &media, &pool).await?;

    Ok(warp::reply::json(&json!({ "status": "deleted" })))
}

async fn toggle_like_handler(
    recipe_id: i32,
    body: IdentityBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let username = body.username.unwrap_or_default();
    let toggle = actions::toggle_like(&username, recipe_id, &pool).await?;

    Ok(warp::reply::json(&toggle))
}

async fn toggle_favorite_handler(
    recipe_id: i32,
    body: IdentityBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let username = body.username.unwrap_or_default();
    let toggle = actions::toggle_favorite(&username, recipe_id, &pool).await?;

    Ok(warp::reply::json(&toggle))
}

async fn rate_recipe_handler(
    recipe_id: i32,
    body: RateBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    // rate_recipe validates the star range before it resolves the user,
    // so an out-of-range value answers 400 even with a bad username.
    let stars = body.stars.unwrap_or(0);
    let username = body.username.unwrap_or_default();
    let summary = actions::rate_recipe(&username, recipe_id, stars, &pool).await?;

    Ok(warp::reply::json(&summary))
}

async fn list_comments_handler(
    recipe_id: i32,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let comments = actions::list_comments(recipe_id, &pool).await?;

    Ok(warp::reply::json(&comments))
}

async fn add_comment_handler(
    recipe_id: i32,
    body: CommentBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let username = body.username.unwrap_or_default();
    let comment = actions::add_comment(&username, recipe_id, &body.content, &pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&comment),
        StatusCode::CREATED,
    ))
}

async fn register_handler(
    body: CredentialsBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let user = actions::register_user(&body.username, &body.password, &pool).await?;

    Ok(warp::reply::json(
        &json!({ "user": { "id": user.id, "username": user.username } }),
    ))
}

async fn login_handler(
    body: CredentialsBody,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let user = actions::login_user(&body.username, &body.password, &pool).await?;

    Ok(warp::reply::json(
        &json!({ "user": { "id": user.id, "username": user.username } }),
    ))
}

/// Drains a multipart body into the shared field map plus at most one
/// uploaded image. Text parts become string values so they read exactly
/// like a JSON submission.
async fn collect_multipart(
    form: MultipartForm,
) -> Result<(FormData, Option<UploadedImage>), DomainError> {
    let parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|e| DomainError::InvalidArgument(format!("Malformed multipart body: {e}")))?;

    let mut fields = FormData::new();
    let mut upload: Option<UploadedImage> = None;

    for part in parts {
        let name = part.name().to_string();
        let filename = part.filename().map(str::to_string);
        let data = read_part(part).await?;

        match filename {
            Some(filename) if name == "image" && !filename.is_empty() => {
                upload = Some(UploadedImage { filename, data });
            }
            _ => {
                fields.insert(
                    name,
                    Value::String(String::from_utf8_lossy(&data).into_owned()),
                );
            }
        }
    }

    Ok((fields, upload))
}

async fn read_part(part: Part) -> Result<Vec<u8>, DomainError> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, data| {
            acc.put(data);
            async move { Ok(acc) }
        })
        .await
        .map_err(|e| DomainError::InvalidArgument(format!("Failed to read upload: {e}")))
}

/// Maps every rejection to the fixed transport status of its error kind
/// and a `{"error": ...}` body.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(domain) = err.find::<DomainError>() {
        if domain.status() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {domain}");
        }
        (domain.status(), domain.public_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("not found"))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            String::from("unsupported media type"),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            String::from("payload too large"),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("method not allowed"),
        )
    } else {
        log::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("internal server error"),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}
