use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::WithRejection;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::UserExt,
    dtos::{
        CreateUserDto, FilterUserDto, ListResponseDto, SearchQuery, SingleResponseDto,
        UpdateUserDto,
    },
    error::{ErrorMessage, HttpError, is_unique_violation},
    handler::{JsonBody, db_error},
    middleware::{JWTAuthMiddleware, policy_check},
    models::User,
    permissions::USERS,
};

/// Router for user management endpoints
///
/// Every route sits behind the auth middleware (applied in routes.rs).
/// `/me` is open to any authenticated user; the rest need admin or staff.
pub fn users_handler() -> Router<AppState> {
    let admin = Router::new()
        // GET /users - paginated list, ?search= on username
        // POST /users - create a user directly
        .route("/", get(get_users).post(create_user))
        // GET|PATCH|DELETE /users/{username}
        .route(
            "/{username}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn(|req, next| {
            policy_check(req, next, USERS)
        }));

    Router::new()
        // GET|PATCH /users/me - own profile
        .route("/me", get(get_me).patch(update_me))
        .merge(admin)
}

async fn find_user(app_state: &AppState, username: &str) -> Result<User, HttpError> {
    app_state
        .db_client
        .get_user(None, Some(username), None)
        .await
        .map_err(db_error("getting user"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))
}

/// A username or email already taken by someone else
fn save_error(context: &'static str) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| {
        if is_unique_violation(&e) {
            HttpError::bad_request("A user with this username or email already exists")
        } else {
            db_error(context)(e)
        }
    }
}

#[instrument(skip(app_state))]
pub async fn get_users(
    Query(query_params): Query<SearchQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::from_validation(&e))?;

    let page = query_params.page();
    let limit = query_params.limit();
    let search = query_params.search.as_deref();

    let users = app_state
        .db_client
        .get_users(search, page, limit)
        .await
        .map_err(db_error("getting users"))?;

    let user_count = app_state
        .db_client
        .get_user_count(search)
        .await
        .map_err(db_error("getting user count"))?;

    Ok(Json(ListResponseDto::success(
        FilterUserDto::filter_users(&users),
        page,
        limit,
        user_count,
    )))
}

#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn create_user(
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_user input: {}", e);
        HttpError::from_validation(&e)
    })?;

    let user = app_state
        .db_client
        .save_user(&body)
        .await
        .map_err(save_error("saving user"))?;

    tracing::info!("user created");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::success(FilterUserDto::filter_user(&user))),
    ))
}

#[instrument(skip(app_state))]
pub async fn get_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;
    Ok(Json(SingleResponseDto::success(FilterUserDto::filter_user(
        &user,
    ))))
}

/// Admin partial update; the role may be changed here
#[instrument(skip(app_state, body))]
pub async fn update_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::from_validation(&e))?;

    let user = find_user(&app_state, &username).await?;
    let user = app_state
        .db_client
        .update_user(user.id, &body, true)
        .await
        .map_err(save_error("updating user"))?;

    tracing::info!("user updated");
    Ok(Json(SingleResponseDto::success(FilterUserDto::filter_user(
        &user,
    ))))
}

#[instrument(skip(app_state))]
pub async fn delete_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;
    app_state
        .db_client
        .delete_user(user.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::UserNotFound.to_string())
            }
            e => db_error("deleting user")(e),
        })?;

    tracing::info!("user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(user), fields(username = %user.user.username))]
pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(SingleResponseDto::success(FilterUserDto::filter_user(
        &user.user,
    ))))
}

/// Update the caller's own profile. A `role` in the body is dropped unless
/// the caller is an admin.
#[instrument(skip(user, app_state, body), fields(username = %user.user.username))]
pub async fn update_me(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::from_validation(&e))?;

    let updated = app_state
        .db_client
        .update_user(user.user.id, &body, user.user.is_admin())
        .await
        .map_err(save_error("updating own profile"))?;

    tracing::info!("update_me successful");
    Ok(Json(SingleResponseDto::success(FilterUserDto::filter_user(
        &updated,
    ))))
}
