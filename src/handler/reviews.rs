use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{ReviewExt, TitleExt},
    dtos::{CreateReviewDto, ListResponseDto, PageQuery, ReviewDto, UpdateReviewDto},
    error::{ErrorMessage, HttpError, is_unique_violation},
    handler::{JsonBody, db_error},
    middleware::{JWTAuthMiddleware, auth, policy_check},
    models::Review,
    permissions::{USER_CONTENT, authorize},
};

/// Router for `/titles/{title_id}/reviews`
///
/// Anyone may read. Posting needs an account; editing or deleting needs the
/// author, a moderator or an admin.
pub fn reviews_handler(app_state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/{title_id}/reviews", post(create_review))
        .route(
            "/{title_id}/reviews/{review_id}",
            patch(update_review).delete(delete_review),
        )
        .route_layer(middleware::from_fn(|req, next| {
            policy_check(req, next, USER_CONTENT)
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth));

    Router::new()
        .route("/{title_id}/reviews", get(get_reviews))
        .route("/{title_id}/reviews/{review_id}", get(get_review))
        .merge(protected)
}

async fn ensure_title(app_state: &AppState, title_id: i64) -> Result<(), HttpError> {
    let exists = app_state
        .db_client
        .title_exists(title_id)
        .await
        .map_err(db_error("checking title"))?;

    if !exists {
        return Err(HttpError::not_found(ErrorMessage::TitleNotFound.to_string()));
    }
    Ok(())
}

/// A review of `title_id`; 404 when either is missing or they don't match
pub(crate) async fn find_review(
    app_state: &AppState,
    title_id: i64,
    review_id: i64,
) -> Result<Review, HttpError> {
    app_state
        .db_client
        .get_review(title_id, review_id)
        .await
        .map_err(db_error("getting review"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ReviewNotFound.to_string()))
}

#[instrument(skip(app_state))]
pub async fn get_reviews(
    Path(title_id): Path<i64>,
    Query(query_params): Query<PageQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::from_validation(&e))?;
    ensure_title(&app_state, title_id).await?;

    let page = query_params.page();
    let limit = query_params.limit();

    let reviews = app_state
        .db_client
        .get_reviews(title_id, page, limit)
        .await
        .map_err(db_error("getting reviews"))?;

    let total = app_state
        .db_client
        .get_title_review_count(title_id)
        .await
        .map_err(db_error("counting reviews"))?;

    let data = reviews.into_iter().map(ReviewDto::from).collect();
    Ok(Json(ListResponseDto::success(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = find_review(&app_state, title_id, review_id).await?;
    Ok(Json(ReviewDto::from(review)))
}

/// One review per author and title. The pre-check gives a clean message;
/// the UNIQUE constraint catches the concurrent case.
#[instrument(skip(user, app_state, body), fields(username = %user.user.username))]
pub async fn create_review(
    Path(title_id): Path<i64>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<CreateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_review input: {}", e);
        HttpError::from_validation(&e)
    })?;
    ensure_title(&app_state, title_id).await?;

    let duplicate = || HttpError::validation("title", ErrorMessage::DuplicateReview.to_string());

    let reviewed = app_state
        .db_client
        .has_reviewed(title_id, user.user.id)
        .await
        .map_err(db_error("checking existing review"))?;
    if reviewed {
        return Err(duplicate());
    }

    let review = app_state
        .db_client
        .create_review(title_id, user.user.id, &body.text, body.score)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate()
            } else {
                db_error("creating review")(e)
            }
        })?;

    tracing::info!(review_id = review.id, "review created");
    Ok((StatusCode::CREATED, Json(ReviewDto::from(review))))
}

#[instrument(skip(user, app_state, body), fields(username = %user.user.username))]
pub async fn update_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<UpdateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::from_validation(&e))?;

    let review = find_review(&app_state, title_id, review_id).await?;
    authorize(USER_CONTENT, &Method::PATCH, Some(&user.user), Some(&review))?;

    let review = app_state
        .db_client
        .edit_review(review.id, body.text.as_deref(), body.score)
        .await
        .map_err(db_error("updating review"))?;

    tracing::info!("review updated");
    Ok(Json(ReviewDto::from(review)))
}

#[instrument(skip(user, app_state), fields(username = %user.user.username))]
pub async fn delete_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = find_review(&app_state, title_id, review_id).await?;
    authorize(USER_CONTENT, &Method::DELETE, Some(&user.user), Some(&review))?;

    app_state
        .db_client
        .delete_review(review.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::ReviewNotFound.to_string())
            }
            e => db_error("deleting review")(e),
        })?;

    tracing::info!("review deleted");
    Ok(StatusCode::NO_CONTENT)
}
