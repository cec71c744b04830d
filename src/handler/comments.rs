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
    db::CommentExt,
    dtos::{CommentDto, InputCommentDto, ListResponseDto, PageQuery},
    error::{ErrorMessage, HttpError},
    handler::{JsonBody, db_error, reviews::find_review},
    middleware::{JWTAuthMiddleware, auth, policy_check},
    models::Comment,
    permissions::{USER_CONTENT, authorize},
};

const COLLECTION: &str = "/{title_id}/reviews/{review_id}/comments";
const ITEM: &str = "/{title_id}/reviews/{review_id}/comments/{comment_id}";

/// Router for comments on a review, same access rules as reviews
pub fn comments_handler(app_state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(COLLECTION, post(create_comment))
        .route(ITEM, patch(update_comment).delete(delete_comment))
        .route_layer(middleware::from_fn(|req, next| {
            policy_check(req, next, USER_CONTENT)
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth));

    Router::new()
        .route(COLLECTION, get(get_comments))
        .route(ITEM, get(get_comment))
        .merge(protected)
}

async fn find_comment(
    app_state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, HttpError> {
    let review = find_review(app_state, title_id, review_id).await?;

    app_state
        .db_client
        .get_comment(review.id, comment_id)
        .await
        .map_err(db_error("getting comment"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))
}

#[instrument(skip(app_state))]
pub async fn get_comments(
    Path((title_id, review_id)): Path<(i64, i64)>,
    Query(query_params): Query<PageQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::from_validation(&e))?;
    let review = find_review(&app_state, title_id, review_id).await?;

    let page = query_params.page();
    let limit = query_params.limit();

    let comments = app_state
        .db_client
        .get_comments(review.id, page, limit)
        .await
        .map_err(db_error("getting comments"))?;

    let total = app_state
        .db_client
        .get_review_comment_count(review.id)
        .await
        .map_err(db_error("counting comments"))?;

    let data = comments.into_iter().map(CommentDto::from).collect();
    Ok(Json(ListResponseDto::success(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = find_comment(&app_state, title_id, review_id, comment_id).await?;
    Ok(Json(CommentDto::from(comment)))
}

#[instrument(skip(user, app_state, body), fields(username = %user.user.username))]
pub async fn create_comment(
    Path((title_id, review_id)): Path<(i64, i64)>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_comment input: {}", e);
        HttpError::from_validation(&e)
    })?;
    let review = find_review(&app_state, title_id, review_id).await?;

    let comment = app_state
        .db_client
        .create_comment(review.id, user.user.id, &body.text)
        .await
        .map_err(db_error("creating comment"))?;

    tracing::info!(comment_id = comment.id, "comment created");
    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

#[instrument(skip(user, app_state, body), fields(username = %user.user.username))]
pub async fn update_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::from_validation(&e))?;

    let comment = find_comment(&app_state, title_id, review_id, comment_id).await?;
    authorize(USER_CONTENT, &Method::PATCH, Some(&user.user), Some(&comment))?;

    let comment = app_state
        .db_client
        .edit_comment(comment.id, &body.text)
        .await
        .map_err(db_error("updating comment"))?;

    tracing::info!("comment updated");
    Ok(Json(CommentDto::from(comment)))
}

#[instrument(skip(user, app_state), fields(username = %user.user.username))]
pub async fn delete_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = find_comment(&app_state, title_id, review_id, comment_id).await?;
    authorize(USER_CONTENT, &Method::DELETE, Some(&user.user), Some(&comment))?;

    app_state
        .db_client
        .delete_comment(comment.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::CommentNotFound.to_string())
            }
            e => db_error("deleting comment")(e),
        })?;

    tracing::info!("comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
