use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{CatalogExt, CatalogTable, TitleChanges, TitleExt},
    dtos::{CreateTitleDto, ListResponseDto, TitleDto, TitleFilterQuery, UpdateTitleDto},
    error::{ErrorMessage, HttpError},
    handler::{JsonBody, db_error},
    middleware::{auth, policy_check},
    permissions::CATALOG,
};

/// Router for `/titles`. Reads are public, writes need an admin.
pub fn titles_handler(app_state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // POST /titles
        .route("/", post(create_title))
        // PATCH|DELETE /titles/{title_id}
        .route("/{title_id}", patch(update_title).delete(delete_title))
        .route_layer(middleware::from_fn(|req, next| {
            policy_check(req, next, CATALOG)
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth));

    Router::new()
        // GET /titles - ?category=&genre=&name=&year=
        .route("/", get(get_titles))
        // GET /titles/{title_id}
        .route("/{title_id}", get(get_title))
        .merge(protected)
}

/// Load one title with its genres, 404 when missing
async fn load_title(app_state: &AppState, title_id: i64) -> Result<TitleDto, HttpError> {
    let row = app_state
        .db_client
        .get_title(title_id)
        .await
        .map_err(db_error("getting title"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::TitleNotFound.to_string()))?;

    let genres = app_state
        .db_client
        .get_title_genres(&[title_id])
        .await
        .map_err(db_error("getting title genres"))?;

    Ok(TitleDto::assemble(row, &genres))
}

/// Category slug to id, 404 when no such category exists
async fn resolve_category(app_state: &AppState, slug: &str) -> Result<i64, HttpError> {
    app_state
        .db_client
        .get_entry(CatalogTable::Categories, slug)
        .await
        .map_err(db_error("resolving category"))?
        .map(|category| category.id)
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CategoryNotFound.to_string()))
}

#[instrument(skip(app_state))]
pub async fn get_titles(
    Query(query_params): Query<TitleFilterQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::from_validation(&e))?;

    let page = query_params.page();
    let limit = query_params.limit();

    let rows = app_state
        .db_client
        .get_titles(&query_params, page, limit)
        .await
        .map_err(db_error("getting titles"))?;

    let total = app_state
        .db_client
        .get_title_count(&query_params)
        .await
        .map_err(db_error("counting titles"))?;

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let genres = app_state
        .db_client
        .get_title_genres(&ids)
        .await
        .map_err(db_error("getting title genres"))?;

    let data = rows
        .into_iter()
        .map(|row| TitleDto::assemble(row, &genres))
        .collect();

    Ok(Json(ListResponseDto::success(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(load_title(&app_state, title_id).await?))
}

#[instrument(skip(app_state, body), fields(name = %body.name))]
pub async fn create_title(
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<CreateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_title input: {}", e);
        HttpError::from_validation(&e)
    })?;

    let category_id = resolve_category(&app_state, &body.category).await?;

    let title_id = app_state
        .db_client
        .create_title(TitleChanges {
            name: Some(&body.name),
            year: Some(body.year),
            description: Some(&body.description),
            category_id: Some(category_id),
            genre_slugs: Some(&body.genre),
        })
        .await
        .map_err(db_error("creating title"))?;

    tracing::info!(title_id, "title created");
    Ok((StatusCode::CREATED, Json(load_title(&app_state, title_id).await?)))
}

/// Partial update. A `genre` list, when sent, replaces the current genres.
#[instrument(skip(app_state, body))]
pub async fn update_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<UpdateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::from_validation(&e))?;

    let category_id = match body.category.as_deref() {
        Some(slug) => Some(resolve_category(&app_state, slug).await?),
        None => None,
    };

    app_state
        .db_client
        .update_title(
            title_id,
            TitleChanges {
                name: body.name.as_deref(),
                year: body.year,
                description: body.description.as_deref(),
                category_id,
                genre_slugs: body.genre.as_deref(),
            },
        )
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::TitleNotFound.to_string())
            }
            e => db_error("updating title")(e),
        })?;

    tracing::info!("title updated");
    Ok(Json(load_title(&app_state, title_id).await?))
}

#[instrument(skip(app_state))]
pub async fn delete_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_title(title_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::not_found(ErrorMessage::TitleNotFound.to_string())
            }
            e => db_error("deleting title")(e),
        })?;

    tracing::info!("title deleted");
    Ok(StatusCode::NO_CONTENT)
}
