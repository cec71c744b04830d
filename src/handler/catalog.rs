use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::WithRejection;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{CatalogExt, CatalogTable},
    dtos::{CatalogEntryDto, ListResponseDto, SearchQuery},
    error::{ErrorMessage, HttpError, is_unique_violation},
    handler::{JsonBody, db_error},
    middleware::{auth, policy_check},
    permissions::CATALOG,
};

/// Router for `/categories` or `/genres`, depending on `table`
///
/// Listing is public; creating and deleting need an admin. Entries are
/// addressed by slug.
pub fn catalog_handler(table: CatalogTable, app_state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/",
            post(move |state: State<AppState>, body: JsonBody<CatalogEntryDto>| {
                create_entry(table, state, body)
            }),
        )
        .route(
            "/{slug}",
            delete(move |state: State<AppState>, slug: Path<String>| {
                delete_entry(table, state, slug)
            }),
        )
        .route_layer(middleware::from_fn(|req, next| {
            policy_check(req, next, CATALOG)
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth));

    Router::new()
        .route(
            "/",
            get(move |query: Query<SearchQuery>, state: State<AppState>| {
                get_entries(table, query, state)
            }),
        )
        .merge(protected)
}

fn not_found(table: CatalogTable) -> HttpError {
    let message = match table {
        CatalogTable::Categories => ErrorMessage::CategoryNotFound,
        CatalogTable::Genres => ErrorMessage::GenreNotFound,
    };
    HttpError::not_found(message.to_string())
}

/// Paginated list, ?search= matches the name
#[instrument(skip(app_state))]
pub async fn get_entries(
    table: CatalogTable,
    Query(query_params): Query<SearchQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::from_validation(&e))?;

    let page = query_params.page();
    let limit = query_params.limit();
    let search = query_params.search.as_deref();

    let entries = app_state
        .db_client
        .get_entries(table, search, page, limit)
        .await
        .map_err(db_error("getting catalog entries"))?;

    let total = app_state
        .db_client
        .get_entry_count(table, search)
        .await
        .map_err(db_error("counting catalog entries"))?;

    let data = entries.iter().map(CatalogEntryDto::from).collect();
    Ok(Json(ListResponseDto::success(data, page, limit, total)))
}

#[instrument(skip(app_state, body), fields(slug = %body.slug))]
pub async fn create_entry(
    table: CatalogTable,
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<CatalogEntryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid catalog entry: {}", e);
        HttpError::from_validation(&e)
    })?;

    let entry = app_state
        .db_client
        .create_entry(table, &body.name, &body.slug)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                HttpError::validation("slug", "An entry with this slug already exists")
            } else {
                db_error("creating catalog entry")(e)
            }
        })?;

    tracing::info!("catalog entry created");
    Ok((StatusCode::CREATED, Json(CatalogEntryDto::from(&entry))))
}

#[instrument(skip(app_state))]
pub async fn delete_entry(
    table: CatalogTable,
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_entry(table, &slug)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found(table),
            e => db_error("deleting catalog entry")(e),
        })?;

    tracing::info!("catalog entry deleted");
    Ok(StatusCode::NO_CONTENT)
}
