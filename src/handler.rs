pub mod auth;
pub mod catalog;
pub mod comments;
pub mod reviews;
pub mod titles;
pub mod users;

use axum::Json;
use axum_extra::extract::WithRejection;

use crate::error::{ErrorMessage, HttpError};

/// JSON request body whose parse failures come back as a 400 `HttpError`
pub(crate) type JsonBody<T> = WithRejection<Json<T>, HttpError>;

/// Map a database failure to a 500, logging what was being attempted
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| {
        tracing::error!("DB error, {}: {}", context, e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    }
}
