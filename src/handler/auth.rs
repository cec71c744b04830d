use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::{Duration, Utc};
use constant_time_eq::constant_time_eq;
use axum_extra::extract::WithRejection;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::UserExt,
    dtos::{SignupDto, TokenRequestDto, TokenResponseDto},
    error::{ErrorMessage, HttpError, is_unique_violation},
    handler::{JsonBody, db_error},
    mail::mails::send_confirmation_code_email,
    utils::{confirmation_code, token},
};

/// Router for the two-step signup flow. Both routes are public.
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        // POST /signup - register (or re-register) and get a code by email
        .route("/signup", post(signup))
        // POST /token - trade username + code for an access token
        .route("/token", post(obtain_token))
}

/// Register a user or re-send the code to an existing one
///
/// A username and an email either both belong to the same account or are
/// both unused. Every accepted call issues a fresh code. Mail delivery is
/// best-effort: a failed send is logged and the request still succeeds.
#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn signup(
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<SignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid signup input: {}", e);
        HttpError::from_validation(&e)
    })?;

    let by_username = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(db_error("looking up username"))?;

    if by_username.is_some_and(|user| user.email != body.email) {
        return Err(HttpError::validation(
            "email",
            ErrorMessage::EmailMismatch.to_string(),
        ));
    }

    let by_email = app_state
        .db_client
        .get_user(None, None, Some(&body.email))
        .await
        .map_err(db_error("looking up email"))?;

    if by_email.is_some_and(|user| user.username != body.username) {
        return Err(HttpError::validation(
            "username",
            ErrorMessage::UsernameMismatch.to_string(),
        ));
    }

    let code = confirmation_code::generate();
    let expires_at = Utc::now() + Duration::seconds(app_state.env.confirmation_code_maxage);

    // the checks above race with concurrent signups; the upsert has the final word
    let user = app_state
        .db_client
        .upsert_signup(&body.username, &body.email, &code, expires_at)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                HttpError::validation("username", ErrorMessage::UsernameMismatch.to_string())
            } else {
                db_error("saving signup")(e)
            }
        })?
        .ok_or_else(|| HttpError::validation("email", ErrorMessage::EmailMismatch.to_string()))?;

    if let Err(e) =
        send_confirmation_code_email(&app_state.mailer, &user.email, &user.username, &code).await
    {
        tracing::error!("Failed to send confirmation code to {}: {}", user.email, e);
    }

    tracing::info!("signup successful");
    Ok(Json(SignupDto {
        email: user.email,
        username: user.username,
    }))
}

/// Exchange a confirmation code for an access token
///
/// The code is not consumed; it keeps working until it expires or the user
/// signs up again.
#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn obtain_token(
    State(app_state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<TokenRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid token input: {}", e);
        HttpError::from_validation(&e)
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(db_error("looking up username"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))?;

    let code_matches = user.confirmation_code.as_deref().is_some_and(|stored| {
        constant_time_eq(stored.as_bytes(), body.confirmation_code.as_bytes())
    });
    if !code_matches {
        return Err(HttpError::validation(
            "confirmation_code",
            ErrorMessage::InvalidConfirmationCode.to_string(),
        ));
    }

    if user
        .code_expires_at
        .is_some_and(|expires_at| expires_at < Utc::now())
    {
        return Err(HttpError::validation(
            "confirmation_code",
            ErrorMessage::ExpiredConfirmationCode.to_string(),
        ));
    }

    let token = token::create_token(
        user.id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Failed to create token: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!("token issued");
    Ok((StatusCode::CREATED, Json(TokenResponseDto { token })))
}
