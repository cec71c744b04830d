use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::User,
    permissions::{self, Policy},
    utils::token,
};

/// Middleware extension that stores the authenticated user
///
/// Inserted into the request extensions by [`auth`]. Handlers behind it take
/// `Extension(auth): Extension<JWTAuthMiddleware>`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Pull the raw token out of the `access_token` cookie or the
/// `Authorization: Bearer <token>` header, cookie first.
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        })
}

/// Authentication middleware that validates JWT tokens
///
/// 1. Extracts the token from the cookie or the Authorization header
/// 2. Validates and decodes it
/// 3. Loads the user it was issued for
/// 4. Attaches the user to the request extensions
///
/// # Errors
/// 401 when no token is provided, the token is invalid or expired, or the
/// user no longer exists.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user_id = token::decode_token(&token, app_state.env.jwt_secret.as_bytes())?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user {} for token: {}", user_id, e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

/// Collection-level permission middleware
///
/// Evaluates `policies` against the request method and the user that
/// [`auth`] attached, if any. Must run after `auth` on routes that need an
/// actor. Object-level checks happen in the handlers once the object is loaded.
///
/// # Errors
/// 401 for an anonymous request the policies deny, 403 otherwise.
pub async fn policy_check(
    req: Request,
    next: Next,
    policies: &'static [Policy],
) -> Result<impl IntoResponse, HttpError> {
    let actor = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .map(|auth| &auth.user);

    permissions::authorize(policies, req.method(), actor, None)?;

    Ok(next.run(req).await)
}
