use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name -> list of messages, the shape validation failures are reported in
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error response structure sent to clients
///
/// Example JSON response:
/// ```json
/// {
///   "status": "fail",
///   "message": "Validation failed",
///   "errors": { "year": ["Year of release cannot be in the future"] }
/// }
/// ```
///
/// `errors` is only present for validation failures. Everything else carries
/// just the human-readable message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Client-facing messages shared by several handlers
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    UserNoLongerExist,

    // Authorization errors
    PermissionDenied,

    // Validation errors
    ValidationFailed,
    ReservedUsername,
    EmailMismatch,
    UsernameMismatch,
    InvalidConfirmationCode,
    ExpiredConfirmationCode,
    DuplicateReview,
    FutureYear,

    // Lookups
    UserNotFound,
    TitleNotFound,
    CategoryNotFound,
    GenreNotFound,
    ReviewNotFound,
    CommentNotFound,

    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::InvalidToken => "Token is invalid or expired",
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token",
            ErrorMessage::UserNotAuthenticated => "Authentication required. Please log in.",
            ErrorMessage::UserNoLongerExist => "User belonging to this token no longer exists",
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action",
            ErrorMessage::ValidationFailed => "Validation failed",
            ErrorMessage::ReservedUsername => "The username \"me\" is reserved",
            ErrorMessage::EmailMismatch => {
                "This username is already registered with a different email"
            }
            ErrorMessage::UsernameMismatch => {
                "This email is already registered with a different username"
            }
            ErrorMessage::InvalidConfirmationCode => "Invalid confirmation code",
            ErrorMessage::ExpiredConfirmationCode => {
                "Confirmation code has expired, please sign up again to get a new one"
            }
            ErrorMessage::DuplicateReview => "You can only leave one review per title",
            ErrorMessage::FutureYear => "Year of release cannot be in the future",
            ErrorMessage::UserNotFound => "User not found",
            ErrorMessage::TitleNotFound => "Title not found",
            ErrorMessage::CategoryNotFound => "Category not found",
            ErrorMessage::GenreNotFound => "Genre not found",
            ErrorMessage::ReviewNotFound => "Review not found",
            ErrorMessage::CommentNotFound => "Comment not found",
            ErrorMessage::ServerError => "Server Error. Please try again later",
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error side into a
/// JSON response through the `IntoResponse` impl below. The status code is
/// bundled with the message so the two cannot drift apart.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub errors: Option<FieldErrors>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: None,
        }
    }

    /// 500. Database failures, mail transport failures and the like.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 without a field mapping
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// 400 with a single `field: [message]` entry
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.clone()]);
        HttpError {
            message,
            status: StatusCode::BAD_REQUEST,
            errors: Some(errors),
        }
    }

    /// 400 with the full mapping produced by `validator`
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({})", e.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        HttpError {
            message: ErrorMessage::ValidationFailed.to_string(),
            status: StatusCode::BAD_REQUEST,
            errors: Some(fields),
        }
    }

    /// 401. Despite the status name this means "unauthenticated".
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403. Authenticated, but the permission policy denied the action.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message,
            errors: self.errors,
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Request bodies that fail to parse are validation failures too: 400 with
/// the offending field when serde names one.
impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        let (field, message) = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                body_error_field(&rejection.body_text())
            }
            _ => ("non_field_errors".to_string(), rejection.body_text()),
        };
        let mut errors = FieldErrors::new();
        errors.insert(field, vec![message]);
        HttpError {
            message: ErrorMessage::ValidationFailed.to_string(),
            status: StatusCode::BAD_REQUEST,
            errors: Some(errors),
        }
    }
}

/// Split axum's deserialization text into `(field, message)`.
///
/// The text looks like `Failed to deserialize ...: missing field `year` at ...`
/// or `Failed to deserialize ...: score: invalid type: ...`.
fn body_error_field(text: &str) -> (String, String) {
    let detail = text.split_once("target type: ").map_or(text, |(_, rest)| rest);

    if let Some(rest) = detail.strip_prefix("missing field `") {
        if let Some((field, _)) = rest.split_once('`') {
            return (field.to_string(), "This field is required".to_string());
        }
    }

    if let Some((path, message)) = detail.split_once(": ") {
        let is_path = !path.is_empty()
            && path
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
        if is_path {
            return (path.to_string(), message.to_string());
        }
    }

    ("non_field_errors".to_string(), detail.to_string())
}

/// True when the database rejected a write because of a UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
