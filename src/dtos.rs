use crate::error::ErrorMessage;
use crate::models::{CatalogEntry, Comment, Review, TitleGenre, TitleRow, User, UserRole};
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

// DTOs define the structure of data exchanged with clients. They are kept
// apart from the row types in models.rs so that nothing leaks by accident
// (confirmation codes, staff flags, internal ids).

pub static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

pub static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));

pub const RESERVED_USERNAME: &str = "me";

fn validate_not_me(username: &str) -> Result<(), ValidationError> {
    if username == RESERVED_USERNAME {
        return Err(ValidationError::new("reserved_username")
            .with_message(ErrorMessage::ReservedUsername.to_string().into()));
    }
    Ok(())
}

/// A release year may not lie in the future
pub fn validate_year(year: i32) -> Result<(), ValidationError> {
    if year > Utc::now().year() {
        return Err(ValidationError::new("future_year")
            .with_message(ErrorMessage::FutureYear.to_string().into()));
    }
    Ok(())
}

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request: a confirmation code is mailed to `email`
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupDto {
    #[validate(
        length(min = 1, max = 254, message = "Email must be between 1 and 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_me")
    )]
    pub username: String,
}

/// Token request: exchange the mailed code for an access token
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenRequestDto {
    #[validate(length(min = 1, max = 150, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, max = 50, message = "Confirmation code is required"))]
    pub confirmation_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationDto {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        PaginationDto {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Paginated list response shared by every collection endpoint
#[derive(Debug, Serialize)]
pub struct ListResponseDto<T> {
    pub status: String,
    pub data: Vec<T>,
    pub pagination: PaginationDto,
}

impl<T> ListResponseDto<T> {
    pub fn success(data: Vec<T>, page: i64, limit: i64, total: i64) -> Self {
        ListResponseDto {
            status: "success".to_string(),
            data,
            pagination: PaginationDto::new(page, limit, total),
        }
    }
}

/// Single object response
#[derive(Debug, Serialize)]
pub struct SingleResponseDto<T> {
    pub status: String,
    pub data: T,
}

impl<T> SingleResponseDto<T> {
    pub fn success(data: T) -> Self {
        SingleResponseDto {
            status: "success".to_string(),
            data,
        }
    }
}

/// Generic page/limit query
#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10)
    }
}

/// page/limit plus a name (or username) substring
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    pub search: Option<String>,
}

impl SearchQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10)
    }
}

/// Title list filters
#[derive(Debug, Deserialize, Validate)]
pub struct TitleFilterQuery {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    /// category slug
    pub category: Option<String>,
    /// genre slug
    pub genre: Option<String>,
    /// name substring
    pub name: Option<String>,
    pub year: Option<i32>,
}

impl TitleFilterQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10)
    }
}

// ============================================================================
// User DTOs
// ============================================================================

/// User data sent to clients (no confirmation code, no staff flag)
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: String,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            bio: user.bio.to_owned(),
            role: user.role.to_str().to_string(),
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

/// Admin user creation
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_me")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "Email must be between 1 and 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: String,

    #[serde(default)]
    pub bio: String,

    #[serde(default)]
    pub role: UserRole,
}

/// Partial profile update (admin PATCH /users/{username} and PATCH /users/me)
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain only letters, digits and @/./+/-/_"),
        custom(function = "validate_not_me")
    )]
    pub username: Option<String>,

    #[validate(
        length(min = 1, max = 254, message = "Email must be between 1 and 254 characters"),
        email(message = "Email is invalid")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

// ============================================================================
// Catalog DTOs
// ============================================================================

/// Category / Genre as clients see it (and send it)
#[derive(Validate, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntryDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"),
        regex(path = *SLUG_RE, message = "Slug may contain only letters, digits, - and _")
    )]
    pub slug: String,
}

impl From<&CatalogEntry> for CatalogEntryDto {
    fn from(entry: &CatalogEntry) -> Self {
        CatalogEntryDto {
            name: entry.name.clone(),
            slug: entry.slug.clone(),
        }
    }
}

#[derive(Validate, Debug, Deserialize)]
pub struct CreateTitleDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_year"))]
    pub year: i32,

    #[serde(default)]
    pub description: String,

    /// category slug
    pub category: String,

    /// genre slugs; unknown slugs are ignored
    #[serde(default)]
    pub genre: Vec<String>,
}

#[derive(Validate, Debug, Deserialize)]
pub struct UpdateTitleDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_year"))]
    pub year: Option<i32>,

    pub description: Option<String>,

    pub category: Option<String>,

    pub genre: Option<Vec<String>>,
}

/// Title as clients see it. `rating` is always computed, never accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct TitleDto {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: String,
    pub category: Option<CatalogEntryDto>,
    pub genre: Vec<CatalogEntryDto>,
}

impl TitleDto {
    /// Assemble a title from its row and the genre rows fetched for a batch
    /// of titles (rows for other titles are skipped).
    pub fn assemble(row: TitleRow, genres: &[TitleGenre]) -> Self {
        let category = match (row.category_name, row.category_slug) {
            (Some(name), Some(slug)) => Some(CatalogEntryDto { name, slug }),
            _ => None,
        };
        let genre = genres
            .iter()
            .filter(|g| g.title_id == row.id)
            .map(|g| CatalogEntryDto {
                name: g.name.clone(),
                slug: g.slug.clone(),
            })
            .collect();

        TitleDto {
            id: row.id,
            name: row.name,
            year: row.year,
            rating: row.rating,
            description: row.description,
            category,
            genre,
        }
    }
}

// ============================================================================
// Review & Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10"))]
    pub score: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10"))]
    pub score: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        ReviewDto {
            id: review.id,
            text: review.text,
            author: review.author_username,
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InputCommentDto {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Text must be between 1 and 1000 characters"
    ))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        CommentDto {
            id: comment.id,
            text: comment.text,
            author: comment.author_username,
            pub_date: comment.pub_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_up_to_the_current_one_is_accepted() {
        let this_year = Utc::now().year();
        assert!(validate_year(this_year).is_ok());
        assert!(validate_year(1895).is_ok());

        let err = validate_year(this_year + 1).unwrap_err();
        assert_eq!(err.code, "future_year");
    }

    #[test]
    fn title_with_future_year_fails_on_year_field() {
        let body = CreateTitleDto {
            name: "Tomorrow".to_string(),
            year: Utc::now().year() + 1,
            description: String::new(),
            category: "film".to_string(),
            genre: vec![],
        };
        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("year"));
    }

    #[test]
    fn signup_rejects_reserved_and_malformed_usernames() {
        let me = SignupDto {
            email: "me@example.com".to_string(),
            username: "me".to_string(),
        };
        assert!(me.validate().unwrap_err().field_errors().contains_key("username"));

        let spaced = SignupDto {
            email: "a@example.com".to_string(),
            username: "two words".to_string(),
        };
        assert!(spaced.validate().is_err());

        let ok = SignupDto {
            email: "reader@example.com".to_string(),
            username: "reader.one+two@x-y_z".to_string(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn signup_requires_a_valid_email() {
        let body = SignupDto {
            email: "not-an-email".to_string(),
            username: "reader".to_string(),
        };
        assert!(body.validate().unwrap_err().field_errors().contains_key("email"));
    }

    #[test]
    fn review_score_is_bounded() {
        let low = CreateReviewDto {
            text: "meh".to_string(),
            score: 0,
        };
        let high = CreateReviewDto {
            text: "wow".to_string(),
            score: 11,
        };
        let fine = CreateReviewDto {
            text: "good".to_string(),
            score: 10,
        };
        assert!(low.validate().is_err());
        assert!(high.validate().is_err());
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn slug_alphabet_is_enforced() {
        let good = CatalogEntryDto {
            name: "Film".to_string(),
            slug: "film_2-a".to_string(),
        };
        let bad = CatalogEntryDto {
            name: "Film".to_string(),
            slug: "фильм".to_string(),
        };
        assert!(good.validate().is_ok());
        assert!(bad.validate().unwrap_err().field_errors().contains_key("slug"));
    }

    #[test]
    fn patch_with_reserved_username_is_rejected() {
        let body = UpdateUserDto {
            username: Some("me".to_string()),
            ..Default::default()
        };
        assert!(body.validate().is_err());
        assert!(UpdateUserDto::default().validate().is_ok());
    }

    #[test]
    fn title_assembly_picks_its_own_genres() {
        let row = TitleRow {
            id: 3,
            name: "Solaris".to_string(),
            year: 1972,
            description: String::new(),
            rating: None,
            category_name: Some("Film".to_string()),
            category_slug: Some("film".to_string()),
        };
        let genres = vec![
            TitleGenre {
                title_id: 3,
                name: "Drama".to_string(),
                slug: "drama".to_string(),
            },
            TitleGenre {
                title_id: 4,
                name: "Comedy".to_string(),
                slug: "comedy".to_string(),
            },
        ];

        let title = TitleDto::assemble(row, &genres);
        assert_eq!(title.genre.len(), 1);
        assert_eq!(title.genre[0].slug, "drama");
        assert_eq!(title.category.unwrap().slug, "film");
        assert!(title.rating.is_none());

        let json = serde_json::to_value(TitleDto::assemble(
            TitleRow {
                id: 5,
                name: "Untitled".to_string(),
                year: 2000,
                description: String::new(),
                rating: Some(7.5),
                category_name: None,
                category_slug: None,
            },
            &[],
        ))
        .unwrap();
        assert_eq!(json["rating"], 7.5);
        assert!(json["category"].is_null());
    }

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(PaginationDto::new(1, 10, 0).total_pages, 0);
        assert_eq!(PaginationDto::new(1, 10, 10).total_pages, 1);
        assert_eq!(PaginationDto::new(2, 10, 11).total_pages, 2);
    }
}
