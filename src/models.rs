use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// User role enumeration for role-based access control
///
/// Stored in PostgreSQL as the `user_role` ENUM, lowercase on both the wire
/// and the database side (`Admin` <-> "admin").
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }
}

/// User model representing the users table
///
/// `confirmation_code` is the secret mailed on signup; it is `None` for
/// accounts an admin created that never went through signup.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
    pub is_staff: bool,
    pub confirmation_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_moderator(&self) -> bool {
        self.role == UserRole::Moderator
    }
}

/// Category or Genre row. Both tables share the same shape: a display name
/// and a unique slug that identifies the entry in URLs.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Title row joined with its category and the aggregated review score.
///
/// `rating` is `AVG(reviews.score)`; it is computed per query and is `None`
/// when the title has no reviews.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: String,
    pub rating: Option<f64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

/// One genre attached to a title (row of genre_title joined with genres)
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct TitleGenre {
    pub title_id: i64,
    pub name: String,
    pub slug: String,
}

/// Review joined with its author's username
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

/// Comment joined with its author's username
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub review_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: UserRole) -> User {
        User {
            id: 1,
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role,
            is_staff: false,
            confirmation_code: None,
            code_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn capabilities_follow_role() {
        let admin = user_with_role(UserRole::Admin);
        assert!(admin.is_admin());
        assert!(!admin.is_moderator());

        let moderator = user_with_role(UserRole::Moderator);
        assert!(moderator.is_moderator());
        assert!(!moderator.is_admin());

        let user = user_with_role(UserRole::User);
        assert!(!user.is_admin());
        assert!(!user.is_moderator());
    }

    #[test]
    fn role_uses_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&UserRole::Moderator).unwrap(), "\"moderator\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
        assert!(serde_json::from_str::<UserRole>("\"superuser\"").is_err());
        assert_eq!(UserRole::default(), UserRole::User);
    }
}
