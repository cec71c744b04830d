use super::{DBClient, contains_pattern, offset};
use crate::dtos::{CreateUserDto, UpdateUserDto};
use crate::models::User;
use chrono::{DateTime, Utc};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, is_staff, \
     confirmation_code, code_expires_at, created_at, updated_at";

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID, username or email
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Paginated list ordered by username, optionally filtered by a username substring
    async fn get_users(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    /// Admin-side creation; no confirmation code is issued
    async fn save_user(&self, user: &CreateUserDto) -> Result<User, sqlx::Error>;

    /// Create the account on first signup or refresh the code of an existing
    /// one. Returns `None` when the username exists with a different email.
    async fn upsert_signup(
        &self,
        username: &str,
        email: &str,
        confirmation_code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Apply the fields present in `changes`. The role is only written when
    /// `allow_role` is set.
    async fn update_user(
        &self,
        user_id: i64,
        changes: &UpdateUserDto,
        allow_role: bool,
    ) -> Result<User, sqlx::Error>;

    /// Delete user by ID; reviews and comments go with it
    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error>;

    /// Null out confirmation codes whose expiry has passed
    async fn clear_expired_codes(&self) -> Result<u64, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            user = sqlx::query_as(&query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(username) = username {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
            user = sqlx::query_as(&query)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
            user = sqlx::query_as(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 ESCAPE '\')
            ORDER BY username
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as(&query)
            .bind(search.map(contains_pattern))
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool)
            .await
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(search.map(contains_pattern))
        .fetch_one(&self.pool)
        .await
    }

    async fn save_user(&self, user: &CreateUserDto) -> Result<User, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, bio, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.bio)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await
    }

    async fn upsert_signup(
        &self,
        username: &str,
        email: &str,
        confirmation_code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error> {
        // A different username on the same email trips the email UNIQUE
        // constraint; a different email on the same username fails the WHERE
        // and returns no row.
        let query = format!(
            r#"
            INSERT INTO users (username, email, confirmation_code, code_expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO UPDATE
                SET confirmation_code = EXCLUDED.confirmation_code,
                    code_expires_at = EXCLUDED.code_expires_at,
                    updated_at = NOW()
                WHERE users.email = EXCLUDED.email
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(username)
            .bind(email)
            .bind(confirmation_code)
            .bind(code_expires_at)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_user(
        &self,
        user_id: i64,
        changes: &UpdateUserDto,
        allow_role: bool,
    ) -> Result<User, sqlx::Error> {
        let role = if allow_role { changes.role } else { None };

        let query = format!(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                bio = COALESCE($5, bio),
                role = COALESCE($6, role),
                updated_at = NOW()
            WHERE id = $7
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(changes.username.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.first_name.as_deref())
            .bind(changes.last_name.as_deref())
            .bind(changes.bio.as_deref())
            .bind(role)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn clear_expired_codes(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET confirmation_code = NULL, code_expires_at = NULL, updated_at = NOW()
            WHERE code_expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
