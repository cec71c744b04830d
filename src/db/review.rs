use super::{DBClient, offset};
use crate::models::Review;

/// Review database operations trait
pub trait ReviewExt {
    /// Reviews of a title, oldest first
    async fn get_reviews(
        &self,
        title_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Review>, sqlx::Error>;

    async fn get_title_review_count(&self, title_id: i64) -> Result<i64, sqlx::Error>;

    /// A review, only if it belongs to `title_id`
    async fn get_review(&self, title_id: i64, review_id: i64)
    -> Result<Option<Review>, sqlx::Error>;

    async fn has_reviewed(&self, title_id: i64, author_id: i64) -> Result<bool, sqlx::Error>;

    /// Fails with a unique violation when the author already reviewed the title
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: &str,
        score: i32,
    ) -> Result<Review, sqlx::Error>;

    async fn edit_review(
        &self,
        review_id: i64,
        text: Option<&str>,
        score: Option<i32>,
    ) -> Result<Review, sqlx::Error>;

    /// Deleting a review removes its comments
    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_reviews(
        &self,
        title_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT r.id, r.title_id, r.author_id, u.username AS author_username,
                   r.text, r.score, r.pub_date
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.title_id = $1
            ORDER BY r.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(title_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_title_review_count(&self, title_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
            .bind(title_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT r.id, r.title_id, r.author_id, u.username AS author_username,
                   r.text, r.score, r.pub_date
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.id = $1 AND r.title_id = $2
            "#,
        )
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_reviewed(&self, title_id: i64, author_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE title_id = $1 AND author_id = $2)",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: &str,
        score: i32,
    ) -> Result<Review, sqlx::Error> {
        // CTE inserts and returns the review together with the author's username
        sqlx::query_as(
            r#"
            WITH new_review AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT nr.id, nr.title_id, nr.author_id, u.username AS author_username,
                   nr.text, nr.score, nr.pub_date
            FROM new_review nr
            JOIN users u ON nr.author_id = u.id
            "#,
        )
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_review(
        &self,
        review_id: i64,
        text: Option<&str>,
        score: Option<i32>,
    ) -> Result<Review, sqlx::Error> {
        // pub_date is fixed at creation and never rewritten
        sqlx::query_as(
            r#"
            WITH updated_review AS (
                UPDATE reviews
                SET text = COALESCE($1, text), score = COALESCE($2, score)
                WHERE id = $3
                RETURNING *
            )
            SELECT ur.id, ur.title_id, ur.author_id, u.username AS author_username,
                   ur.text, ur.score, ur.pub_date
            FROM updated_review ur
            JOIN users u ON ur.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(score)
        .bind(review_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
