use super::{DBClient, offset};
use crate::models::Comment;

/// Comment database operations trait
pub trait CommentExt {
    /// Comments on a review, oldest first
    async fn get_comments(
        &self,
        review_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Comment>, sqlx::Error>;

    async fn get_review_comment_count(&self, review_id: i64) -> Result<i64, sqlx::Error>;

    /// A comment, only if it belongs to `review_id`
    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error>;

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error>;

    async fn edit_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comments(
        &self,
        review_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username,
                   c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.review_id = $1
            ORDER BY c.pub_date ASC, c.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(review_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_review_comment_count(&self, review_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = $1")
            .bind(review_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username,
                   c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.id = $1 AND c.review_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            r#"
            WITH new_comment AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT nc.id, nc.review_id, nc.author_id, u.username AS author_username,
                   nc.text, nc.pub_date
            FROM new_comment nc
            JOIN users u ON nc.author_id = u.id
            "#,
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
    }

    async fn edit_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            r#"
            WITH updated_comment AS (
                UPDATE comments
                SET text = $1
                WHERE id = $2
                RETURNING *
            )
            SELECT uc.id, uc.review_id, uc.author_id, u.username AS author_username,
                   uc.text, uc.pub_date
            FROM updated_comment uc
            JOIN users u ON uc.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
