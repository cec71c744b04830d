use super::{DBClient, contains_pattern, offset};
use crate::dtos::TitleFilterQuery;
use crate::models::{TitleGenre, TitleRow};

// Rating is aggregated on every read; nothing is denormalised onto titles.
const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description,
           AVG(r.score)::float8 AS rating,
           c.name AS category_name, c.slug AS category_slug
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    LEFT JOIN reviews r ON r.title_id = t.id
"#;

const TITLE_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR c.slug = $1)
      AND ($2::text IS NULL OR EXISTS (
            SELECT 1 FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = t.id AND g.slug = $2))
      AND ($3::text IS NULL OR t.name ILIKE $3 ESCAPE '\')
      AND ($4::int IS NULL OR t.year = $4)
"#;

/// Fields written by create/update. `None` leaves a column untouched on update.
#[derive(Debug, Default)]
pub struct TitleChanges<'a> {
    pub name: Option<&'a str>,
    pub year: Option<i32>,
    pub description: Option<&'a str>,
    pub category_id: Option<i64>,
    /// replaces the title's genres when present; unknown slugs are skipped
    pub genre_slugs: Option<&'a [String]>,
}

/// Title database operations trait
pub trait TitleExt {
    async fn get_titles(
        &self,
        filter: &TitleFilterQuery,
        page: i64,
        limit: i64,
    ) -> Result<Vec<TitleRow>, sqlx::Error>;

    async fn get_title_count(&self, filter: &TitleFilterQuery) -> Result<i64, sqlx::Error>;

    async fn get_title(&self, title_id: i64) -> Result<Option<TitleRow>, sqlx::Error>;

    /// Genres for a batch of titles, so a page is assembled with two queries
    async fn get_title_genres(&self, title_ids: &[i64]) -> Result<Vec<TitleGenre>, sqlx::Error>;

    async fn title_exists(&self, title_id: i64) -> Result<bool, sqlx::Error>;

    /// Insert the title and its genre links in one transaction, returning the new id
    async fn create_title(&self, title: TitleChanges<'_>) -> Result<i64, sqlx::Error>;

    async fn update_title(&self, title_id: i64, changes: TitleChanges<'_>)
    -> Result<(), sqlx::Error>;

    /// Deleting a title removes its reviews, their comments and its genre links
    async fn delete_title(&self, title_id: i64) -> Result<(), sqlx::Error>;
}

impl TitleExt for DBClient {
    async fn get_titles(
        &self,
        filter: &TitleFilterQuery,
        page: i64,
        limit: i64,
    ) -> Result<Vec<TitleRow>, sqlx::Error> {
        let query = format!(
            "{TITLE_SELECT} {TITLE_FILTER} GROUP BY t.id, c.name, c.slug ORDER BY t.id LIMIT $5 OFFSET $6"
        );

        sqlx::query_as(&query)
            .bind(filter.category.as_deref())
            .bind(filter.genre.as_deref())
            .bind(filter.name.as_deref().map(contains_pattern))
            .bind(filter.year)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool)
            .await
    }

    async fn get_title_count(&self, filter: &TitleFilterQuery) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id {TITLE_FILTER}"
        );

        sqlx::query_scalar(&query)
            .bind(filter.category.as_deref())
            .bind(filter.genre.as_deref())
            .bind(filter.name.as_deref().map(contains_pattern))
            .bind(filter.year)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_title(&self, title_id: i64) -> Result<Option<TitleRow>, sqlx::Error> {
        let query = format!("{TITLE_SELECT} WHERE t.id = $1 GROUP BY t.id, c.name, c.slug");

        sqlx::query_as(&query)
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_title_genres(&self, title_ids: &[i64]) -> Result<Vec<TitleGenre>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT gt.title_id, g.name, g.slug
            FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = ANY($1)
            ORDER BY g.id
            "#,
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn title_exists(&self, title_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM titles WHERE id = $1)")
            .bind(title_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_title(&self, title: TitleChanges<'_>) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let title_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO titles (name, year, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(title.name.unwrap_or_default())
        .bind(title.year.unwrap_or_default())
        .bind(title.description.unwrap_or_default())
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(slugs) = title.genre_slugs {
            link_genres(&mut tx, title_id, slugs).await?;
        }

        tx.commit().await?;
        Ok(title_id)
    }

    async fn update_title(
        &self,
        title_id: i64,
        changes: TitleChanges<'_>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE titles
            SET name = COALESCE($1, name),
                year = COALESCE($2, year),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id)
            WHERE id = $5
            "#,
        )
        .bind(changes.name)
        .bind(changes.year)
        .bind(changes.description)
        .bind(changes.category_id)
        .bind(title_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        if let Some(slugs) = changes.genre_slugs {
            sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;
            link_genres(&mut tx, title_id, slugs).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_title(&self, title_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

async fn link_genres(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    title_id: i64,
    slugs: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO genre_title (title_id, genre_id)
        SELECT $1, id FROM genres WHERE slug = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(title_id)
    .bind(slugs)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
