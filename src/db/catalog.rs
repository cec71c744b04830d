use super::{DBClient, contains_pattern, offset};
use crate::models::CatalogEntry;

/// The two slug-identified reference tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Categories,
    Genres,
}

impl CatalogTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogTable::Categories => "categories",
            CatalogTable::Genres => "genres",
        }
    }
}

/// Category / Genre database operations
pub trait CatalogExt {
    async fn get_entries(
        &self,
        table: CatalogTable,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<CatalogEntry>, sqlx::Error>;

    async fn get_entry_count(
        &self,
        table: CatalogTable,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error>;

    async fn get_entry(
        &self,
        table: CatalogTable,
        slug: &str,
    ) -> Result<Option<CatalogEntry>, sqlx::Error>;

    async fn create_entry(
        &self,
        table: CatalogTable,
        name: &str,
        slug: &str,
    ) -> Result<CatalogEntry, sqlx::Error>;

    /// Deleting a category leaves its titles uncategorised; deleting a genre
    /// detaches it from its titles.
    async fn delete_entry(&self, table: CatalogTable, slug: &str) -> Result<(), sqlx::Error>;
}

impl CatalogExt for DBClient {
    async fn get_entries(
        &self,
        table: CatalogTable,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<CatalogEntry>, sqlx::Error> {
        // Table names can't be bound, only interpolated; they come from the enum above.
        let query = format!(
            r#"
            SELECT id, name, slug FROM {}
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
            table.as_str()
        );

        sqlx::query_as(&query)
            .bind(search.map(contains_pattern))
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool)
            .await
    }

    async fn get_entry_count(
        &self,
        table: CatalogTable,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\\')",
            table.as_str()
        );

        sqlx::query_scalar(&query)
            .bind(search.map(contains_pattern))
            .fetch_one(&self.pool)
            .await
    }

    async fn get_entry(
        &self,
        table: CatalogTable,
        slug: &str,
    ) -> Result<Option<CatalogEntry>, sqlx::Error> {
        let query = format!("SELECT id, name, slug FROM {} WHERE slug = $1", table.as_str());

        sqlx::query_as(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_entry(
        &self,
        table: CatalogTable,
        name: &str,
        slug: &str,
    ) -> Result<CatalogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            table.as_str()
        );

        sqlx::query_as(&query)
            .bind(name)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_entry(&self, table: CatalogTable, slug: &str) -> Result<(), sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE slug = $1", table.as_str());

        let result = sqlx::query(&query)
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
