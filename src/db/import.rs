use std::error::Error;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sqlx::{Postgres, Transaction};

use super::DBClient;
use crate::models::UserRole;

pub type ImportError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Shared by category.csv and genre.csv
#[derive(Debug, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct TitleRecord {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub category: Option<i64>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct GenreTitleRecord {
    pub id: i64,
    pub title_id: i64,
    pub genre_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub title_id: i64,
    pub text: String,
    pub author: i64,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub review_id: i64,
    pub text: String,
    pub author: i64,
    pub pub_date: DateTime<Utc>,
}

/// Rows read from each file, in load order
#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub users: usize,
    pub categories: usize,
    pub genres: usize,
    pub titles: usize,
    pub genre_titles: usize,
    pub reviews: usize,
    pub comments: usize,
}

/// Parse every row of a CSV stream with a header line
pub fn read_records<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>, csv::Error> {
    csv::Reader::from_reader(reader).deserialize().collect()
}

fn read_file<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, ImportError> {
    let path = dir.join(file);
    let handle = std::fs::File::open(&path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    read_records(handle).map_err(|e| format!("{}: {e}", path.display()).into())
}

/// Bulk loading of the seed CSV files
pub trait ImportExt {
    /// Load users, categories, genres, titles, genre links, reviews and
    /// comments from `dir`. Rows whose primary key already exists are left
    /// untouched, so a second run changes nothing.
    async fn load_data(&self, dir: &Path) -> Result<ImportSummary, ImportError>;
}

impl ImportExt for DBClient {
    async fn load_data(&self, dir: &Path) -> Result<ImportSummary, ImportError> {
        let users: Vec<UserRecord> = read_file(dir, "users.csv")?;
        let categories: Vec<CatalogRecord> = read_file(dir, "category.csv")?;
        let genres: Vec<CatalogRecord> = read_file(dir, "genre.csv")?;
        let titles: Vec<TitleRecord> = read_file(dir, "titles.csv")?;
        let genre_titles: Vec<GenreTitleRecord> = read_file(dir, "genre_title.csv")?;
        let reviews: Vec<ReviewRecord> = read_file(dir, "review.csv")?;
        let comments: Vec<CommentRecord> = read_file(dir, "comments.csv")?;

        let mut tx = self.pool.begin().await?;

        for user in &users {
            sqlx::query(
                r#"
                INSERT INTO users (id, username, email, role, bio, first_name, last_name)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.role)
            .bind(&user.bio)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&mut *tx)
            .await?;
        }

        insert_catalog(&mut tx, "categories", &categories).await?;
        insert_catalog(&mut tx, "genres", &genres).await?;

        for title in &titles {
            if let Some(category_id) = title.category {
                require(&mut tx, "categories", category_id).await?;
            }
            sqlx::query(
                r#"
                INSERT INTO titles (id, name, year, description, category_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(title.id)
            .bind(&title.name)
            .bind(title.year)
            .bind(&title.description)
            .bind(title.category)
            .execute(&mut *tx)
            .await?;
        }

        for link in &genre_titles {
            sqlx::query(
                r#"
                INSERT INTO genre_title (id, genre_id, title_id)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(link.id)
            .bind(link.genre_id)
            .bind(link.title_id)
            .execute(&mut *tx)
            .await?;
        }

        for review in &reviews {
            require(&mut tx, "users", review.author).await?;
            sqlx::query(
                r#"
                INSERT INTO reviews (id, title_id, author_id, text, score, pub_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(review.id)
            .bind(review.title_id)
            .bind(review.author)
            .bind(&review.text)
            .bind(review.score)
            .bind(review.pub_date)
            .execute(&mut *tx)
            .await?;
        }

        for comment in &comments {
            require(&mut tx, "users", comment.author).await?;
            sqlx::query(
                r#"
                INSERT INTO comments (id, review_id, author_id, text, pub_date)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(comment.id)
            .bind(comment.review_id)
            .bind(comment.author)
            .bind(&comment.text)
            .bind(comment.pub_date)
            .execute(&mut *tx)
            .await?;
        }

        // explicit ids were inserted, move every sequence past them
        for table in [
            "users",
            "categories",
            "genres",
            "titles",
            "genre_title",
            "reviews",
            "comments",
        ] {
            let statement = format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
                 COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)"
            );
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(ImportSummary {
            users: users.len(),
            categories: categories.len(),
            genres: genres.len(),
            titles: titles.len(),
            genre_titles: genre_titles.len(),
            reviews: reviews.len(),
            comments: comments.len(),
        })
    }
}

async fn insert_catalog(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    records: &[CatalogRecord],
) -> Result<(), sqlx::Error> {
    let statement =
        format!("INSERT INTO {table} (id, name, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING");
    for record in records {
        sqlx::query(&statement)
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.slug)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Error out when a referenced primary key is missing
async fn require(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    id: i64,
) -> Result<(), ImportError> {
    let statement = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    let exists: bool = sqlx::query_scalar(&statement)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

    if !exists {
        return Err(format!("{table} row with id {id} does not exist").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_csv_fills_missing_profile_fields() {
        let data = "id,username,email,role,bio,first_name,last_name\n\
                    100,bingobongo,bingobongo@yamdb.fake,user,,,\n\
                    101,capt_obvious,capt_obvious@yamdb.fake,admin,,,\n";
        let users: Vec<UserRecord> = read_records(data.as_bytes()).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "bingobongo");
        assert_eq!(users[1].role, UserRole::Admin);
        assert!(users[0].bio.is_empty());
    }

    #[test]
    fn titles_without_description_column() {
        let data = "id,name,year,category\n1,Побег из Шоушенка,1994,1\n";
        let titles: Vec<TitleRecord> = read_records(data.as_bytes()).unwrap();

        assert_eq!(titles[0].year, 1994);
        assert_eq!(titles[0].category, Some(1));
        assert_eq!(titles[0].description, "");
    }

    #[test]
    fn reviews_parse_timestamps() {
        let data = "id,title_id,text,author,score,pub_date\n\
                    1,1,\"Ничего особенного, но смотреть можно\",100,10,2019-09-24T21:08:21.567Z\n";
        let reviews: Vec<ReviewRecord> = read_records(data.as_bytes()).unwrap();

        assert_eq!(reviews[0].author, 100);
        assert_eq!(reviews[0].score, 10);
        assert_eq!(reviews[0].pub_date.to_rfc3339(), "2019-09-24T21:08:21.567+00:00");
    }

    #[test]
    fn malformed_row_is_an_error() {
        let data = "id,name,slug\nnot-a-number,Фильм,movie\n";
        assert!(read_records::<CatalogRecord, _>(data.as_bytes()).is_err());
    }
}
