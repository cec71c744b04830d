use sqlx::{Pool, Postgres};

pub mod scheduler;

mod user;
pub use user::UserExt;

mod catalog;
pub use catalog::{CatalogExt, CatalogTable};

mod title;
pub use title::{TitleChanges, TitleExt};

mod review;
pub use review::ReviewExt;

mod comment;
pub use comment::CommentExt;

mod import;
pub use import::ImportExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// OFFSET for a 1-based page number, clamped instead of overflowing
pub(crate) fn offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit)
}

/// `ILIKE` pattern matching `needle` anywhere, with `\`, `%` and `_` taken
/// literally. Queries using it must say `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
