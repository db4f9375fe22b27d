use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

/// Postgres-backed implementation of every repository trait.
///
/// The trait impls live next to their modules (`catalog::repo`,
/// `recipes::repo`, ...), this is only the shared handle.
#[derive(Clone)]
pub struct PgRepo {
    pub db: PgPool,
}

impl PgRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    Ok(db)
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub fn contains_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn pattern_wraps_and_escapes() {
        assert_eq!(contains_pattern("flour"), "%flour%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern(""), "%%");
    }
}
