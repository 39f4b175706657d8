use anyhow::Result;
use sqlx::SqlitePool;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Apply every `migrations/*.sql` file in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir("migrations")?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());
    for e in entries {
        let p = e.path();
        if p.extension().and_then(|s| s.to_str()) == Some("sql") {
            let sql = fs::read_to_string(&p)?;
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    Ok(())
}

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Accept forms: sqlite:foo.db, sqlite://foo.db, file:foo.db, or a bare path.
pub fn normalize_sqlite_url(input: &str) -> String {
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if input.starts_with("sqlite:") {
        let rest = input.trim_start_matches("sqlite:");
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if input.starts_with("file:") {
        return format!("sqlite://{}", input.trim_start_matches("file:"));
    }
    format!("sqlite://{}", input)
}

/// File path behind a sqlite:// URL, or None for in-memory databases.
pub fn db_file_path(url: &str) -> Option<std::path::PathBuf> {
    if let Some(rest) = url.strip_prefix("sqlite://") {
        if rest == ":memory:" {
            return None;
        }
        return Some(std::path::PathBuf::from(rest));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("foo.db"), "sqlite://foo.db");
        assert_eq!(normalize_sqlite_url("sqlite:foo.db"), "sqlite://foo.db");
        assert_eq!(normalize_sqlite_url("sqlite://foo.db"), "sqlite://foo.db");
        assert_eq!(normalize_sqlite_url("file:foo.db"), "sqlite://foo.db");
    }

    #[test]
    fn memory_url_has_no_file_path() {
        assert!(db_file_path("sqlite://:memory:").is_none());
        assert_eq!(
            db_file_path("sqlite://a.db"),
            Some(std::path::PathBuf::from("a.db"))
        );
    }
}
