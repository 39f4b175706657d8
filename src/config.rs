use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded once from the environment (`.env` supported).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_user: String,
    pub imap_password: String,
    /// Directory where extracted PDF attachments are written.
    pub uploads_dir: PathBuf,
    /// Fixed polling interval for the mailbox watcher.
    pub poll_interval_secs: u64,
    /// Cap on messages enumerated per pass; most recent win beyond this.
    pub max_messages_per_pass: usize,
    /// Below this many non-whitespace characters the text layer is
    /// considered missing and OCR runs. Empirical, not load-bearing.
    pub ocr_min_text_chars: usize,
    /// Plausible birth-year window for the date-of-birth fallback scan.
    pub dob_year_min: i32,
    pub dob_year_max: i32,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let imap_user = env::var("IMAP_USER").context("IMAP_USER must be set")?;
        let imap_password = env::var("IMAP_PASSWORD").context("IMAP_PASSWORD must be set")?;

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://resume_ingest.db".into()),
            imap_host: env::var("IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".into()),
            imap_port: env_parse("IMAP_PORT", 993),
            imap_user,
            imap_password,
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".into()),
            ),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 10),
            max_messages_per_pass: env_parse("MAX_MESSAGES_PER_PASS", 300),
            ocr_min_text_chars: env_parse("OCR_MIN_TEXT_CHARS", 50),
            dob_year_min: env_parse("DOB_YEAR_MIN", 1940),
            dob_year_max: env_parse("DOB_YEAR_MAX", 2005),
            http_port: env_parse("PORT", 5000),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
