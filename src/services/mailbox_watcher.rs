//! Mailbox watcher: fixed-interval polling plus an IMAP IDLE listener.
//!
//! Both triggers funnel into the same pass routine. A pass enumerates
//! recent UIDs, keeps the ones received today, downloads bodies for
//! unseen UIDs and hands them to the ingestion coordinator. The polling
//! connection is held across passes and re-established only after a
//! failed pass. Passes never overlap: a trigger landing mid-pass is
//! coalesced away, the next tick picks up whatever it would have found.

use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::imap::conn::{self, ImapSession};
use crate::services::ingest_service::IngestService;

/// UIDs per FETCH command when enumerating headers.
const FETCH_CHUNK: usize = 50;

pub struct MailboxWatcher {
    config: Arc<Config>,
    ingest: Arc<IngestService>,
    /// Live polling connection, reused across passes. Doubles as the
    /// pass guard: a trigger that cannot take the lock is coalesced.
    session: Mutex<Option<ImapSession>>,
    new_mail: Notify,
}

impl MailboxWatcher {
    pub fn new(config: Arc<Config>, ingest: Arc<IngestService>) -> Arc<Self> {
        Arc::new(Self {
            config,
            ingest,
            session: Mutex::new(None),
            new_mail: Notify::new(),
        })
    }

    /// Drive the watcher until `shutdown` flips. Runs one pass
    /// immediately, then on every poll tick and every IDLE push.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let idle_task = tokio::spawn(Arc::clone(&self).idle_loop(shutdown.clone()));
        let interval = Duration::from_secs(self.config.poll_interval_secs);

        info!(interval_secs = self.config.poll_interval_secs, "mailbox watcher started");
        loop {
            self.run_pass_coalesced().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.new_mail.notified() => {
                    debug!("new-mail push, checking early");
                }
                _ = shutdown.changed() => break,
            }
        }

        idle_task.await.ok();
        if let Some(mut session) = self.session.lock().await.take() {
            session.logout().await.ok();
        }
        info!("mailbox watcher stopped");
    }

    async fn run_pass_coalesced(&self) {
        let Ok(mut slot) = self.session.try_lock() else {
            debug!("pass already running, trigger coalesced");
            return;
        };
        if let Err(e) = self.run_pass(&mut slot).await {
            warn!(error = %e, "mailbox pass failed, will reconnect");
            // Drop the broken connection; the next tick dials fresh.
            if let Some(mut session) = slot.take() {
                session.logout().await.ok();
            }
        }
    }

    /// One pass over the held connection, dialing first when none
    /// exists yet or the previous pass tore it down.
    async fn run_pass(&self, slot: &mut Option<ImapSession>) -> Result<()> {
        if slot.is_none() {
            *slot = Some(conn::connect(&self.config).await?);
            info!("mailbox connection established");
        }
        let Some(session) = slot.as_mut() else {
            return Ok(());
        };
        // Re-select so a long-held session sees what arrived since the
        // last pass.
        session
            .select("INBOX")
            .await
            .map_err(|e| IngestError::Connection(format!("select INBOX: {e}")))?;
        self.scan_inbox(session).await
    }

    async fn scan_inbox(&self, session: &mut ImapSession) -> Result<()> {
        let uids = session
            .uid_search("ALL")
            .await
            .map_err(|e| IngestError::Connection(format!("uid search: {e}")))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();

        // Cap the enumeration at the most recent N messages.
        let start = uids.len().saturating_sub(self.config.max_messages_per_pass);
        let recent = &uids[start..];
        if recent.is_empty() {
            return Ok(());
        }

        let today = Local::now().date_naive();
        let mut candidates: Vec<u32> = Vec::new();
        for chunk in recent.chunks(FETCH_CHUNK) {
            let set = chunk
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let mut fetches = session
                .uid_fetch(&set, "(UID INTERNALDATE)")
                .await
                .map_err(|e| IngestError::Connection(format!("uid fetch: {e}")))?;
            while let Some(fetch) = fetches.next().await {
                let fetch =
                    fetch.map_err(|e| IngestError::Connection(format!("fetch item: {e}")))?;
                let Some(uid) = fetch.uid else { continue };
                if received_today(fetch.internal_date(), today) {
                    candidates.push(uid);
                }
            }
        }

        let unseen: Vec<u32> = candidates
            .into_iter()
            .filter(|uid| !self.ingest.already_seen(*uid))
            .collect();
        if unseen.is_empty() {
            return Ok(());
        }
        info!(count = unseen.len(), "new messages to ingest");

        for uid in unseen {
            match fetch_body(session, uid).await {
                Ok(Some(raw)) => self.ingest.ingest_raw(uid, &raw).await,
                Ok(None) => {
                    warn!(uid, "fetch returned no body");
                    self.ingest.mark_seen(uid);
                }
                Err(e) => {
                    warn!(uid, error = %e, "body download failed");
                    self.ingest.mark_seen(uid);
                }
            }
        }

        Ok(())
    }

    /// Keep an IDLE session open and nudge the poll loop whenever the
    /// server reports mailbox changes. Reconnects after errors and
    /// leaves the protocol session cleanly on shutdown.
    async fn idle_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let retry = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.idle_session(&mut shutdown).await {
                Ok(()) => debug!("idle session ended"),
                Err(e) => warn!(error = %e, "idle session failed"),
            }
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// One IDLE cycle: wait for the server to break the silence, then
    /// compare message counts to decide whether to trigger a pass. A
    /// shutdown mid-wait still runs DONE and LOGOUT before returning.
    async fn idle_session(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let mut session = conn::connect(&self.config).await?;
        let mailbox = session
            .select("INBOX")
            .await
            .map_err(|e| IngestError::Connection(format!("select INBOX: {e}")))?;
        let before = mailbox.exists;

        let mut idle = session.idle();
        idle.init()
            .await
            .map_err(|e| IngestError::Connection(format!("idle init: {e}")))?;
        let (wait, interrupt) = idle.wait();
        tokio::select! {
            outcome = wait => {
                outcome.map_err(|e| IngestError::Connection(format!("idle wait: {e}")))?;
            }
            _ = shutdown.changed() => {
                drop(interrupt);
            }
        }

        let mut session = idle
            .done()
            .await
            .map_err(|e| IngestError::Connection(format!("idle done: {e}")))?;

        if !*shutdown.borrow() {
            let mailbox = session
                .select("INBOX")
                .await
                .map_err(|e| IngestError::Connection(format!("reselect INBOX: {e}")))?;
            if mailbox.exists != before {
                debug!(before, after = mailbox.exists, "mailbox changed during idle");
                self.new_mail.notify_one();
            }
        }
        session.logout().await.ok();
        Ok(())
    }
}

async fn fetch_body(session: &mut ImapSession, uid: u32) -> Result<Option<Vec<u8>>> {
    let mut fetches = session
        .uid_fetch(&uid.to_string(), "BODY.PEEK[]")
        .await
        .map_err(|e| IngestError::Connection(format!("body fetch: {e}")))?;
    let mut body = None;
    while let Some(fetch) = fetches.next().await {
        let fetch = fetch.map_err(|e| IngestError::Connection(format!("body item: {e}")))?;
        if let Some(bytes) = fetch.body() {
            body = Some(bytes.to_vec());
        }
    }
    Ok(body)
}

/// A message counts as today's when its server timestamp falls on the
/// local calendar day. Messages with no parsable date are included
/// rather than silently dropped.
fn received_today(internal_date: Option<DateTime<FixedOffset>>, today: NaiveDate) -> bool {
    match internal_date {
        Some(date) => date.with_timezone(&Local).date_naive() == today,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attachment_pipeline::AttachmentPipeline;
    use crate::services::notifier::Notifier;
    use crate::store::EmailStore;
    use chrono::TimeZone;
    use sqlx::SqlitePool;

    fn unreachable_config(uploads: &std::path::Path) -> Config {
        Config {
            database_url: "sqlite::memory:".into(),
            imap_host: "127.0.0.1".into(),
            // Nothing listens here; connects fail immediately.
            imap_port: 1,
            imap_user: "u".into(),
            imap_password: "p".into(),
            uploads_dir: uploads.to_path_buf(),
            poll_interval_secs: 10,
            max_messages_per_pass: 300,
            ocr_min_text_chars: 50,
            dob_year_min: 1940,
            dob_year_max: 2005,
            http_port: 5000,
        }
    }

    async fn watcher(uploads: &std::path::Path) -> Arc<MailboxWatcher> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(include_str!("../../migrations/0001_emails.sql"))
            .execute(&pool)
            .await
            .unwrap();
        let config = Arc::new(unreachable_config(uploads));
        let ingest = Arc::new(IngestService::new(
            EmailStore::new(pool),
            AttachmentPipeline::new(&config),
            Notifier::default(),
        ));
        MailboxWatcher::new(config, ingest)
    }

    #[tokio::test]
    async fn failed_pass_holds_no_connection() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher(dir.path()).await;
        watcher.run_pass_coalesced().await;
        assert!(watcher.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn trigger_during_active_pass_is_coalesced() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher(dir.path()).await;
        // While a pass owns the session slot, a second trigger must
        // return without dialing out.
        let active = watcher.session.lock().await;
        watcher.run_pass_coalesced().await;
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn idle_loop_exits_once_shutdown_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher(dir.path()).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).ok();
        Arc::clone(&watcher).idle_loop(rx).await;
    }

    #[tokio::test]
    async fn run_stops_cleanly_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher(dir.path()).await;
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&watcher).run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).ok();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watcher did not stop")
            .unwrap();
        assert!(watcher.session.lock().await.is_none());
    }

    #[test]
    fn todays_timestamp_is_kept() {
        let today = Local::now().date_naive();
        let now = Local::now().fixed_offset();
        assert!(received_today(Some(now), today));
    }

    #[test]
    fn old_timestamp_is_filtered() {
        let today = Local::now().date_naive();
        let old = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 12, 0, 0)
            .unwrap();
        assert!(!received_today(Some(old), today));
    }

    #[test]
    fn missing_timestamp_is_kept() {
        assert!(received_today(None, Local::now().date_naive()));
    }

    #[test]
    fn day_boundary_is_exact() {
        let today = Local::now().date_naive();
        let end_of_day = Local
            .from_local_datetime(&today.and_hms_opt(23, 59, 59).unwrap())
            .single()
            .unwrap()
            .fixed_offset();
        let next_day = Local
            .from_local_datetime(
                &(today + chrono::Days::new(1)).and_hms_opt(0, 0, 1).unwrap(),
            )
            .single()
            .unwrap()
            .fixed_offset();

        // Two seconds apart, but on different calendar days.
        assert!(received_today(Some(end_of_day), today));
        assert!(!received_today(Some(next_day), today));
    }
}
