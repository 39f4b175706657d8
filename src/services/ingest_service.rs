//! Ingestion coordinator: one entry point per fetched message.
//!
//! The in-memory seen set is an optimization to skip repeat downloads
//! within a process lifetime; the UNIQUE key on `email_id` is what
//! actually guarantees at-most-one record per message. UIDs are marked
//! seen whether or not their ingestion succeeds, so a poisoned message
//! is attempted once and never again until restart.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mail::decoder::decode_message;
use crate::models::email::{MailRecord, NewMailRecord};
use crate::services::attachment_pipeline::{AttachmentPipeline, PipelineOutcome};
use crate::services::notifier::{Notifier, MSG_NEW, MSG_NEW_WITH_PDF, MSG_UPDATED};
use crate::store::EmailStore;

/// Bounded capacity for the seen-UID cache. Old entries falling out is
/// harmless, the database constraint still rejects duplicates.
const SEEN_CACHE_CAP: usize = 4096;

pub struct IngestService {
    store: EmailStore,
    pipeline: AttachmentPipeline,
    notifier: Notifier,
    seen: Mutex<LruCache<u32, ()>>,
}

impl IngestService {
    pub fn new(store: EmailStore, pipeline: AttachmentPipeline, notifier: Notifier) -> Self {
        let cap = NonZeroUsize::new(SEEN_CACHE_CAP).unwrap();
        Self {
            store,
            pipeline,
            notifier,
            seen: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn already_seen(&self, uid: u32) -> bool {
        match self.seen.lock() {
            Ok(mut cache) => cache.get(&uid).is_some(),
            Err(_) => false,
        }
    }

    pub fn mark_seen(&self, uid: u32) {
        if let Ok(mut cache) = self.seen.lock() {
            cache.put(uid, ());
        }
    }

    /// Ingest one raw message. Failures are logged, never propagated;
    /// the UID is marked seen in every outcome.
    pub async fn ingest_raw(&self, uid: u32, raw: &[u8]) {
        self.mark_seen(uid);
        if let Err(e) = self.ingest_inner(uid, raw).await {
            warn!(uid, error = %e, "message ingestion failed");
        }
    }

    async fn ingest_inner(&self, uid: u32, raw: &[u8]) -> Result<()> {
        let decoded = decode_message(raw)?;
        let email_id = MailRecord::correlation_key(uid);

        let outcome = if decoded.attachments.is_empty() {
            PipelineOutcome::default()
        } else {
            self.pipeline.process(&decoded.attachments).await
        };

        match self.store.find_by_email_id(&email_id).await? {
            Some(existing) => self.backfill(&email_id, existing, outcome).await,
            None => {
                let record = NewMailRecord {
                    email_id,
                    from_addr: decoded.from_addr,
                    from_name: decoded.from_name,
                    subject: decoded.subject,
                    body: decoded.body,
                    received_at: decoded.date.timestamp(),
                    has_attachment: outcome.found_pdf,
                    attachment_data: outcome.data,
                };
                let saved = self.store.insert(record).await?;
                info!(uid, email_id = %saved.email_id, pdf = saved.has_attachment, "email stored");

                let message = if saved.has_attachment {
                    MSG_NEW_WITH_PDF
                } else {
                    MSG_NEW
                };
                self.notifier.notify(message, saved);
                Ok(())
            }
        }
    }

    /// A record can exist without attachment data when an earlier pass
    /// stored it before the PDF was processable. Fill it in exactly once.
    async fn backfill(
        &self,
        email_id: &str,
        existing: MailRecord,
        outcome: PipelineOutcome,
    ) -> Result<()> {
        let already_filled = existing
            .attachment_data
            .as_ref()
            .is_some_and(|d| !d.name.is_empty());
        let Some(data) = outcome.data else {
            debug!(email_id, "already stored, nothing to add");
            return Ok(());
        };
        if already_filled {
            debug!(email_id, "attachment data already present, skipping");
            return Ok(());
        }

        if let Some(updated) = self.store.update_attachment(email_id, &data).await? {
            info!(email_id, "attachment data backfilled");
            self.notifier.notify(MSG_UPDATED, updated);
        }
        Ok(())
    }
}
