pub mod attachment_pipeline;
pub mod ingest_service;
pub mod mailbox_watcher;
pub mod notifier;
