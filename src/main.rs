use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use resume_ingest::config::Config;
use resume_ingest::db;
use resume_ingest::routes::{self, AppState};
use resume_ingest::services::attachment_pipeline::AttachmentPipeline;
use resume_ingest::services::ingest_service::IngestService;
use resume_ingest::services::mailbox_watcher::MailboxWatcher;
use resume_ingest::services::notifier::Notifier;
use resume_ingest::store::EmailStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,resume_ingest=debug")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    // sqlx expects sqlite://path or sqlite::memory:; ensure the backing
    // file exists before connecting.
    let db_url = db::normalize_sqlite_url(&config.database_url);
    if let Some(path) = db::db_file_path(&db_url) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if !path.exists() {
            std::fs::File::create(&path).ok();
        }
    }
    let pool = sqlx::SqlitePool::connect(&db_url).await?;
    db::run_migrations(&pool).await?;

    std::fs::create_dir_all(&config.uploads_dir)?;

    let store = EmailStore::new(pool);
    let notifier = Notifier::default();
    let ingest = Arc::new(IngestService::new(
        store.clone(),
        AttachmentPipeline::new(&config),
        notifier.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = MailboxWatcher::new(Arc::clone(&config), ingest);
    let watcher_task = tokio::spawn(watcher.run(shutdown_rx));

    let state = AppState { store, notifier };
    let app = routes::build_router(state, &config.uploads_dir);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    watcher_task.await.ok();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
