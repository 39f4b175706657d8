use async_imap::Session;
use tokio::net::TcpStream;
use tokio_native_tls::native_tls::TlsConnector;

use crate::config::Config;
use crate::error::{IngestError, Result};

pub type ImapSession = Session<tokio_native_tls::TlsStream<TcpStream>>;

/// Connect, authenticate and select INBOX. Self-signed server
/// certificates are tolerated, matching the monitored deployments.
pub async fn connect(config: &Config) -> Result<ImapSession> {
    let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))
        .await
        .map_err(|e| IngestError::Connection(format!("tcp connect: {e}")))?;
    let tls = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| IngestError::Connection(format!("tls setup: {e}")))?;
    let tls = tokio_native_tls::TlsConnector::from(tls);
    let tls_stream = tls
        .connect(&config.imap_host, tcp)
        .await
        .map_err(|e| IngestError::Connection(format!("tls handshake: {e}")))?;

    let client = async_imap::Client::new(tls_stream);
    let mut session = client
        .login(&config.imap_user, &config.imap_password)
        .await
        .map_err(|(e, _)| IngestError::Connection(format!("login failed: {e}")))?;

    session
        .select("INBOX")
        .await
        .map_err(|e| IngestError::Connection(format!("select INBOX: {e}")))?;

    Ok(session)
}
