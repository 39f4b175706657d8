//! Broadcast fan-out for ingestion events. Receivers are HTTP event
//! streams; a send with no subscribers is not an error.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::email::MailRecord;

pub const MSG_NEW_WITH_PDF: &str = "New email with PDF attachment received!";
pub const MSG_NEW: &str = "New email received!";
pub const MSG_UPDATED: &str = "Email updated with PDF attachment data!";

#[derive(Debug, Clone, Serialize)]
pub struct NewEmailEvent {
    pub event: &'static str,
    pub message: String,
    pub email: MailRecord,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NewEmailEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NewEmailEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, message: &str, email: MailRecord) {
        let _ = self.tx.send(NewEmailEvent {
            event: "newEmail",
            message: message.to_string(),
            email,
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MailRecord {
        MailRecord {
            id: 1,
            email_id: "uid_1".into(),
            from_addr: "a@b.com".into(),
            from_name: "A".into(),
            subject: "Hi".into(),
            body: "body".into(),
            received_at: 0,
            has_attachment: false,
            attachment_data: None,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.notify(MSG_NEW, record());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "newEmail");
        assert_eq!(event.message, MSG_NEW);
        assert_eq!(event.email.email_id, "uid_1");
    }

    #[test]
    fn notify_without_subscribers_is_fine() {
        Notifier::default().notify(MSG_UPDATED, record());
    }
}
