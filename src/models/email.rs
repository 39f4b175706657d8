use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Fields recovered from a PDF resume attachment, embedded in its
/// [`MailRecord`]. Written once at attachment-processing time; the only
/// later mutation is the one-time backfill on a previously bare record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttachmentData {
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub date_of_birth: String,
    /// Full path of the saved PDF on disk.
    pub pdf_path: String,
    /// Timestamp-prefixed, sanitized filename (unique per ingestion).
    pub pdf_filename: String,
    /// First 5000 characters of the resolved text, kept for audit.
    pub raw_text: String,
}

/// A persisted inbound email. At most one row exists per `email_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRecord {
    pub id: i64,
    /// Correlation key derived from the IMAP UID, e.g. `uid_42`.
    pub email_id: String,
    pub from_addr: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
    /// Epoch seconds from the message date header (or ingestion time).
    pub received_at: i64,
    pub has_attachment: bool,
    pub attachment_data: Option<AttachmentData>,
    pub created_at: i64,
}

impl MailRecord {
    /// Derive the correlation key from a protocol-level UID.
    pub fn correlation_key(uid: u32) -> String {
        format!("uid_{uid}")
    }

    pub fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        // The pdf filename is the marker column: attachment rows always
        // carry one, bare rows leave the whole group NULL.
        let attachment_data = match row.try_get::<Option<String>, _>("attachment_pdf_filename")? {
            Some(pdf_filename) => Some(AttachmentData {
                name: row
                    .try_get::<Option<String>, _>("attachment_name")?
                    .unwrap_or_default(),
                email: row
                    .try_get::<Option<String>, _>("attachment_email")?
                    .unwrap_or_default(),
                contact_number: row
                    .try_get::<Option<String>, _>("attachment_contact")?
                    .unwrap_or_default(),
                date_of_birth: row
                    .try_get::<Option<String>, _>("attachment_dob")?
                    .unwrap_or_default(),
                pdf_path: row
                    .try_get::<Option<String>, _>("attachment_pdf_path")?
                    .unwrap_or_default(),
                pdf_filename,
                raw_text: row
                    .try_get::<Option<String>, _>("attachment_raw_text")?
                    .unwrap_or_default(),
            }),
            None => None,
        };

        Ok(MailRecord {
            id: row.try_get("id")?,
            email_id: row.try_get("email_id")?,
            from_addr: row.try_get("from_addr")?,
            from_name: row.try_get("from_name")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            received_at: row.try_get("received_at")?,
            has_attachment: row.try_get("has_attachment")?,
            attachment_data,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A new record about to be inserted (no database id yet).
#[derive(Debug, Clone)]
pub struct NewMailRecord {
    pub email_id: String,
    pub from_addr: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
    pub received_at: i64,
    pub has_attachment: bool,
    pub attachment_data: Option<AttachmentData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_key_is_deterministic() {
        assert_eq!(MailRecord::correlation_key(42), "uid_42");
        assert_eq!(MailRecord::correlation_key(42), MailRecord::correlation_key(42));
    }
}
