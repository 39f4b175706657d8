//! Record store over SQLite. The `email_id` UNIQUE constraint is the
//! durable dedup guarantee; the in-memory tracker only saves work within
//! one process lifetime.

use sqlx::SqlitePool;

use crate::db::now_epoch;
use crate::error::Result;
use crate::models::email::{AttachmentData, MailRecord, NewMailRecord};

const SELECT_COLUMNS: &str = "SELECT id, email_id, from_addr, from_name, subject, body, \
     received_at, has_attachment, attachment_name, attachment_email, attachment_contact, \
     attachment_dob, attachment_pdf_path, attachment_pdf_filename, attachment_raw_text, \
     created_at FROM emails";

#[derive(Clone)]
pub struct EmailStore {
    pool: SqlitePool,
}

impl EmailStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email_id(&self, email_id: &str) -> Result<Option<MailRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE email_id = ?"))
            .bind(email_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(MailRecord::from_row).transpose().map_err(Into::into)
    }

    pub async fn insert(&self, record: NewMailRecord) -> Result<MailRecord> {
        let created_at = now_epoch();
        let att = record.attachment_data.as_ref();
        let result = sqlx::query(
            r#"
            INSERT INTO emails (
                email_id, from_addr, from_name, subject, body, received_at,
                has_attachment, attachment_name, attachment_email, attachment_contact,
                attachment_dob, attachment_pdf_path, attachment_pdf_filename,
                attachment_raw_text, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.email_id)
        .bind(&record.from_addr)
        .bind(&record.from_name)
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.received_at)
        .bind(record.has_attachment)
        .bind(att.map(|a| a.name.as_str()))
        .bind(att.map(|a| a.email.as_str()))
        .bind(att.map(|a| a.contact_number.as_str()))
        .bind(att.map(|a| a.date_of_birth.as_str()))
        .bind(att.map(|a| a.pdf_path.as_str()))
        .bind(att.map(|a| a.pdf_filename.as_str()))
        .bind(att.map(|a| a.raw_text.as_str()))
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(MailRecord {
            id: result.last_insert_rowid(),
            email_id: record.email_id,
            from_addr: record.from_addr,
            from_name: record.from_name,
            subject: record.subject,
            body: record.body,
            received_at: record.received_at,
            has_attachment: record.has_attachment,
            attachment_data: record.attachment_data,
            created_at,
        })
    }

    /// One-time backfill: attach PDF data to an already-persisted bare
    /// record. Returns the updated record.
    pub async fn update_attachment(
        &self,
        email_id: &str,
        data: &AttachmentData,
    ) -> Result<Option<MailRecord>> {
        sqlx::query(
            r#"
            UPDATE emails SET
                has_attachment = 1,
                attachment_name = ?, attachment_email = ?, attachment_contact = ?,
                attachment_dob = ?, attachment_pdf_path = ?, attachment_pdf_filename = ?,
                attachment_raw_text = ?
            WHERE email_id = ?
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.contact_number)
        .bind(&data.date_of_birth)
        .bind(&data.pdf_path)
        .bind(&data.pdf_filename)
        .bind(&data.raw_text)
        .bind(email_id)
        .execute(&self.pool)
        .await?;

        self.find_by_email_id(email_id).await
    }

    /// All records, newest received first.
    pub async fn find_all(&self) -> Result<Vec<MailRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY received_at DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| MailRecord::from_row(r).map_err(Into::into))
            .collect()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<MailRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(MailRecord::from_row).transpose().map_err(Into::into)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM emails WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM emails")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
