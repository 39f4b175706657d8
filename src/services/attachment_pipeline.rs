//! First-PDF attachment pipeline: normalize payload bytes, persist the
//! file under the uploads directory, resolve its text, extract resume
//! fields.
//!
//! Only the first PDF of a message is processed; any further attachments
//! are ignored. A pipeline failure never loses the fact that a PDF was
//! present, the caller still records `has_attachment`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::extract::{extract_resume_fields, ExtractOptions};
use crate::mail::decoder::DecodedAttachment;
use crate::models::email::AttachmentData;
use crate::pdf::TextResolver;

/// Stored raw text is capped at this many characters.
const RAW_TEXT_CAP: usize = 5000;

const DEFAULT_FILENAME: &str = "resume.pdf";

pub struct AttachmentPipeline {
    uploads_dir: PathBuf,
    resolver: TextResolver,
    extract_options: ExtractOptions,
}

/// What the pipeline found in a message's attachments.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// A PDF attachment was present, whether or not it processed cleanly.
    pub found_pdf: bool,
    pub data: Option<AttachmentData>,
}

impl AttachmentPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            uploads_dir: config.uploads_dir.clone(),
            resolver: TextResolver::new(config.ocr_min_text_chars),
            extract_options: ExtractOptions {
                dob_year_min: config.dob_year_min,
                dob_year_max: config.dob_year_max,
            },
        }
    }

    /// Process the first PDF among `attachments`, if any.
    pub async fn process(&self, attachments: &[DecodedAttachment]) -> PipelineOutcome {
        let Some(pdf) = attachments.iter().find(|a| is_pdf(a)) else {
            return PipelineOutcome::default();
        };

        match self.process_pdf(pdf).await {
            Ok(data) => PipelineOutcome {
                found_pdf: true,
                data: Some(data),
            },
            Err(e) => {
                warn!(filename = %pdf.filename, error = %e, "pdf attachment processing failed");
                PipelineOutcome {
                    found_pdf: true,
                    data: None,
                }
            }
        }
    }

    async fn process_pdf(&self, attachment: &DecodedAttachment) -> Result<AttachmentData> {
        let bytes = normalize_payload(&attachment.data)?;

        let filename = stored_filename(&attachment.filename);
        let path = self.uploads_dir.join(&filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| IngestError::io(&path, e))?;

        // Verify the write by re-reading the on-disk size.
        let written = tokio::fs::metadata(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?
            .len();
        if written != bytes.len() as u64 {
            return Err(IngestError::Pdf(format!(
                "wrote {} bytes but {} landed on disk",
                bytes.len(),
                written
            )));
        }
        info!(filename = %filename, bytes = written, "pdf attachment saved");

        let text = self.resolver.resolve(&bytes, &path).await;
        let fields = extract_resume_fields(&text, &self.extract_options);

        Ok(AttachmentData {
            name: fields.name.unwrap_or_default(),
            email: fields.email.unwrap_or_default(),
            contact_number: fields.contact_number.unwrap_or_default(),
            date_of_birth: fields.date_of_birth.unwrap_or_default(),
            pdf_path: path.to_string_lossy().into_owned(),
            pdf_filename: filename,
            raw_text: text.chars().take(RAW_TEXT_CAP).collect(),
        })
    }
}

fn is_pdf(attachment: &DecodedAttachment) -> bool {
    attachment.content_type.eq_ignore_ascii_case("application/pdf")
        || attachment.filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Some upstream parsers hand attachment bodies through as the base64
/// transfer text instead of decoded bytes. Real PDF bytes start with
/// `%PDF`, which is never valid base64, so decoding only fires on the
/// text form.
fn normalize_payload(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(IngestError::EmptyAttachment);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if let Ok(decoded) = BASE64.decode(compact.as_bytes()) {
            if !decoded.is_empty() {
                return Ok(decoded);
            }
        }
    }

    Ok(data.to_vec())
}

/// Timestamp-prefixed, sanitized storage filename. Characters outside
/// `[A-Za-z0-9.-]` become underscores.
fn stored_filename(original: &str) -> String {
    let base = if original.trim().is_empty() {
        DEFAULT_FILENAME
    } else {
        original
    };
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", chrono::Utc::now().timestamp_millis(), sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_attachment(data: &[u8]) -> DecodedAttachment {
        DecodedAttachment {
            filename: "cv.pdf".into(),
            content_type: "application/pdf".into(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn filename_is_sanitized_and_timestamped() {
        let name = stored_filename("my resume (final).pdf");
        let (_stamp, rest) = name.split_once('_').unwrap();
        assert_eq!(rest, "my_resume__final_.pdf");
    }

    #[test]
    fn empty_filename_falls_back_to_default() {
        let name = stored_filename("  ");
        assert!(name.ends_with("_resume.pdf"));
    }

    #[test]
    fn base64_text_payload_is_decoded() {
        let normalized = normalize_payload(b"JVBERi0xLjQK").unwrap();
        assert!(normalized.starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn binary_payload_passes_through() {
        let normalized = normalize_payload(b"%PDF-1.4 binary\x00body").unwrap();
        assert!(normalized.starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            normalize_payload(b""),
            Err(IngestError::EmptyAttachment)
        ));
    }

    #[test]
    fn pdf_detection_by_type_or_extension() {
        assert!(is_pdf(&pdf_attachment(b"x")));
        let by_ext = DecodedAttachment {
            filename: "CV.PDF".into(),
            content_type: "application/octet-stream".into(),
            data: vec![1],
        };
        assert!(is_pdf(&by_ext));
        let neither = DecodedAttachment {
            filename: "photo.png".into(),
            content_type: "image/png".into(),
            data: vec![1],
        };
        assert!(!is_pdf(&neither));
    }

    #[tokio::test]
    async fn broken_pdf_still_reports_found() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AttachmentPipeline::new(&test_config(dir.path()));

        // Garbage bytes: saved to disk, but no text comes out of them.
        let outcome = pipeline.process(&[pdf_attachment(b"%PDF-1.4 garbage")]).await;
        assert!(outcome.found_pdf);
        let data = outcome.data.unwrap();
        assert!(data.raw_text.is_empty());
        assert!(data.name.is_empty());
        assert!(std::path::Path::new(&data.pdf_path).exists());
    }

    #[tokio::test]
    async fn only_first_pdf_is_processed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AttachmentPipeline::new(&test_config(dir.path()));

        let atts: Vec<DecodedAttachment> = ["first.pdf", "second.pdf", "third.pdf"]
            .iter()
            .map(|name| DecodedAttachment {
                filename: name.to_string(),
                content_type: "application/pdf".into(),
                data: b"%PDF-1.4 body".to_vec(),
            })
            .collect();

        let outcome = pipeline.process(&atts).await;
        let data = outcome.data.unwrap();
        assert!(data.pdf_filename.ends_with("first.pdf"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn non_pdf_attachments_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AttachmentPipeline::new(&test_config(dir.path()));
        let outcome = pipeline
            .process(&[DecodedAttachment {
                filename: "photo.png".into(),
                content_type: "image/png".into(),
                data: vec![1, 2, 3],
            }])
            .await;
        assert!(!outcome.found_pdf);
        assert!(outcome.data.is_none());
    }

    fn test_config(uploads: &std::path::Path) -> Config {
        Config {
            database_url: "sqlite::memory:".into(),
            imap_host: "localhost".into(),
            imap_port: 993,
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
}
