//! Raw message bytes → structured message.
//!
//! Decoding is deterministic apart from the documented fallback to "now"
//! when a message carries no parsable date.

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IngestError, Result};

pub const NO_SUBJECT: &str = "No Subject";
pub const NO_CONTENT: &str = "(No content)";
pub const UNKNOWN_SENDER: &str = "unknown@example.com";

/// One decoded MIME attachment, content already in raw bytes.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Structured view of one inbound message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub from_addr: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub attachments: Vec<DecodedAttachment>,
}

static EXCESS_NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Decode raw RFC 5322 bytes into a [`DecodedMessage`].
pub fn decode_message(raw: &[u8]) -> Result<DecodedMessage> {
    if raw.is_empty() {
        return Err(IngestError::Decode("empty message payload".into()));
    }

    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| IngestError::Decode("unparsable MIME structure".into()))?;

    let (from_addr, from_name) = match parsed.from().and_then(|a| a.first()) {
        Some(addr) => {
            let address = addr
                .address()
                .map(|a| a.to_string())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
            let name = addr
                .name()
                .map(|n| n.to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| address.clone());
            (address, name)
        }
        None => (UNKNOWN_SENDER.to_string(), UNKNOWN_SENDER.to_string()),
    };

    let subject = parsed
        .subject()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    // Body priority: plain text part, else HTML with tags stripped.
    let body = parsed
        .body_text(0)
        .map(|t| t.into_owned())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| parsed.body_html(0).map(|h| strip_html(&h)))
        .map(|t| normalize_body(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_CONTENT.to_string());

    let date = parsed
        .date()
        .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single())
        .unwrap_or_else(Utc::now);

    let attachments = parsed
        .attachments()
        .enumerate()
        .map(|(idx, part)| DecodedAttachment {
            filename: part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}")),
            content_type: part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data: part.contents().to_vec(),
        })
        .collect();

    Ok(DecodedMessage {
        from_addr,
        from_name,
        subject,
        body,
        date,
        attachments,
    })
}

/// Collapse 3+ consecutive newlines to one blank line and trim.
fn normalize_body(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    EXCESS_NEWLINES_RE
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}

/// Simple tag-removal pass for HTML bodies: block tags become newlines,
/// everything else in angle brackets is dropped, common entities decoded.
pub fn strip_html(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["<br>", "<br/>", "<br />", "</p>", "</div>", "</tr>", "</li>"] {
        text = text.replace(tag, "\n");
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: Jane Doe <jane@example.com>\r\n\
Subject: Application\r\n\
Date: Mon, 11 Mar 2024 10:30:00 +0000\r\n\
Content-Type: text/plain\r\n\
\r\n\
Please find my resume attached.\r\n";

    #[test]
    fn decodes_sender_subject_and_body() {
        let msg = decode_message(PLAIN).unwrap();
        assert_eq!(msg.from_addr, "jane@example.com");
        assert_eq!(msg.from_name, "Jane Doe");
        assert_eq!(msg.subject, "Application");
        assert_eq!(msg.body, "Please find my resume attached.");
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn decoding_is_deterministic() {
        let a = decode_message(PLAIN).unwrap();
        let b = decode_message(PLAIN).unwrap();
        assert_eq!(a.from_addr, b.from_addr);
        assert_eq!(a.subject, b.subject);
        assert_eq!(a.body, b.body);
        assert_eq!(a.date, b.date);
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let raw = b"From: jane@example.com\r\nSubject: Hi\r\n\r\nbody\r\n";
        let msg = decode_message(raw).unwrap();
        assert_eq!(msg.from_name, "jane@example.com");
    }

    #[test]
    fn missing_subject_gets_placeholder() {
        let raw = b"From: jane@example.com\r\n\r\nbody\r\n";
        let msg = decode_message(raw).unwrap();
        assert_eq!(msg.subject, NO_SUBJECT);
    }

    #[test]
    fn missing_body_gets_placeholder() {
        let raw = b"From: jane@example.com\r\nSubject: Hi\r\n\r\n\r\n";
        let msg = decode_message(raw).unwrap();
        assert_eq!(msg.body, NO_CONTENT);
    }

    #[test]
    fn html_body_is_stripped_when_no_plain_part() {
        let raw = b"From: a@b.com\r\n\
Subject: Hi\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>Hello <b>there</b></p><p>Bye</p></body></html>\r\n";
        let msg = decode_message(raw).unwrap();
        assert!(msg.body.contains("Hello there"));
        assert!(msg.body.contains("Bye"));
        assert!(!msg.body.contains('<'));
    }

    #[test]
    fn excess_newlines_collapse_to_one_blank_line() {
        assert_eq!(normalize_body("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_body("  a\nb  \n"), "a\nb");
    }

    #[test]
    fn empty_payload_is_a_decode_error() {
        assert!(matches!(
            decode_message(b""),
            Err(IngestError::Decode(_))
        ));
    }

    #[test]
    fn pdf_attachment_is_listed_with_content_type() {
        let raw = b"From: jane@example.com\r\n\
Subject: CV\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attachment\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"cv.pdf\"\r\n\
Content-Disposition: attachment; filename=\"cv.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XYZ--\r\n";
        let msg = decode_message(raw).unwrap();
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].filename, "cv.pdf");
        assert_eq!(msg.attachments[0].content_type, "application/pdf");
        // Transfer encoding already decoded to raw bytes.
        assert!(msg.attachments[0].data.starts_with(b"%PDF-1.4"));
    }
}
