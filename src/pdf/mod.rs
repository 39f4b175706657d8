//! Best-effort text recovery from PDF attachments.
//!
//! Direct text-layer extraction first; when that fails or yields almost
//! nothing, the document is treated as scanned and handed to OCR. Total
//! failure returns an empty string, never an error.

pub mod ocr;

use std::path::Path;
use tracing::{info, warn};

use ocr::OcrEngine;

pub struct TextResolver {
    ocr: OcrEngine,
    /// Text-layer results with fewer non-whitespace characters than this
    /// trigger the OCR fallback. Empirical threshold.
    min_text_chars: usize,
}

impl TextResolver {
    pub fn new(min_text_chars: usize) -> Self {
        Self {
            ocr: OcrEngine::new(),
            min_text_chars,
        }
    }

    /// Resolve the text of a PDF already persisted at `pdf_path`.
    pub async fn resolve(&self, pdf_bytes: &[u8], pdf_path: &Path) -> String {
        let layer_text = extract_text_layer(pdf_bytes.to_vec()).await;

        let meaningful = layer_text
            .as_deref()
            .map(non_whitespace_chars)
            .unwrap_or(0);
        if layer_is_sufficient(meaningful, self.min_text_chars) {
            info!(chars = meaningful, "text layer extracted");
            return layer_text.unwrap_or_default();
        }

        info!(
            chars = meaningful,
            "text layer missing or too short, trying OCR"
        );
        match self.ocr.recognize_pdf(pdf_path).await {
            Ok(ocr_text) if non_whitespace_chars(&ocr_text) > 0 => {
                info!(chars = ocr_text.len(), "OCR recovered text");
                ocr_text
            }
            Ok(_) => {
                warn!("OCR produced no text");
                layer_text.unwrap_or_default()
            }
            Err(e) => {
                warn!(error = %e, "OCR failed");
                layer_text.unwrap_or_default()
            }
        }
    }
}

/// Text-layer extraction off the async runtime; a panic inside the PDF
/// parser is contained and treated as "no text layer".
async fn extract_text_layer(pdf_bytes: Vec<u8>) -> Option<String> {
    let result =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf_bytes)).await;
    match result {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(error = %e, "text layer extraction failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "text layer extraction aborted");
            None
        }
    }
}

pub fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// A text layer this short means the document is probably scanned.
fn layer_is_sufficient(meaningful_chars: usize, min_text_chars: usize) -> bool {
    meaningful_chars >= min_text_chars
}
