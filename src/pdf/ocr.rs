//! OCR for scanned PDFs via the poppler/tesseract command-line tools.
//!
//! Pages are rendered to images with `pdftoppm`, then each image is run
//! through `tesseract`. Both tools are probed once; when either is
//! missing OCR degrades to an explanatory error that callers treat as
//! "no text recovered".

use std::path::Path;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{IngestError, Result};

const RENDER_DPI: &str = "300";
const OCR_LANG: &str = "eng";

pub struct OcrEngine {
    available: OnceCell<bool>,
}

impl OcrEngine {
    pub fn new() -> Self {
        Self {
            available: OnceCell::new(),
        }
    }

    /// Recognize text in every page of the PDF at `pdf_path`.
    pub async fn recognize_pdf(&self, pdf_path: &Path) -> Result<String> {
        let available = *self
            .available
            .get_or_init(|| async {
                command_available("pdftoppm").await && command_available("tesseract").await
            })
            .await;
        if !available {
            return Err(IngestError::Pdf(
                "pdftoppm/tesseract are unavailable".into(),
            ));
        }

        let workdir = tempfile::tempdir()
            .map_err(|e| IngestError::io(std::env::temp_dir(), e))?;
        let prefix = workdir.path().join("page");

        let status = Command::new("pdftoppm")
            .arg("-r")
            .arg(RENDER_DPI)
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .status()
            .await
            .map_err(|e| IngestError::io(pdf_path, e))?;
        if !status.success() {
            return Err(IngestError::Pdf(format!(
                "pdftoppm exited with {status}"
            )));
        }

        // pdftoppm names pages page-1.png, page-2.png, ...; sort for order.
        let mut pages: Vec<_> = std::fs::read_dir(workdir.path())
            .map_err(|e| IngestError::io(workdir.path(), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("png"))
            .collect();
        pages.sort();

        let mut text = String::new();
        for page in &pages {
            let output = Command::new("tesseract")
                .arg(page)
                .arg("stdout")
                .arg("-l")
                .arg(OCR_LANG)
                .output()
                .await
                .map_err(|e| IngestError::io(page, e))?;
            if !output.status.success() {
                debug!(page = %page.display(), "tesseract failed on page, skipping");
                continue;
            }
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            text.push('\n');
        }

        Ok(text.trim().to_string())
    }
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn command_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("-v")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .is_ok()
}
