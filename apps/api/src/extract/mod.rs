//! File Content Extractor — turns uploaded bytes into prompt-ready text.
//!
//! Extraction never raises past this boundary: every failure mode becomes a
//! diagnostic string carrying `DIAG_PREFIX` so the pipeline can proceed on a
//! degraded input and the eventual report simply describes what went wrong.

use tracing::{debug, warn};

mod docx;

/// Uniform prefix for every diagnostic result. Callers branch on this
/// instead of a `Result`.
pub const DIAG_PREFIX: &str = "[parse failed:";

/// Extracts text from an uploaded file, dispatching on its extension.
/// Infallible: unsupported formats, empty files and parser errors all come
/// back as diagnostic strings.
pub fn extract(bytes: &[u8], filename: &str) -> String {
    if bytes.is_empty() {
        warn!("Upload '{filename}' is empty");
        return format!("{DIAG_PREFIX} file '{filename}' is empty]");
    }

    let ext = extension(filename);
    let result = match ext.as_str() {
        "pdf" => extract_pdf(bytes, filename),
        "docx" => extract_docx(bytes, filename),
        "txt" | "md" | "markdown" => Ok(extract_plain_text(bytes)),
        "jpg" | "jpeg" | "png" => extract_image_info(bytes, filename),
        other => Err(format!("unsupported file type '{other}'")),
    };

    match result {
        Ok(text) => {
            debug!("Extracted {} chars from '{filename}'", text.len());
            text
        }
        Err(diag) => {
            warn!("Extraction failed for '{filename}': {diag}");
            format!("{DIAG_PREFIX} {diag}]")
        }
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// PDF text-layer extraction. No OCR fallback: a scanned PDF without a text
/// layer yields an explanatory diagnostic instead.
fn extract_pdf(bytes: &[u8], filename: &str) -> Result<String, String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => Err(format!(
            "PDF '{filename}' has no extractable text layer; OCR is not performed"
        )),
        Err(e) => Err(format!("could not read PDF '{filename}': {e}")),
    }
}

fn extract_docx(bytes: &[u8], filename: &str) -> Result<String, String> {
    match docx::extract(bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => Err(format!("DOCX '{filename}' contains no text")),
        Err(e) => Err(format!("could not read DOCX '{filename}': {e}")),
    }
}

/// Strict UTF-8 first, lossy decode as the fallback.
fn extract_plain_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// No OCR for images: record dimensions and format so the downstream prompt
/// knows a visual document was supplied.
fn extract_image_info(bytes: &[u8], filename: &str) -> Result<String, String> {
    let format = image::guess_format(bytes)
        .map_err(|e| format!("could not identify image '{filename}': {e}"))?;
    let img = image::load_from_memory(bytes)
        .map_err(|e| format!("could not decode image '{filename}': {e}"))?;
    Ok(format!(
        "[image file '{filename}', dimensions: {}x{}, format: {format:?}. \
         Consider this image may contain visual content.]",
        img.width(),
        img.height()
    ))
}
