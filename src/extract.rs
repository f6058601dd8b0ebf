//! Upload handling: turn raw bytes into exactly one of
//! extracted document text or a validated image attachment.

use base64::Engine;

use crate::models::ImageAttachment;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("PDF could not be parsed: {0}")]
    PdfParsing(String),
    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),
    #[error("Unsupported upload type: {0}")]
    UnsupportedType(String),
}

/// What an upload became after extraction. Exactly one variant per
/// upload; text and image are never produced together.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedUpload {
    /// Concatenated page text of a PDF, trimmed. May be empty
    /// (scanned pages without a text layer); that is a valid outcome,
    /// not an error.
    Document { text: String },
    /// A decoded raster image, carried as its original encoded bytes.
    Image(ImageAttachment),
}

const PDF_MAGIC: &[u8] = b"%PDF";

/// Extract an upload from raw bytes plus the declared MIME type.
///
/// The declared type is trusted first; PDF magic bytes and image
/// format sniffing cover uploads with a generic or missing type.
pub fn extract_upload(bytes: &[u8], declared_mime: &str) -> Result<ExtractedUpload, UploadError> {
    let mime = declared_mime.trim().to_ascii_lowercase();

    if mime == "application/pdf" || bytes.starts_with(PDF_MAGIC) {
        return extract_pdf_text(bytes).map(|text| ExtractedUpload::Document { text });
    }

    if mime.starts_with("image/") {
        return decode_image(bytes, &mime).map(ExtractedUpload::Image);
    }

    // No usable declared type, so sniff for a known raster format.
    if let Ok(format) = image::guess_format(bytes) {
        return decode_image(bytes, format.to_mime_type()).map(ExtractedUpload::Image);
    }

    Err(UploadError::UnsupportedType(declared_mime.to_string()))
}

/// Concatenate the embedded text of every page in document order.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, UploadError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| UploadError::PdfParsing(e.to_string()))?;

    let text = pages.concat().trim().to_string();
    tracing::debug!(pages = pages.len(), chars = text.len(), "PDF text extracted");
    Ok(text)
}

/// Validate that the bytes decode as a raster image, then keep the
/// original encoding for transport.
fn decode_image(bytes: &[u8], media_type: &str) -> Result<ImageAttachment, UploadError> {
    image::load_from_memory(bytes).map_err(|e| UploadError::ImageDecode(e.to_string()))?;

    Ok(ImageAttachment {
        media_type: media_type.to_string(),
        data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}
