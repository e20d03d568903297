use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Markdown,
    Json,
    Pdf,
    Unsupported,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("could not decode content as UTF-8 text")]
    InvalidUtf8,
    #[error("content extraction failed: {0}")]
    ExtractionFailed(String),
}

impl healthsync_core::error::HasErrorKind for DecodeError {
    fn error_kind(&self) -> healthsync_core::error::ErrorKind {
        healthsync_core::error::ErrorKind::InvalidInput
    }
}

pub fn detect_content_kind(mime_type: &str, filename: Option<&str>) -> ContentKind {
    let mime = mime_type.split(';').next().unwrap_or("").trim().to_lowercase();
    match mime.as_str() {
        "text/plain" => ContentKind::Text,
        "text/markdown" => ContentKind::Markdown,
        "application/json" => ContentKind::Json,
        "application/pdf" => ContentKind::Pdf,
        _ => {
            if let Some(name) = filename {
                let ext = Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_lowercase();
                match ext.as_str() {
                    "txt" => ContentKind::Text,
                    "md" | "markdown" => ContentKind::Markdown,
                    "json" => ContentKind::Json,
                    "pdf" => ContentKind::Pdf,
                    _ => ContentKind::Unsupported,
                }
            } else {
                ContentKind::Unsupported
            }
        }
    }
}

/// `extract_text(bytes, file_type) -> string` (spec.md §4.4). Supported
/// formats are enumerated; anything else fails fast with `UnsupportedFormat`.
pub fn extract_text(
    bytes: &[u8],
    mime_type: &str,
    filename: Option<&str>,
) -> Result<String, DecodeError> {
    match detect_content_kind(mime_type, filename) {
        ContentKind::Text | ContentKind::Markdown | ContentKind::Json => {
            String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
        }
        ContentKind::Pdf => extract_pdf_text(bytes)
            .ok_or_else(|| DecodeError::ExtractionFailed("pdf".to_string())),
        ContentKind::Unsupported => Err(DecodeError::UnsupportedFormat(mime_type.to_string())),
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_from_mime_type() {
        assert_eq!(detect_content_kind("text/plain", None), ContentKind::Text);
        assert_eq!(
            detect_content_kind("application/pdf", None),
            ContentKind::Pdf
        );
    }

    #[test]
    fn falls_back_to_extension_when_mime_is_generic() {
        assert_eq!(
            detect_content_kind("application/octet-stream", Some("notes.md")),
            ContentKind::Markdown
        );
    }

    #[test]
    fn unknown_type_fails_fast() {
        let err = extract_text(b"bytes", "application/x-unknown", None).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn plain_text_round_trips_as_utf8() {
        let text = extract_text("hello world".as_bytes(), "text/plain", None).unwrap();
        assert_eq!(text, "hello world");
    }
}
