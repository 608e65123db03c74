//! Content classifier
//!
//! Pure, deterministic policy deciding whether an uploaded artifact already
//! carries usable text or must go through OCR. No I/O: the decision is a
//! function of the declared mime type and the raw bytes only.

use crate::db::models::ExtractionStatus;

/// Only the head of a PDF stream is scanned for text-layer markers
pub const PDF_SCAN_WINDOW: usize = 2 * 1024 * 1024;

/// Stub text recorded for content classified as parsed; real extraction
/// happens downstream.
pub const PLACEHOLDER_TEXT: &str = "[text content recorded at ingestion]";

/// Extraction policy decision for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub extraction_status: ExtractionStatus,
    pub ocr_required: bool,
    pub extracted_text: Option<String>,
}

impl Classification {
    fn parsed() -> Self {
        Self {
            extraction_status: ExtractionStatus::Parsed,
            ocr_required: false,
            extracted_text: Some(PLACEHOLDER_TEXT.to_string()),
        }
    }

    fn pending_ocr() -> Self {
        Self {
            extraction_status: ExtractionStatus::PendingOcr,
            ocr_required: true,
            extracted_text: None,
        }
    }
}

/// Classify an artifact by declared mime type and content bytes
pub fn classify(mime: &str, bytes: &[u8]) -> Classification {
    let mime = normalize_mime(mime);

    if mime.starts_with("image/") {
        return Classification::pending_ocr();
    }

    if mime == "application/pdf" {
        return if pdf_has_text_layer(bytes) {
            Classification::parsed()
        } else {
            Classification::pending_ocr()
        };
    }

    if mime.starts_with("text/") || is_office_document(&mime) {
        return Classification::parsed();
    }

    Classification::pending_ocr()
}

/// Whether the ingestion endpoint accepts this declared mime type at all
pub fn is_accepted_mime(mime: &str) -> bool {
    let mime = normalize_mime(mime);

    mime.starts_with("image/")
        || mime.starts_with("text/")
        || mime == "application/pdf"
        || mime == "application/octet-stream"
        || is_office_document(&mime)
}

/// Strip parameters and lowercase, e.g. "Text/Plain; charset=utf-8"
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_lowercase()
}

fn is_office_document(mime: &str) -> bool {
    matches!(mime, "application/msword" | "application/rtf")
        || mime.starts_with("application/vnd.openxmlformats-officedocument.")
        || mime.starts_with("application/vnd.oasis.opendocument.")
}

/// Heuristic text-layer probe.
///
/// Scans only the first `PDF_SCAN_WINDOW` bytes for markers conventionally
/// present when a PDF carries a text layer: font references, Unicode
/// mapping tables, or text-showing operators inside a BT/ET block. False
/// positives and negatives are accepted; a scanned PDF slipping through as
/// "parsed" is corrected downstream, not here.
fn pdf_has_text_layer(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_SCAN_WINDOW)];

    if contains(window, b"/Font") || contains(window, b"/ToUnicode") {
        return true;
    }

    // Text-showing operator between BT and ET markers
    if let Some(bt) = find(window, b"BT") {
        let rest = &window[bt..];
        let end = find(rest, b"ET").unwrap_or(rest.len());
        let block = &rest[..end];
        if contains(block, b"Tj") || contains(block, b"TJ") {
            return true;
        }
    }

    false
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_parsed() {
        let c = classify("text/plain", b"hello");
        assert_eq!(c.extraction_status, ExtractionStatus::Parsed);
        assert!(!c.ocr_required);
        assert_eq!(c.extracted_text.as_deref(), Some(PLACEHOLDER_TEXT));
    }

    #[test]
    fn test_images_need_ocr() {
        for mime in ["image/jpeg", "image/png"] {
            let c = classify(mime, &[0xFF, 0xD8, 0xFF]);
            assert_eq!(c.extraction_status, ExtractionStatus::PendingOcr);
            assert!(c.ocr_required);
            assert!(c.extracted_text.is_none());
        }
    }

    #[test]
    fn test_office_documents_are_parsed() {
        let mimes = [
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ];
        for mime in mimes {
            let c = classify(mime, b"PK\x03\x04");
            assert_eq!(c.extraction_status, ExtractionStatus::Parsed);
        }
    }

    #[test]
    fn test_unknown_mime_needs_ocr() {
        let c = classify("application/x-unheard-of", b"????");
        assert_eq!(c.extraction_status, ExtractionStatus::PendingOcr);
        assert!(c.ocr_required);
    }

    #[test]
    fn test_mime_parameters_stripped() {
        let c = classify("Text/Plain; charset=utf-8", b"hej");
        assert_eq!(c.extraction_status, ExtractionStatus::Parsed);
    }

    #[test]
    fn test_pdf_with_font_marker_is_parsed() {
        let pdf = b"%PDF-1.4 ... /Type /Font /BaseFont /Helvetica ...";
        let c = classify("application/pdf", pdf);
        assert_eq!(c.extraction_status, ExtractionStatus::Parsed);
        assert!(!c.ocr_required);
    }

    #[test]
    fn test_pdf_with_text_operator_is_parsed() {
        let pdf = b"%PDF-1.4 stream BT (hello) Tj ET endstream";
        let c = classify("application/pdf", pdf);
        assert_eq!(c.extraction_status, ExtractionStatus::Parsed);
    }

    #[test]
    fn test_pdf_without_markers_needs_ocr() {
        let pdf = b"%PDF-1.4 /Type /XObject /Subtype /Image stream ...";
        let c = classify("application/pdf", pdf);
        assert_eq!(c.extraction_status, ExtractionStatus::PendingOcr);
        assert!(c.ocr_required);
        assert!(c.extracted_text.is_none());
    }

    #[test]
    fn test_pdf_marker_beyond_scan_window_ignored() {
        let mut pdf = vec![b' '; PDF_SCAN_WINDOW];
        pdf.splice(0..9, b"%PDF-1.4 ".iter().copied());
        pdf.extend_from_slice(b"/Font");
        let c = classify("application/pdf", &pdf);
        assert_eq!(c.extraction_status, ExtractionStatus::PendingOcr);
    }

    #[test]
    fn test_accepted_mimes() {
        assert!(is_accepted_mime("image/png"));
        assert!(is_accepted_mime("application/pdf"));
        assert!(is_accepted_mime("text/plain; charset=utf-8"));
        assert!(is_accepted_mime("application/octet-stream"));
        assert!(!is_accepted_mime("video/mp4"));
        assert!(!is_accepted_mime("application/zip"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify("application/pdf", b"%PDF /ToUnicode");
        let b = classify("application/pdf", b"%PDF /ToUnicode");
        assert_eq!(a, b);
    }
}
