//! Helpers shared by the `folio` binary.

pub mod setup;

use folio_core::{AppError, ErrorMetadata};
use std::path::Path;

pub use setup::{vision_classifier, Services, Stores};

/// MIME type implied by a file extension. Unknown extensions map to
/// `application/octet-stream` and are left to signature sniffing.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "cr2" => "image/x-canon-cr2",
        "nef" => "image/x-nikon-nef",
        "arw" => "image/x-sony-arw",
        "dng" => "image/x-adobe-dng",
        _ => "application/octet-stream",
    }
}

/// Operator-facing rendering: code, message, then the suggested action if any.
pub fn describe_error(err: &AppError) -> String {
    let mut out = format!("error[{}]: {}", err.error_code(), err);
    if let Some(action) = err.suggested_action() {
        out.push_str(&format!("\n  hint: {}", action));
    }
    if err.is_recoverable() {
        out.push_str("\n  (retryable)");
    }
    out
}

/// Truncate to `max_len` characters, appending "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::ProcessingStatus;

    #[test]
    fn mime_from_extension() {
        assert_eq!(guess_mime(Path::new("koi.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("IMG_0042.heic")), "image/heic");
        assert_eq!(guess_mime(Path::new("shot.CR2")), "image/x-canon-cr2");
        assert_eq!(guess_mime(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn error_description_includes_code_and_hint() {
        let err = AppError::InvalidTransition {
            from: ProcessingStatus::Completed,
            to: ProcessingStatus::Pending,
        };
        let text = describe_error(&err);
        assert!(text.starts_with("error[INVALID_STATUS_TRANSITION]"));
        assert!(text.contains("hint: Check the asset status"));
        assert!(!text.contains("retryable"));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
