//! Text extraction.
//!
//! Plain-text formats are decoded directly; every other format must be
//! claimed by a registered [`TextExtractor`] plugin, otherwise extraction
//! fails with [`Error::UnsupportedFormat`]. A PDF extractor ships as the
//! one built-in plugin.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Extracted document content.
pub struct ExtractedText {
    pub content: String,
    pub file_type: String,
}

/// Pluggable extraction capability for formats the core does not decode.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles the given lowercase extension.
    fn supports(&self, extension: &str) -> bool;

    fn extract(&self, path: &Path) -> Result<String>;
}

/// Lowercase extension of a path, empty string when absent.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Extract plain text from a file, trying registered extractors for
/// non-text formats.
pub fn extract_text(path: &Path, extractors: &[Box<dyn TextExtractor>]) -> Result<ExtractedText> {
    let ext = file_extension(path);

    match ext.as_str() {
        "txt" | "md" | "markdown" => {
            let content = fs::read_to_string(path)?;
            Ok(ExtractedText {
                content,
                file_type: if ext == "markdown" { "md".into() } else { ext },
            })
        }
        _ => {
            for extractor in extractors {
                if extractor.supports(&ext) {
                    let content = extractor.extract(path)?;
                    return Ok(ExtractedText {
                        content,
                        file_type: ext,
                    });
                }
            }
            Err(Error::UnsupportedFormat(ext))
        }
    }
}

/// Built-in PDF extractor.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn supports(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::Parse(format!("PDF extraction failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn plain_text_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "hello there").unwrap();

        let extracted = extract_text(&path, &[]).unwrap();
        assert_eq!(extracted.content, "hello there");
        assert_eq!(extracted.file_type, "txt");
    }

    #[test]
    fn markdown_normalizes_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.MARKDOWN");
        fs::write(&path, "# title").unwrap();

        let extracted = extract_text(&path, &[]).unwrap();
        assert_eq!(extracted.file_type, "md");
    }

    #[test]
    fn unknown_format_without_extractor_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        fs::write(&path, b"binary").unwrap();

        match extract_text(&path, &[]) {
            Err(Error::UnsupportedFormat(ext)) => assert_eq!(ext, "epub"),
            other => panic!("expected unsupported format, got {:?}", other.map(|e| e.content)),
        }
    }

    #[test]
    fn registered_extractor_claims_its_format() {
        struct Upper;
        impl TextExtractor for Upper {
            fn supports(&self, extension: &str) -> bool {
                extension == "up"
            }
            fn extract(&self, path: &Path) -> Result<String> {
                Ok(fs::read_to_string(path)?.to_uppercase())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shout.up");
        fs::write(&path, "loud").unwrap();

        let extractors: Vec<Box<dyn TextExtractor>> = vec![Box::new(Upper)];
        let extracted = extract_text(&path, &extractors).unwrap();
        assert_eq!(extracted.content, "LOUD");
        assert_eq!(extracted.file_type, "up");
    }
}
