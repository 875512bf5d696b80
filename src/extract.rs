//! Document reading: plain text, CSV, and HTML into clean UTF-8 text.
//!
//! The format is chosen by file extension. Every format ends up passed
//! through [`clean_text`] before chunking.

use corpus_harness_core::models::DocumentFormat;
use corpus_harness_core::normalize::clean_text;
use scraper::{Html, Node};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Elements whose text never reaches the index.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document format: {path} (expected .txt, .csv, .html)")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Detect a path's format from its extension.
pub fn detect_format(path: &Path) -> Result<DocumentFormat, DocumentError> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
        .ok_or_else(|| DocumentError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
}

/// Read a document and return its normalized text.
pub fn read_document(path: &Path) -> Result<String, DocumentError> {
    let format = detect_format(path)?;
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = String::from_utf8_lossy(&bytes);

    let text = match format {
        DocumentFormat::Plain => raw.into_owned(),
        DocumentFormat::Tabular => extract_csv(&raw).map_err(|reason| DocumentError::Parse {
            path: path.to_path_buf(),
            reason,
        })?,
        DocumentFormat::Markup => extract_html(&raw),
    };

    Ok(clean_text(&text))
}

/// Re-serialize CSV rows as comma-separated lines, header included.
/// Rows with a field count different from the first row are rejected.
fn extract_csv(raw: &str) -> Result<String, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(raw.as_bytes());
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Text nodes of an HTML document, one per line, skipping script and style.
fn extract_html(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => SKIPPED_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn plain_text_is_cleaned() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", "  Hello\u{a0}\tworld\n\n\n\nbye  ".as_bytes());
        assert_eq!(read_document(&path).unwrap(), "Hello world\n\nbye");
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", b"ok \xff done");
        let text = read_document(&path).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with("done"));
    }

    #[test]
    fn csv_keeps_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.csv", b"clause,months\nnon-compete,12\nnotice,3\n");
        assert_eq!(
            read_document(&path).unwrap(),
            "clause,months\nnon-compete,12\nnotice,3"
        );
    }

    #[test]
    fn ragged_csv_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.csv", b"a,b\n1,2,3\n");
        assert!(matches!(
            read_document(&path),
            Err(DocumentError::Parse { .. })
        ));
    }

    #[test]
    fn html_drops_tags_and_scripts() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "p.HTML",
            b"<html><head><style>p{}</style><script>var x=1;</script></head>\
              <body><h1>Title</h1><p>First <b>bold</b> para.</p></body></html>",
        );
        let text = read_document(&path).unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("bold"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "doc.pdf", b"%PDF");
        assert!(matches!(
            read_document(&path),
            Err(DocumentError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("noext")),
            Err(DocumentError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            read_document(Path::new("/nonexistent/dir/a.txt")),
            Err(DocumentError::Io { .. })
        ));
    }
}
