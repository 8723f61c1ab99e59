//! Document loaders: turn files on disk into normalized text segments.
//!
//! Each supported format is a [`DocumentLoader`] registered in a
//! [`LoaderRegistry`] under its lowercase file extensions. Dispatch never
//! guesses: a path whose extension has no registered loader (or that has no
//! extension at all) fails with [`LoadError::UnsupportedFormat`].
//!
//! | Kind | Extensions | Segments |
//! |------|------------|----------|
//! | [`DocumentKind::Text`] | `txt`, `text`, `md`, `markdown` | one, whole file |
//! | [`DocumentKind::Pdf`] | `pdf` | one per non-blank page |
//!
//! Loading is a pure read. Text must be valid UTF-8; a leading byte-order
//! mark is removed and CRLF line endings become LF. PDF text comes from
//! `pdf-extract`, which separates pages with form feeds. A panic inside the
//! PDF parser is caught and reported as [`LoadError::Pdf`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use quarry_core::models::{Document, DocumentKind, Segment};

/// Per-document loading failure.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("PDF extraction failed for {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::UnsupportedFormat { path }
            | LoadError::Read { path, .. }
            | LoadError::Decode { path, .. }
            | LoadError::Pdf { path, .. } => path,
        }
    }
}

/// A loader for one document format.
pub trait DocumentLoader: Send + Sync {
    fn kind(&self) -> DocumentKind;

    /// Lowercase extensions (without the dot) handled by this loader.
    fn extensions(&self) -> &'static [&'static str];

    /// Read `path` and return its text segments in document order.
    fn load_segments(&self, path: &Path) -> Result<Vec<Segment>, LoadError>;
}

/// Plain text and Markdown.
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Text
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "text", "md", "markdown"]
    }

    fn load_segments(&self, path: &Path) -> Result<Vec<Segment>, LoadError> {
        let bytes = read_bytes(path)?;
        let text = String::from_utf8(bytes).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(vec![Segment::new(normalize_text(&text))])
    }
}

/// PDF, one segment per page with extractable text.
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn load_segments(&self, path: &Path) -> Result<Vec<Segment>, LoadError> {
        let bytes = read_bytes(path)?;
        let text = extract_pdf_text(&bytes).map_err(|message| LoadError::Pdf {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(split_pages(&text))
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("parser panicked: {}", detail))
        }
    }
}

/// Split extracted PDF text on form feeds into numbered page segments,
/// dropping pages with no text.
fn split_pages(text: &str) -> Vec<Segment> {
    text.split('\x0c')
        .enumerate()
        .filter_map(|(i, page)| {
            let page_text = normalize_text(page);
            let page_text = page_text.trim();
            if page_text.is_empty() {
                None
            } else {
                Some(Segment::page(page_text, i as u32 + 1))
            }
        })
        .collect()
}

fn normalize_text(text: &str) -> String {
    text.strip_prefix('\u{feff}')
        .unwrap_or(text)
        .replace("\r\n", "\n")
}

/// Maps lowercase file extensions to loaders.
pub struct LoaderRegistry {
    loaders: HashMap<&'static str, Arc<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TextLoader));
        registry.register(Arc::new(PdfLoader));
        registry
    }
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Register `loader` for all of its extensions, replacing any loader
    /// previously registered for the same extension.
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        for &ext in loader.extensions() {
            self.loaders.insert(ext, loader.clone());
        }
    }

    pub fn loader_for(&self, path: &Path) -> Result<&dyn DocumentLoader, LoadError> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .and_then(|e| self.loaders.get(e.as_str()))
            .map(|l| l.as_ref())
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.loader_for(path).is_ok()
    }

    /// Sorted list of registered extensions.
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<_> = self.loaders.keys().copied().collect();
        exts.sort_unstable();
        exts
    }

    /// Load `path` into a [`Document`] whose source is the path as given.
    pub fn load(&self, path: &Path) -> Result<Document, LoadError> {
        let loader = self.loader_for(path)?;
        let segments = loader.load_segments(path)?;
        Ok(Document::new(
            path.display().to_string(),
            loader.kind(),
            segments,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_text_file_loads_single_segment() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sky.txt", b"The sky is blue.");
        let doc = LoaderRegistry::default().load(&path).unwrap();
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.source, path.display().to_string());
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.segments[0].text, "The sky is blue.");
        assert_eq!(doc.segments[0].page, None);
    }

    #[test]
    fn test_text_normalization() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "notes.MD", "\u{feff}line one\r\nline two\r\n".as_bytes());
        let doc = LoaderRegistry::default().load(&path).unwrap();
        assert_eq!(doc.segments[0].text, "line one\nline two\n");
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.txt", &[0x66, 0x6f, 0xff, 0xfe]);
        let err = LoaderRegistry::default().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_unsupported_extensions() {
        let registry = LoaderRegistry::default();
        for name in ["report.docx", "Makefile", "archive.tar.gz"] {
            let err = registry.load(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, LoadError::UnsupportedFormat { .. }),
                "{} should be unsupported",
                name
            );
        }
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = LoaderRegistry::default()
            .load(&dir.path().join("gone.txt"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn test_corrupt_pdf_is_pdf_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.pdf", b"this is not a pdf");
        let err = LoaderRegistry::default().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Pdf { .. }));
    }

    #[test]
    fn test_split_pages_numbers_and_skips_blank() {
        let segments = split_pages("first page\x0c  \n\x0cthird page\r\nmore");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first page");
        assert_eq!(segments[0].page, Some(1));
        assert_eq!(segments[1].text, "third page\nmore");
        assert_eq!(segments[1].page, Some(3));
    }

    #[test]
    fn test_registry_extensions_and_register() {
        struct CsvLoader;
        impl DocumentLoader for CsvLoader {
            fn kind(&self) -> DocumentKind {
                DocumentKind::Text
            }
            fn extensions(&self) -> &'static [&'static str] {
                &["csv"]
            }
            fn load_segments(&self, _path: &Path) -> Result<Vec<Segment>, LoadError> {
                Ok(vec![Segment::new("a,b")])
            }
        }

        let mut registry = LoaderRegistry::default();
        assert_eq!(
            registry.extensions(),
            vec!["markdown", "md", "pdf", "text", "txt"]
        );
        assert!(!registry.supports(Path::new("data.csv")));
        registry.register(Arc::new(CsvLoader));
        assert!(registry.supports(Path::new("DATA.CSV")));
        assert_eq!(
            registry.load(Path::new("data.csv")).unwrap().segments[0].text,
            "a,b"
        );
    }
}
