//! Document loading and text extraction.

use docrag_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Detect the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::PlainText),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
        }
    }
}

/// The full text of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub text: String,
}

/// Extract the text of a single file.
pub fn load_file(path: &Path) -> AppResult<Document> {
    let kind = DocumentKind::from_path(path).ok_or_else(|| {
        AppError::Config(format!("Unsupported document type: {}", path.display()))
    })?;

    let text = match kind {
        DocumentKind::PlainText | DocumentKind::Markdown => fs::read_to_string(path)?,
        DocumentKind::Pdf => pdf_extract::extract_text(path).map_err(|e| {
            AppError::Parse(format!("Failed to extract text from {}: {}", path.display(), e))
        })?,
    };

    Ok(Document {
        path: path.to_path_buf(),
        kind,
        text,
    })
}

/// Load every `.txt`, `.md` and `.pdf` file directly inside `dir`, in file
/// name order. Other files are ignored; unreadable ones are skipped with a
/// warning.
pub fn load_documents(dir: &Path) -> AppResult<Vec<Document>> {
    if !dir.is_dir() {
        return Err(AppError::Config(format!(
            "Documents directory not found: {}",
            dir.display()
        )));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || DocumentKind::from_path(path).is_none() {
            continue;
        }

        match load_file(path) {
            Ok(doc) => {
                tracing::debug!(
                    "Loaded {} ({}, {} bytes)",
                    path.display(),
                    doc.kind.as_str(),
                    doc.text.len()
                );
                documents.push(doc);
            }
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    tracing::info!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}
