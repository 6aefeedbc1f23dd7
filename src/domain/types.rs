//! Shared domain enumerations.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source format of an entry, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Markdown,
    Html,
}

impl DocumentType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "md" | "markdown" => Some(DocumentType::Markdown),
            "html" | "htm" | "xhtml" => Some(DocumentType::Html),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Markdown => "markdown",
            DocumentType::Html => "html",
        }
    }
}

/// How the viewer paginates the staged publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Load the publication manifest and paginate every entry in reading order.
    #[default]
    Book,
    /// Paginate the first entry as a standalone document.
    Document,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Book => "book",
            LoadMode::Document => "document",
        }
    }
}
