//! Entries as authored by the user and as resolved against the staging tree.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{theme::ThemeRecord, types::DocumentType};

/// An entry exactly as written in configuration: a bare path or a detailed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEntry {
    Path(String),
    Detailed(EntrySpec),
}

/// Normalised entry form. Per-entry `title` and `theme` override anything
/// discovered inside the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl RawEntry {
    pub fn normalize(self) -> EntrySpec {
        match self {
            RawEntry::Path(path) => EntrySpec {
                path,
                ..EntrySpec::default()
            },
            RawEntry::Detailed(spec) => spec,
        }
    }
}

impl From<String> for RawEntry {
    fn from(path: String) -> Self {
        RawEntry::Path(path)
    }
}

/// An entry whose source has been located and whose staged location is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub document_type: DocumentType,
    pub source_path: PathBuf,
    pub source_dir: PathBuf,
    pub target_path: PathBuf,
    pub target_dir: PathBuf,
    pub title: Option<String>,
    pub theme: Option<ThemeRecord>,
}

impl ResolvedEntry {
    /// Label used when the entry has no resolved title: the staged file name
    /// without its extension.
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref() {
            return title.to_string();
        }
        self.target_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
