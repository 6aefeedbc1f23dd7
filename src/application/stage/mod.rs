//! Artifact staging: lays out the publication the viewer will paginate.
//!
//! Entries and the table of contents are written before `manifest.json`, so
//! every href the manifest carries exists once the manifest does.

pub mod markdown;
pub mod toc;

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Instant,
};

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info};

use self::{
    markdown::{DocumentShell, MarkdownTransform, TransformError},
    toc::{TocLink, render_toc},
};
use super::entries::Publication;
use crate::{
    config::{EffectiveConfig, TocSetting},
    domain::{
        entry::ResolvedEntry,
        manifest::{
            BOOK_TYPE, MANIFEST_FILE_NAME, ManifestLink, ManifestMetadata, PublicationManifest,
            TOC_FILE_NAME,
        },
        theme::{ThemeLocation, ThemeRecord},
        types::DocumentType,
    },
    util::paths,
};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("refusing to stage into `{staging}`: clearing it would delete `{protected}`")]
    UnsafeStagingDir { staging: PathBuf, protected: PathBuf },
    #[error("failed to {op} `{path}`: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to transform `{path}`: {source}")]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },
    #[error("failed to render `{path}`: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: askama::Error,
    },
    #[error("table of contents document `{path}` does not exist")]
    MissingTocDocument { path: PathBuf },
    #[error("failed to serialise manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("failed to format modification timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl StageError {
    fn io<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the render step needs from a finished staging run.
#[derive(Debug, Clone)]
pub struct StagedPublication {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: PublicationManifest,
    pub toc_path: Option<PathBuf>,
    /// Staged entry paths relative to `root`, in reading order.
    pub entry_hrefs: Vec<String>,
}

/// Stage `publication` under `config.output_dir`. Any failure aborts the
/// whole run; a partially written staging tree is left for inspection.
pub fn stage(
    config: &EffectiveConfig,
    publication: &Publication,
    transform: &dyn MarkdownTransform,
) -> Result<StagedPublication, StageError> {
    let started = Instant::now();
    let root = config.output_dir.clone();

    let protected = protected_paths(config, publication);
    prepare_staging_dir(&root, &protected, &config.artifacts_dir())?;

    for entry in &publication.entries {
        stage_entry(config, entry, transform)?;
    }

    for theme in publication.themes.iter() {
        stage_theme(&root, theme)?;
    }

    let toc_path = match &config.table_of_contents {
        TocSetting::Disabled => None,
        TocSetting::Custom(source) => Some(copy_toc(&root, source)?),
        TocSetting::Generated => Some(write_toc(config, publication)?),
    };

    let entry_hrefs: Vec<String> = publication
        .entries
        .iter()
        .map(|entry| href_from(&root, &entry.target_path))
        .collect();

    let manifest = build_manifest(config, publication, &entry_hrefs, toc_path.is_some())?;
    let manifest_path = root.join(MANIFEST_FILE_NAME);
    let encoded = serde_json::to_vec_pretty(&manifest)?;
    fs::write(&manifest_path, encoded).map_err(StageError::io("write", &manifest_path))?;

    info!(
        target = "bindery::stage",
        op = "stage",
        root = %root.display(),
        entries = publication.entries.len(),
        themes = publication.themes.len(),
        toc = toc_path.is_some(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Staged publication"
    );

    Ok(StagedPublication {
        root,
        manifest_path,
        manifest,
        toc_path,
        entry_hrefs,
    })
}

/// Inputs that must survive the staging directory being cleared.
fn protected_paths<'a>(
    config: &'a EffectiveConfig,
    publication: &'a Publication,
) -> Vec<&'a Path> {
    let mut protected = vec![config.context_dir.as_path()];
    protected.extend(
        publication
            .entries
            .iter()
            .map(|entry| entry.source_path.as_path()),
    );
    let themes = publication.root_theme.iter().chain(publication.themes.iter());
    protected.extend(themes.filter_map(|theme| match &theme.location {
        ThemeLocation::Local(path) => Some(path.as_path()),
        ThemeLocation::Remote(_) => None,
    }));
    if let TocSetting::Custom(source) = &config.table_of_contents {
        protected.push(source.as_path());
    }
    protected
}

fn prepare_staging_dir(
    root: &Path,
    protected: &[&Path],
    artifacts: &Path,
) -> Result<(), StageError> {
    if let Some(path) = protected.iter().find(|path| path.starts_with(root)) {
        return Err(StageError::UnsafeStagingDir {
            staging: root.to_path_buf(),
            protected: path.to_path_buf(),
        });
    }

    if root.exists() {
        fs::remove_dir_all(root).map_err(StageError::io("clear", root))?;
    }
    fs::create_dir_all(artifacts).map_err(StageError::io("create", artifacts))
}

fn stage_entry(
    config: &EffectiveConfig,
    entry: &ResolvedEntry,
    transform: &dyn MarkdownTransform,
) -> Result<(), StageError> {
    fs::create_dir_all(&entry.target_dir).map_err(StageError::io("create", &entry.target_dir))?;

    match entry.document_type {
        DocumentType::Html => {
            fs::copy(&entry.source_path, &entry.target_path)
                .map_err(StageError::io("copy", &entry.source_path))?;
        }
        DocumentType::Markdown => {
            let source = fs::read_to_string(&entry.source_path)
                .map_err(StageError::io("read", &entry.source_path))?;
            let stylesheet = entry
                .theme
                .as_ref()
                .map(|theme| stylesheet_href(theme, &entry.target_dir, &config.output_dir));
            let shell = DocumentShell {
                language: &config.language,
                title: entry.title.as_deref(),
                stylesheet: stylesheet.as_deref(),
            };
            let html = transform
                .transform(&source, &shell)
                .map_err(|source| StageError::Transform {
                    path: entry.source_path.clone(),
                    source,
                })?;
            fs::write(&entry.target_path, html)
                .map_err(StageError::io("write", &entry.target_path))?;
        }
    }

    debug!(
        target = "bindery::stage",
        op = "entry",
        source = %entry.source_path.display(),
        target_path = %entry.target_path.display(),
        document_type = entry.document_type.as_str(),
        "Staged entry"
    );
    Ok(())
}

fn stage_theme(root: &Path, theme: &ThemeRecord) -> Result<(), StageError> {
    match &theme.location {
        ThemeLocation::Local(source) => {
            let target = root.join(&theme.name);
            fs::copy(source, &target).map_err(StageError::io("copy", source))?;
            debug!(
                target = "bindery::stage",
                op = "theme",
                name = %theme.name,
                source = %source.display(),
                "Copied local theme"
            );
        }
        ThemeLocation::Remote(url) => {
            debug!(
                target = "bindery::stage",
                op = "theme",
                name = %theme.name,
                url = %url,
                "Remote theme left for the viewer to fetch"
            );
        }
    }
    Ok(())
}

fn copy_toc(root: &Path, source: &Path) -> Result<PathBuf, StageError> {
    if !source.is_file() {
        return Err(StageError::MissingTocDocument {
            path: source.to_path_buf(),
        });
    }
    let target = root.join(TOC_FILE_NAME);
    fs::copy(source, &target).map_err(StageError::io("copy", source))?;
    Ok(target)
}

fn write_toc(config: &EffectiveConfig, publication: &Publication) -> Result<PathBuf, StageError> {
    let root = &config.output_dir;
    let links: Vec<TocLink> = publication
        .entries
        .iter()
        .map(|entry| TocLink {
            href: href_from(root, &entry.target_path),
            label: entry.display_title(),
        })
        .collect();

    let stylesheet = publication
        .root_theme
        .as_ref()
        .map(|theme| stylesheet_href(theme, root, root));
    let shell = DocumentShell {
        language: &config.language,
        title: Some(&config.toc_title),
        stylesheet: stylesheet.as_deref(),
    };

    let target = root.join(TOC_FILE_NAME);
    let html = render_toc(&shell, &config.toc_title, &links).map_err(|source| {
        StageError::Render {
            path: target.clone(),
            source,
        }
    })?;
    fs::write(&target, html).map_err(StageError::io("write", &target))?;
    Ok(target)
}

fn build_manifest(
    config: &EffectiveConfig,
    publication: &Publication,
    entry_hrefs: &[String],
    with_toc: bool,
) -> Result<PublicationManifest, StageError> {
    let title = config
        .title
        .clone()
        .or_else(|| publication.entries.iter().find_map(|entry| entry.title.clone()))
        .unwrap_or_default();

    let metadata = ManifestMetadata {
        kind: BOOK_TYPE.to_string(),
        title,
        author: config.author.clone().unwrap_or_default(),
        language: config.language.clone(),
        modified: OffsetDateTime::now_utc().format(&Rfc3339)?,
    };

    let reading_order = publication
        .entries
        .iter()
        .zip(entry_hrefs)
        .map(|(entry, href)| ManifestLink::reading_item(href.clone(), entry.display_title()))
        .collect();
    let contents = with_toc.then(|| ManifestLink::contents(TOC_FILE_NAME, &config.toc_title));

    Ok(PublicationManifest::new(metadata, reading_order, contents))
}

/// Stylesheet reference as seen from `from_dir`: relative for staged local
/// themes, the URL itself for remote ones.
pub fn stylesheet_href(theme: &ThemeRecord, from_dir: &Path, root: &Path) -> String {
    match &theme.location {
        ThemeLocation::Local(_) => href_from(from_dir, &root.join(&theme.name)),
        ThemeLocation::Remote(url) => url.to_string(),
    }
}

fn href_from(from_dir: &Path, target: &Path) -> String {
    paths::to_href(&paths::relative_to(from_dir, target))
}
