//! Entry resolution: normalised entries become [`ResolvedEntry`]s with staged
//! target paths, titles and themes, plus the publication's active theme set.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, warn};

use super::{
    discover::{DiscoverError, discover},
    theme::{ThemeError, ThemeResolver},
};
use crate::{
    config::EffectiveConfig,
    domain::{
        entry::{EntrySpec, ResolvedEntry},
        theme::{ThemeInsert, ThemeRecord, ThemeSet},
        types::DocumentType,
    },
    util::paths,
};

const RENDERED_EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("entry `{path}` does not exist")]
    MissingSource { path: PathBuf },
    #[error("entry `{path}` is neither Markdown nor HTML")]
    UnsupportedEntry { path: PathBuf },
    #[error("entry `{path}` lies outside the context directory `{context}`")]
    OutsideContext { path: PathBuf, context: PathBuf },
    #[error("entries `{first}` and `{second}` would both be staged at `{target}`")]
    DuplicateTarget {
        first: PathBuf,
        second: PathBuf,
        target: PathBuf,
    },
    #[error("failed to read entry `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to inspect entry `{path}`: {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: DiscoverError,
    },
    #[error(transparent)]
    Theme(#[from] ThemeError),
}

/// Entries in reading order with the themes they reference.
#[derive(Debug, Clone)]
pub struct Publication {
    pub entries: Vec<ResolvedEntry>,
    pub root_theme: Option<ThemeRecord>,
    pub themes: ThemeSet,
}

/// Resolve entries against the context directory. Reading order is the order
/// of `specs`; title and theme resolution never reorder it.
pub fn resolve_entries(
    config: &EffectiveConfig,
    specs: &[EntrySpec],
    resolver: &ThemeResolver,
) -> Result<Publication, ResolveError> {
    let mut themes = ThemeSet::new();
    let root_theme = match config.theme.as_ref() {
        Some(theme) => resolver.resolve(Some(&theme.value), &theme.base_dir)?,
        None => None,
    };
    if let Some(record) = root_theme.as_ref() {
        register_theme(&mut themes, record);
    }

    let artifacts_dir = config.artifacts_dir();
    let mut targets: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut entries = Vec::with_capacity(specs.len());

    for spec in specs {
        let source_path = paths::absolutize(&config.context_dir, Path::new(&spec.path));
        let entry = resolve_entry(
            spec,
            source_path,
            &config.context_dir,
            &artifacts_dir,
            root_theme.as_ref(),
            resolver,
        )?;

        if let Some(first) = targets.insert(entry.target_path.clone(), entry.source_path.clone()) {
            return Err(ResolveError::DuplicateTarget {
                first,
                second: entry.source_path,
                target: entry.target_path,
            });
        }
        if let Some(record) = entry.theme.as_ref() {
            register_theme(&mut themes, record);
        }

        debug!(
            target = "bindery::entries",
            source = %entry.source_path.display(),
            target_path = %entry.target_path.display(),
            document_type = entry.document_type.as_str(),
            title = entry.title.as_deref().unwrap_or(""),
            "Resolved entry"
        );
        entries.push(entry);
    }

    Ok(Publication {
        entries,
        root_theme,
        themes,
    })
}

fn resolve_entry(
    spec: &EntrySpec,
    source_path: PathBuf,
    context_dir: &Path,
    artifacts_dir: &Path,
    root_theme: Option<&ThemeRecord>,
    resolver: &ThemeResolver,
) -> Result<ResolvedEntry, ResolveError> {
    let document_type =
        DocumentType::from_path(&source_path).ok_or_else(|| ResolveError::UnsupportedEntry {
            path: source_path.clone(),
        })?;
    if !source_path.is_file() {
        return Err(ResolveError::MissingSource { path: source_path });
    }

    let target_path = target_path_for(&source_path, context_dir, artifacts_dir, document_type)?;
    let source_dir = parent_of(&source_path);
    let target_dir = parent_of(&target_path);

    let contents = fs::read_to_string(&source_path).map_err(|source| ResolveError::Read {
        path: source_path.clone(),
        source,
    })?;
    let discovered =
        discover(document_type, &contents).map_err(|source| ResolveError::Discover {
            path: source_path.clone(),
            source,
        })?;

    let title = spec.title.clone().or(discovered.title);
    let theme = match (spec.theme.as_deref(), discovered.theme.as_deref()) {
        (Some(reference), _) => resolver.resolve(Some(reference), context_dir)?,
        (None, Some(reference)) => resolver.resolve(Some(reference), &source_dir)?,
        (None, None) => root_theme.cloned(),
    };

    Ok(ResolvedEntry {
        document_type,
        source_path,
        source_dir,
        target_path,
        target_dir,
        title,
        theme,
    })
}

/// Staged location of a source: its path relative to the context directory,
/// rooted under `artifacts_dir`, with Markdown rewritten to `.html`.
pub fn target_path_for(
    source_path: &Path,
    context_dir: &Path,
    artifacts_dir: &Path,
    document_type: DocumentType,
) -> Result<PathBuf, ResolveError> {
    let outside = || ResolveError::OutsideContext {
        path: source_path.to_path_buf(),
        context: context_dir.to_path_buf(),
    };

    let relative = source_path.strip_prefix(context_dir).map_err(|_| outside())?;
    let mut target = paths::normalize(&artifacts_dir.join(relative));
    if !paths::is_strictly_within(artifacts_dir, &target) {
        return Err(outside());
    }
    if document_type == DocumentType::Markdown {
        target.set_extension(RENDERED_EXTENSION);
    }
    Ok(target)
}

fn register_theme(themes: &mut ThemeSet, record: &ThemeRecord) {
    if let ThemeInsert::Conflict { kept } = themes.insert(record.clone()) {
        warn!(
            target = "bindery::entries",
            name = %record.name,
            kept = %kept.location_display(),
            ignored = %record.location_display(),
            "Theme name already bound to another location; keeping the first"
        );
    }
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
