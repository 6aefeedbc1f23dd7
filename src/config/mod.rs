//! Configuration layer: CLI flags, config file and package metadata resolved
//! into one immutable [`EffectiveConfig`].

mod cli;
pub mod package;
pub mod precedence;

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use config::{Config, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{
    domain::{
        entry::{EntrySpec, RawEntry},
        page_size::{PageSize, SizeParseError, parse_page_size},
        types::LoadMode,
    },
    util::paths,
};

pub use cli::{BuildArgs, BuildOverrides, CliArgs, Command, InitArgs};
use package::{PackageDescriptor, PackageError};
use precedence::{pick, pick_or};

pub const DEFAULT_CONFIG_FILE: &str = "bindery.toml";
pub const DEFAULT_OUTPUT_FILE: &str = "output.pdf";
pub const DEFAULT_STAGING_DIR: &str = ".bindery";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_TOC_TITLE: &str = "Table of Contents";
pub const DEFAULT_VIEWER_DIR: &str = "node_modules/@vivliostyle/viewer/lib";

/// Fully-resolved build settings. Read by every pipeline stage, never mutated.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: String,
    pub output_file: PathBuf,
    pub output_dir: PathBuf,
    pub context_dir: PathBuf,
    pub theme: Option<ThemeRef>,
    pub table_of_contents: TocSetting,
    pub toc_title: String,
    pub press_ready: bool,
    pub timeout: Duration,
    pub load_mode: LoadMode,
    pub sandbox: bool,
    pub page_size: Option<PageSize>,
    pub browser_executable: Option<PathBuf>,
    pub viewer_dir: PathBuf,
    pub verbose: bool,
    pub logging: LoggingSettings,
}

impl EffectiveConfig {
    /// Directory under the staging root that holds the staged entries.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.output_dir.join("artifacts")
    }
}

/// A theme reference together with the directory relative paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRef {
    pub value: String,
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocSetting {
    Disabled,
    Generated,
    /// Copy a user-supplied document instead of generating one.
    Custom(PathBuf),
}

impl TocSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TocSetting::Disabled)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

/// Output of configuration resolution: settings plus the normalised entry list.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EffectiveConfig,
    pub entries: Vec<EntrySpec>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("no entry documents were specified")]
    NoEntry,
    #[error(transparent)]
    Size(#[from] SizeParseError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    title: Option<String>,
    author: Option<String>,
    language: Option<String>,
    theme: Option<String>,
    entry: Option<FileEntries>,
    entry_context: Option<PathBuf>,
    out: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    toc: Option<FileToc>,
    toc_title: Option<String>,
    size: Option<String>,
    press_ready: Option<bool>,
    timeout: Option<u64>,
    load_mode: Option<LoadMode>,
    sandbox: Option<bool>,
    executable_browser: Option<PathBuf>,
    viewer_dir: Option<PathBuf>,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileEntries {
    One(RawEntry),
    Many(Vec<RawEntry>),
}

impl FileEntries {
    fn into_vec(self) -> Vec<RawEntry> {
        match self {
            FileEntries::One(entry) => vec![entry],
            FileEntries::Many(entries) => entries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileToc {
    Enabled(bool),
    Document(PathBuf),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

/// The three configuration tiers below the built-in defaults, with per-field
/// precedence functions.
struct Layers<'a> {
    cli: &'a BuildOverrides,
    file: &'a FileConfig,
    package: Option<&'a PackageDescriptor>,
}

impl Layers<'_> {
    fn title(&self) -> Option<String> {
        pick(
            self.cli.title.clone(),
            self.file.title.clone(),
            self.package.and_then(|pkg| pkg.name.clone()),
        )
    }

    fn author(&self) -> Option<String> {
        pick(
            self.cli.author.clone(),
            self.file.author.clone(),
            self.package
                .and_then(|pkg| pkg.author_name().map(str::to_string)),
        )
    }

    fn language(&self) -> String {
        pick_or(
            self.cli.language.clone(),
            self.file.language.clone(),
            None,
            DEFAULT_LANGUAGE.to_string(),
        )
    }

    fn press_ready(&self) -> bool {
        pick_or(self.cli.press_ready_flag(), self.file.press_ready, None, false)
    }

    fn sandbox(&self) -> bool {
        pick_or(self.cli.sandbox_flag(), self.file.sandbox, None, true)
    }

    fn timeout_ms(&self) -> u64 {
        pick_or(self.cli.timeout, self.file.timeout, None, DEFAULT_TIMEOUT_MS)
    }

    fn load_mode(&self) -> LoadMode {
        pick_or(self.cli.load_mode, self.file.load_mode, None, LoadMode::default())
    }

    fn size(&self) -> Option<String> {
        pick(self.cli.size.clone(), self.file.size.clone(), None)
    }

    fn toc_title(&self) -> String {
        pick_or(
            None,
            self.file.toc_title.clone(),
            None,
            DEFAULT_TOC_TITLE.to_string(),
        )
    }

    fn toc(&self, base_dir: &Path) -> TocSetting {
        let document = |path: &PathBuf| TocSetting::Custom(paths::absolutize(base_dir, path));
        match (self.cli.toc_flag(), self.file.toc.as_ref()) {
            (Some(false), _) => TocSetting::Disabled,
            (_, Some(FileToc::Document(path))) => document(path),
            (Some(true), _) | (None, None) => TocSetting::Generated,
            (None, Some(FileToc::Enabled(true))) => TocSetting::Generated,
            (None, Some(FileToc::Enabled(false))) => TocSetting::Disabled,
        }
    }
}

/// Resolve configuration for a build invocation. Relative CLI paths resolve
/// against `cwd`; relative config-file paths against the config file's directory.
pub fn resolve(args: &BuildArgs, cwd: &Path) -> Result<ResolvedConfig, LoadError> {
    let config_path = locate_config_file(args.config_file.as_deref(), cwd)?;
    let file = match config_path.as_deref() {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());

    let context_dir = file
        .entry_context
        .as_deref()
        .map(|dir| paths::absolutize(&base_dir, dir))
        .unwrap_or_else(|| base_dir.clone());

    let package = match PackageDescriptor::find_nearest(&context_dir) {
        Some(path) => Some(PackageDescriptor::read(&path)?),
        None => None,
    };

    let entries = collect_entries(args, &file, cwd)?;
    let overrides = &args.overrides;
    let layers = Layers {
        cli: overrides,
        file: &file,
        package: package.as_ref(),
    };

    let output_file = pick(
        overrides.output.as_deref().map(|p| paths::absolutize(cwd, p)),
        file.out.as_deref().map(|p| paths::absolutize(&base_dir, p)),
        None,
    )
    .unwrap_or_else(|| context_dir.join(DEFAULT_OUTPUT_FILE));
    let output_file = redirect_directory_output(output_file);

    let output_dir = pick(
        overrides.out_dir.as_deref().map(|p| paths::absolutize(cwd, p)),
        file.out_dir.as_deref().map(|p| paths::absolutize(&base_dir, p)),
        None,
    )
    .unwrap_or_else(|| context_dir.join(DEFAULT_STAGING_DIR));

    let theme = pick(
        overrides.theme.clone().map(|value| ThemeRef {
            value,
            base_dir: cwd.to_path_buf(),
        }),
        file.theme.clone().map(|value| ThemeRef {
            value,
            base_dir: base_dir.clone(),
        }),
        None,
    );

    let timeout_ms = layers.timeout_ms();
    if timeout_ms == 0 {
        return Err(LoadError::invalid("timeout", "must be greater than zero"));
    }

    let page_size = layers
        .size()
        .map(|raw| parse_page_size(&raw))
        .transpose()?;

    let viewer_dir = pick(
        overrides
            .viewer_dir
            .as_deref()
            .map(|p| paths::absolutize(cwd, p)),
        file.viewer_dir
            .as_deref()
            .map(|p| paths::absolutize(&base_dir, p)),
        None,
    )
    .unwrap_or_else(|| context_dir.join(DEFAULT_VIEWER_DIR));

    let browser_executable = pick(
        overrides
            .executable_browser
            .as_deref()
            .map(|p| paths::absolutize(cwd, p)),
        file.executable_browser
            .as_deref()
            .map(|p| paths::absolutize(&base_dir, p)),
        None,
    );

    let logging = build_logging_settings(overrides, &file.logging)?;

    let config = EffectiveConfig {
        title: layers.title(),
        author: layers.author(),
        language: layers.language(),
        output_file,
        output_dir,
        context_dir,
        theme,
        table_of_contents: layers.toc(&base_dir),
        toc_title: layers.toc_title(),
        press_ready: layers.press_ready(),
        timeout: Duration::from_millis(timeout_ms),
        load_mode: layers.load_mode(),
        sandbox: layers.sandbox(),
        page_size,
        browser_executable,
        viewer_dir,
        verbose: overrides.verbose,
        logging,
    };

    Ok(ResolvedConfig { config, entries })
}

fn locate_config_file(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>, LoadError> {
    if let Some(path) = explicit {
        let path = paths::absolutize(cwd, path);
        if !path.is_file() {
            return Err(LoadError::MissingConfigFile(path));
        }
        return Ok(Some(path));
    }

    let fallback = cwd.join(DEFAULT_CONFIG_FILE);
    Ok(fallback.is_file().then_some(fallback))
}

fn load_file(path: &Path) -> Result<FileConfig, LoadError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .build()?;
    Ok(config.try_deserialize()?)
}

fn collect_entries(
    args: &BuildArgs,
    file: &FileConfig,
    cwd: &Path,
) -> Result<Vec<EntrySpec>, LoadError> {
    let raw: Vec<RawEntry> = if args.entries.is_empty() {
        file.entry.clone().map(FileEntries::into_vec).unwrap_or_default()
    } else {
        args.entries
            .iter()
            .map(|path| RawEntry::from(paths::absolutize(cwd, path).display().to_string()))
            .collect()
    };

    let entries: Vec<EntrySpec> = raw
        .into_iter()
        .map(RawEntry::normalize)
        .filter(|spec| !spec.path.trim().is_empty())
        .collect();

    if entries.is_empty() {
        return Err(LoadError::NoEntry);
    }
    Ok(entries)
}

/// An existing directory given as output receives `output.pdf`.
pub fn redirect_directory_output(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_OUTPUT_FILE)
    } else {
        path
    }
}

fn build_logging_settings(
    overrides: &BuildOverrides,
    logging: &RawLoggingSettings,
) -> Result<LoggingSettings, LoadError> {
    let verbose_level = overrides.verbose.then(|| "debug".to_string());
    let level = match pick(
        overrides.log_level.clone(),
        verbose_level,
        logging.level.clone(),
    ) {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let json = pick_or(overrides.log_json.then_some(true), logging.json, None, false);
    let format = if json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

/// Starter configuration written by `bindery init`.
pub const INIT_TEMPLATE: &str = r#"# bindery configuration
title = "My Book"
author = "Anonymous"
language = "en"

# Entries in reading order: a path, or a table with path/title/theme.
entry = [
  "manuscript.md",
]

# theme = "https://example.com/theme.css"
# size = "A5"
# out = "book.pdf"
# out_dir = ".bindery"
# toc = true
# press_ready = false
# timeout = 3000
"#;

/// Parse CLI arguments from the process environment.
pub fn parse_cli() -> CliArgs {
    use clap::Parser;
    CliArgs::parse()
}
