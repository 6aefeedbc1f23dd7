use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::types::LoadMode;

/// Command-line arguments for the bindery binary.
#[derive(Debug, Parser)]
#[command(
    name = "bindery",
    version,
    about = "Build paginated PDF books from Markdown and HTML"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Stage the configured entries and render them into a PDF.
    Build(Box<BuildArgs>),
    /// Write a starter `bindery.toml` into the working directory.
    Init(InitArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct BuildArgs {
    /// Entry documents; replaces the entry list from the config file.
    #[arg(value_name = "ENTRY", value_hint = ValueHint::FilePath)]
    pub entries: Vec<PathBuf>,

    /// Path to a configuration file. Defaults to `bindery.toml` when present.
    #[arg(
        short = 'c',
        long = "config",
        env = "BINDERY_CONFIG",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: BuildOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BuildOverrides {
    /// Output PDF path. An existing directory receives `output.pdf`.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Staging directory for transformed entries, themes and manifest.
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Theme: stylesheet path, package name or http(s) URL.
    #[arg(short = 't', long = "theme", value_name = "THEME")]
    pub theme: Option<String>,

    /// Page size: a format name (`A4`, `letter`) or `width,height`.
    #[arg(short = 's', long = "size", value_name = "SIZE")]
    pub size: Option<String>,

    /// Publication title.
    #[arg(long = "title", value_name = "TITLE")]
    pub title: Option<String>,

    /// Publication author.
    #[arg(long = "author", value_name = "AUTHOR")]
    pub author: Option<String>,

    /// Publication language tag.
    #[arg(short = 'l', long = "language", value_name = "LANG")]
    pub language: Option<String>,

    /// Generate a table of contents document.
    #[arg(long = "toc", action = clap::ArgAction::SetTrue, conflicts_with = "no_toc")]
    pub toc: bool,

    /// Do not generate a table of contents document.
    #[arg(long = "no-toc", action = clap::ArgAction::SetTrue)]
    pub no_toc: bool,

    /// Rewrite the PDF for print-shop submission.
    #[arg(long = "press-ready", action = clap::ArgAction::SetTrue)]
    pub press_ready: bool,

    /// Debug logging and forwarding of in-page console output.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long = "log-json", action = clap::ArgAction::SetTrue)]
    pub log_json: bool,

    /// Pagination timeout in milliseconds.
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout: Option<u64>,

    /// Launch the browser without the OS sandbox (needed when running as root).
    #[arg(long = "no-sandbox", action = clap::ArgAction::SetTrue)]
    pub no_sandbox: bool,

    /// Browser executable; defaults to an auto-detected Chromium.
    #[arg(long = "executable-browser", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub executable_browser: Option<PathBuf>,

    /// Directory containing the viewer distribution served to the browser.
    #[arg(long = "viewer-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub viewer_dir: Option<PathBuf>,

    /// Paginate the whole publication or only the first entry.
    #[arg(long = "load-mode", value_enum, value_name = "MODE")]
    pub load_mode: Option<LoadMode>,
}

impl BuildOverrides {
    pub fn toc_flag(&self) -> Option<bool> {
        match (self.toc, self.no_toc) {
            (_, true) => Some(false),
            (true, false) => Some(true),
            (false, false) => None,
        }
    }

    pub fn press_ready_flag(&self) -> Option<bool> {
        self.press_ready.then_some(true)
    }

    pub fn sandbox_flag(&self) -> Option<bool> {
        self.no_sandbox.then_some(false)
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct InitArgs {
    /// Overwrite an existing `bindery.toml`.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}
