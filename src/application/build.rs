//! The build pipeline: resolve, stage, render, post-process. Each step
//! consumes the full output of the one before it.

use std::{path::PathBuf, time::Instant};

use tracing::info;

use super::{
    entries::resolve_entries,
    error::BuildError,
    pdf::{DocumentInfo, PdfDocument, SaveOptions},
    render::{RenderOrchestrator, driver::BrowserLauncher},
    stage::{
        self,
        markdown::{ComrakTransform, MarkdownTransform},
    },
    theme::ThemeResolver,
};
use crate::config::ResolvedConfig;

/// Coarse progress milestones reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Configuring,
    BuildingPages,
    GeneratingPdf,
    ProcessingPdf,
    Done,
}

impl BuildPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildPhase::Configuring => "configuring",
            BuildPhase::BuildingPages => "building pages",
            BuildPhase::GeneratingPdf => "generating PDF",
            BuildPhase::ProcessingPdf => "processing PDF",
            BuildPhase::Done => "done",
        }
    }
}

fn report(phase: BuildPhase) {
    info!(target = "bindery::build", phase = phase.as_str(), "Build progress");
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output_file: PathBuf,
    pub staging_dir: PathBuf,
    pub entries: usize,
    pub outline_items: usize,
}

pub struct BuildPipeline<L> {
    orchestrator: RenderOrchestrator<L>,
    transform: Box<dyn MarkdownTransform>,
}

impl<L: BrowserLauncher> BuildPipeline<L> {
    pub fn new(launcher: L) -> Self {
        Self::with_transform(launcher, Box::new(ComrakTransform::new()))
    }

    pub fn with_transform(launcher: L, transform: Box<dyn MarkdownTransform>) -> Self {
        Self {
            orchestrator: RenderOrchestrator::new(launcher),
            transform,
        }
    }

    pub async fn run(&self, resolved: &ResolvedConfig) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let config = &resolved.config;

        report(BuildPhase::Configuring);
        info!(
            target = "bindery::build",
            context = %config.context_dir.display(),
            output = %config.output_file.display(),
            staging = %config.output_dir.display(),
            entries = resolved.entries.len(),
            load_mode = config.load_mode.as_str(),
            press_ready = config.press_ready,
            timeout_ms = config.timeout.as_millis() as u64,
            "Resolved configuration"
        );
        let resolver = ThemeResolver::new(&config.context_dir);
        let publication = resolve_entries(config, &resolved.entries, &resolver)?;

        report(BuildPhase::BuildingPages);
        let staged = stage::stage(config, &publication, self.transform.as_ref())?;

        report(BuildPhase::GeneratingPdf);
        let output = self.orchestrator.render(config, &staged).await?;

        report(BuildPhase::ProcessingPdf);
        let info = DocumentInfo::from_metadata(&output.metadata).with_fallbacks(
            config.title.as_deref(),
            config.author.as_deref(),
            &config.language,
        );
        let mut document = PdfDocument::load(&output.pdf)?;
        document.apply_metadata(&info)?;
        let outline_items = document.apply_toc(&output.toc)?;
        document.save(
            &config.output_file,
            SaveOptions {
                press_ready: config.press_ready,
            },
        )?;

        report(BuildPhase::Done);
        info!(
            target = "bindery::build",
            output = %config.output_file.display(),
            outline_items,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Build finished"
        );

        Ok(BuildReport {
            output_file: config.output_file.clone(),
            staging_dir: staged.root,
            entries: publication.entries.len(),
            outline_items,
        })
    }
}
