//! Render orchestration: content servers, a headless page and the viewer
//! handshake that turns a staged publication into PDF bytes.
//!
//! A session moves through [`RenderPhase`] strictly forward. Any error moves
//! it to `Failed`; the browser is closed and both servers are shut down before
//! the error reaches the caller.

pub mod driver;
pub mod navigation;
pub mod viewer;

use std::{fmt, future::Future, time::Duration};

use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use self::{
    driver::{BrowserLauncher, DriverError, LaunchOptions, PageDriver},
    navigation::{NavigationTarget, entry_document},
    viewer::{ExtractedMetadata, READY_COMPLETE, TocItem, Viewer},
};
use super::stage::StagedPublication;
use crate::{
    config::EffectiveConfig,
    infra::{
        error::InfraError,
        http::{ContentServer, start_broker_server, start_source_server},
    },
};

/// Interval between readiness checks once the viewer paginates.
pub const PAGINATION_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Interval between checks for the viewer object after navigation.
pub const VIEWER_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Started,
    ServersUp,
    BrowserReady,
    ViewerReady,
    PaginationComplete,
    Captured,
    Failed,
}

impl RenderPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderPhase::Started => "started",
            RenderPhase::ServersUp => "servers_up",
            RenderPhase::BrowserReady => "browser_ready",
            RenderPhase::ViewerReady => "viewer_ready",
            RenderPhase::PaginationComplete => "pagination_complete",
            RenderPhase::Captured => "captured",
            RenderPhase::Failed => "failed",
        }
    }

    fn successor(self) -> Option<Self> {
        match self {
            RenderPhase::Started => Some(RenderPhase::ServersUp),
            RenderPhase::ServersUp => Some(RenderPhase::BrowserReady),
            RenderPhase::BrowserReady => Some(RenderPhase::ViewerReady),
            RenderPhase::ViewerReady => Some(RenderPhase::PaginationComplete),
            RenderPhase::PaginationComplete => Some(RenderPhase::Captured),
            RenderPhase::Captured | RenderPhase::Failed => None,
        }
    }

    /// Move to `next`, which must be the immediate successor.
    pub fn advance(self, next: RenderPhase) -> Result<RenderPhase, RenderError> {
        if self.successor() == Some(next) {
            Ok(next)
        } else {
            Err(RenderError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RenderPhase::Captured | RenderPhase::Failed)
    }
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("content server failed: {0}")]
    Server(#[from] InfraError),
    #[error(transparent)]
    Browser(#[from] DriverError),
    #[error("invalid navigation url: {0}")]
    Navigation(#[from] url::ParseError),
    #[error("no staged entry to render")]
    NoDocument,
    #[error("viewer did not appear within {waited_ms} ms")]
    ViewerUnavailable { waited_ms: u64 },
    #[error("pagination did not complete within {waited_ms} ms")]
    Timeout { waited_ms: u64 },
    #[error("table of contents was not shown within {waited_ms} ms")]
    TocTimeout { waited_ms: u64 },
    #[error("render phase `{from}` cannot advance to `{to}`")]
    InvalidTransition { from: RenderPhase, to: RenderPhase },
}

/// Per-build state owned by one render call and dropped at its end.
pub struct RenderSession {
    pub phase: RenderPhase,
    pub source_port: Option<u16>,
    pub broker_port: Option<u16>,
    pub navigation_url: Option<Url>,
    page: Option<Box<dyn PageDriver>>,
}

impl RenderSession {
    pub fn new() -> Self {
        Self {
            phase: RenderPhase::Started,
            source_port: None,
            broker_port: None,
            navigation_url: None,
            page: None,
        }
    }

    fn fail(&mut self, error: &RenderError) {
        warn!(
            target = "bindery::render",
            phase = %self.phase,
            error = %error,
            "Render session failed"
        );
        self.phase = RenderPhase::Failed;
    }

    /// Close the page and its browser if one was launched.
    async fn close_browser(&mut self) {
        let Some(mut page) = self.page.take() else {
            return;
        };
        match page.close().await {
            Ok(()) => debug!(target = "bindery::render", "Browser closed"),
            Err(err) => warn!(
                target = "bindery::render",
                error = %err,
                "Failed to close browser cleanly"
            ),
        }
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Values pulled out of the live session, consumed by the PDF post-processor.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub metadata: ExtractedMetadata,
    pub toc: Vec<TocItem>,
    pub pdf: Vec<u8>,
}

pub struct RenderOrchestrator<L> {
    launcher: L,
    pagination_poll: Duration,
    viewer_poll: Duration,
}

impl<L: BrowserLauncher> RenderOrchestrator<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            pagination_poll: PAGINATION_POLL_INTERVAL,
            viewer_poll: VIEWER_POLL_INTERVAL,
        }
    }

    pub async fn render(
        &self,
        config: &EffectiveConfig,
        staged: &StagedPublication,
    ) -> Result<RenderOutput, RenderError> {
        let mut session = RenderSession::new();

        let source = start_source_server(staged.root.clone()).await?;
        let broker = match start_broker_server(config.viewer_dir.clone()).await {
            Ok(broker) => broker,
            Err(err) => {
                shutdown_server(source).await;
                return Err(err.into());
            }
        };

        let outcome = self
            .drive(&mut session, config, staged, source.port(), broker.port())
            .await;
        if let Err(err) = outcome.as_ref() {
            session.fail(err);
        }

        session.close_browser().await;
        shutdown_server(source).await;
        shutdown_server(broker).await;

        outcome
    }

    async fn drive(
        &self,
        session: &mut RenderSession,
        config: &EffectiveConfig,
        staged: &StagedPublication,
        source_port: u16,
        broker_port: u16,
    ) -> Result<RenderOutput, RenderError> {
        let entry = entry_document(config.load_mode, &staged.entry_hrefs)
            .ok_or(RenderError::NoDocument)?;
        let url = NavigationTarget {
            broker_port,
            source_port,
            entry,
            load_mode: config.load_mode,
            page_size: config.page_size.as_ref(),
        }
        .to_url()?;

        session.source_port = Some(source_port);
        session.broker_port = Some(broker_port);
        session.navigation_url = Some(url.clone());
        session.phase = session.phase.advance(RenderPhase::ServersUp)?;
        info!(
            target = "bindery::render",
            source_port,
            broker_port,
            url = %url,
            "Content servers listening"
        );

        let options = LaunchOptions {
            executable: config.browser_executable.clone(),
            sandbox: config.sandbox,
            verbose: config.verbose,
            navigation_timeout: NAVIGATION_TIMEOUT,
        };
        if !options.sandbox {
            warn!(
                target = "bindery::render",
                "Browser sandbox disabled; only do this for trusted sources"
            );
        }
        let launched = self.launcher.launch(&options).await?;
        let page: &dyn PageDriver = &**session.page.insert(launched);
        session.phase = session.phase.advance(RenderPhase::BrowserReady)?;

        let started = Instant::now();
        page.navigate(url.as_str()).await?;
        let viewer = Viewer::new(page);
        bounded(config.timeout, wait_for_viewer(&viewer, self.viewer_poll))
            .await
            .map_err(|waited_ms| RenderError::ViewerUnavailable { waited_ms })?;
        session.phase = session.phase.advance(RenderPhase::ViewerReady)?;
        debug!(
            target = "bindery::render",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Viewer ready"
        );

        page.emulate_print_media().await?;
        let started = Instant::now();
        bounded(config.timeout, wait_for_pagination(&viewer, self.pagination_poll))
            .await
            .map_err(|waited_ms| RenderError::Timeout { waited_ms })??;
        session.phase = session.phase.advance(RenderPhase::PaginationComplete)?;
        info!(
            target = "bindery::render",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pagination complete"
        );

        let metadata = viewer.metadata().await?;
        let toc = bounded(config.timeout, viewer.toc())
            .await
            .map_err(|waited_ms| RenderError::TocTimeout { waited_ms })??;
        debug!(
            target = "bindery::render",
            metadata_keys = metadata.0.len(),
            toc_items = toc.len(),
            "Extracted metadata and table of contents"
        );

        let pdf = page.print_pdf().await?;
        session.phase = session.phase.advance(RenderPhase::Captured)?;
        info!(
            target = "bindery::render",
            bytes = pdf.len(),
            "Captured PDF"
        );

        Ok(RenderOutput { metadata, toc, pdf })
    }
}

/// Run `future` for at most `limit`; the error carries the budget in ms.
async fn bounded<F: Future>(limit: Duration, future: F) -> Result<F::Output, u64> {
    timeout(limit, future)
        .await
        .map_err(|_| limit.as_millis() as u64)
}

/// Poll until the viewer object exists. Evaluation errors count as "not yet",
/// since the broker's redirect to the viewer replaces the execution context.
async fn wait_for_viewer(viewer: &Viewer<'_>, interval: Duration) {
    loop {
        match viewer.exists().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(err) => debug!(
                target = "bindery::render",
                error = %err,
                "Viewer check failed; retrying"
            ),
        }
        sleep(interval).await;
    }
}

async fn wait_for_pagination(viewer: &Viewer<'_>, interval: Duration) -> Result<(), RenderError> {
    loop {
        let state = viewer.ready_state().await?;
        if state.as_deref() == Some(READY_COMPLETE) {
            return Ok(());
        }
        debug!(
            target = "bindery::render",
            ready_state = state.as_deref().unwrap_or("unknown"),
            "Waiting for pagination"
        );
        sleep(interval).await;
    }
}

async fn shutdown_server(server: ContentServer) {
    let name = server.name();
    if let Err(err) = server.shutdown().await {
        warn!(
            target = "bindery::render",
            server = name,
            error = %err,
            "Content server did not shut down cleanly"
        );
    }
}
