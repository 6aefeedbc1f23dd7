//! Browser seam. The orchestrator talks to a page through [`PageDriver`];
//! `infra::browser` provides the Chromium-backed implementation.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to `{url}` failed: {message}")]
    Navigation { url: String, message: String },
    #[error("page evaluation failed: {0}")]
    Evaluation(String),
    #[error("browser protocol error during {op}: {message}")]
    Protocol { op: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit browser binary; the driver's own discovery applies otherwise.
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
    /// Forward filtered in-page console output.
    pub verbose: bool,
    pub navigation_timeout: Duration,
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError>;
}

/// A single headless page. Every call suspends until the browser answers.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and return once the network is idle.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Evaluate an expression, awaiting it when it yields a promise. An
    /// `undefined` result comes back as `Value::Null`.
    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError>;

    async fn emulate_print_media(&self) -> Result<(), DriverError>;

    /// Zero margins, CSS page size preferred, backgrounds printed.
    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError>;

    /// Shut the page and its browser process down.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Responses outside `[200, 300)` are reported as anomalies.
pub fn is_anomalous_status(status: i64) -> bool {
    !(200..300).contains(&status)
}
