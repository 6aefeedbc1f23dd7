use std::error::Error as StdError;

use thiserror::Error;

use super::{
    entries::ResolveError, init::InitError, pdf::PdfError, render::RenderError,
    stage::StageError, theme::ThemeError,
};
use crate::{config::LoadError, infra::error::InfraError};

/// Any failure that aborts a build. There is no partial-success outcome.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl BuildError {
    /// Stable classification used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Config(LoadError::NoEntry) => "no_entry",
            BuildError::Config(LoadError::Size(_)) => "size_parse",
            BuildError::Theme(_) => "theme_resolution",
            BuildError::Config(_) => "config",
            BuildError::Resolve(ResolveError::Theme(_)) => "theme_resolution",
            BuildError::Resolve(_) => "entry",
            BuildError::Stage(_) => "stage",
            BuildError::Render(RenderError::Timeout { .. } | RenderError::TocTimeout { .. }) => {
                "render_timeout"
            }
            BuildError::Render(RenderError::Browser(_) | RenderError::ViewerUnavailable { .. }) => {
                "browser_process"
            }
            BuildError::Render(_) => "render",
            BuildError::Pdf(_) => "pdf",
            BuildError::Init(_) => "init",
            BuildError::Infra(_) => "infra",
        }
    }

    /// The error followed by each of its sources, outermost first.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if messages.last() != Some(&message) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }
}
