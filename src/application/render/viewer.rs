//! The in-page viewer object (`window.coreViewer`), reached only through
//! [`PageDriver::evaluate`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::{
    RenderError,
    driver::{DriverError, PageDriver},
};

const VIEWER: &str = "window.coreViewer";
pub const READY_COMPLETE: &str = "complete";
/// Action tag carried by the viewer's `done` event after a TOC toggle.
pub const TOC_ACTION: &str = "toc";

pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
pub const DCTERMS_CREATOR: &str = "http://purl.org/dc/terms/creator";
pub const DCTERMS_LANGUAGE: &str = "http://purl.org/dc/terms/language";
pub const DCTERMS_SUBJECT: &str = "http://purl.org/dc/terms/subject";
pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataValue {
    pub v: String,
}

/// Metadata as computed by the viewer, keyed by property IRI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ExtractedMetadata(pub BTreeMap<String, Vec<MetadataValue>>);

impl ExtractedMetadata {
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)?
            .iter()
            .map(|value| value.v.trim())
            .find(|value| !value.is_empty())
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .map(|values| values.iter().map(|value| value.v.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.first(DCTERMS_TITLE)
    }

    pub fn creators(&self) -> Vec<&str> {
        self.all(DCTERMS_CREATOR)
    }

    pub fn language(&self) -> Option<&str> {
        self.first(DCTERMS_LANGUAGE)
    }

    pub fn subjects(&self) -> Vec<&str> {
        self.all(DCTERMS_SUBJECT)
    }

    pub fn description(&self) -> Option<&str> {
        self.first(DCTERMS_DESCRIPTION)
    }
}

/// One destination anchor in the viewer's table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TocItem {
    pub id: String,
    pub title: String,
    pub children: Vec<TocItem>,
}

pub struct Viewer<'a> {
    page: &'a dyn PageDriver,
}

impl<'a> Viewer<'a> {
    pub fn new(page: &'a dyn PageDriver) -> Self {
        Self { page }
    }

    pub async fn exists(&self) -> Result<bool, RenderError> {
        let value = self
            .page
            .evaluate(&format!("typeof {VIEWER} === 'object' && {VIEWER} !== null"))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn ready_state(&self) -> Result<Option<String>, RenderError> {
        let value = self.page.evaluate(&format!("{VIEWER}.readyState")).await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn metadata(&self) -> Result<ExtractedMetadata, RenderError> {
        let value = self.page.evaluate(&format!("{VIEWER}.getMetadata()")).await?;
        decode_or_default(value, "getMetadata")
    }

    /// Show the TOC panel so its anchors exist, read it, then hide it again.
    /// Only a `done` event tagged with the TOC action completes the wait.
    pub async fn toc(&self) -> Result<Vec<TocItem>, RenderError> {
        self.page.evaluate(&toc_round_trip_script(TOC_ACTION)).await?;
        let value = self.page.evaluate(&format!("{VIEWER}.getTOC()")).await?;
        self.set_toc_visible(false).await?;
        decode_or_default(value, "getTOC")
    }

    pub async fn set_toc_visible(&self, visible: bool) -> Result<(), RenderError> {
        self.page
            .evaluate(&format!("void {VIEWER}.showTOC({visible})"))
            .await?;
        Ok(())
    }
}

fn toc_round_trip_script(action: &str) -> String {
    let action = Value::String(action.to_string());
    format!(
        r#"new Promise((resolve) => {{
  const viewer = {VIEWER};
  const listener = (payload) => {{
    if (!payload || payload.a !== {action}) {{
      return;
    }}
    viewer.removeListener('done', listener);
    resolve(true);
  }};
  viewer.addListener('done', listener);
  viewer.showTOC(true);
}})"#
    )
}

fn decode_or_default<T>(value: Value, call: &'static str) -> Result<T, RenderError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|err| {
        RenderError::Browser(DriverError::Evaluation(format!(
            "{call} returned an unexpected shape: {err}"
        )))
    })
}
