//! Navigation URL handed to the browser: the broker page plus everything the
//! viewer needs to find and lay out the staged publication.

use url::Url;

use crate::domain::{manifest::MANIFEST_FILE_NAME, page_size::PageSize, types::LoadMode};

pub const LOOPBACK_HOST: &str = "127.0.0.1";
pub const BROKER_PAGE: &str = "broker/index.html";

#[derive(Debug, Clone)]
pub struct NavigationTarget<'a> {
    pub broker_port: u16,
    pub source_port: u16,
    /// Entry document relative to the staging root.
    pub entry: &'a str,
    pub load_mode: LoadMode,
    pub page_size: Option<&'a PageSize>,
}

impl NavigationTarget<'_> {
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "http://{LOOPBACK_HOST}:{}/{BROKER_PAGE}",
            self.broker_port
        ))?;
        let source = Url::parse(&format!("http://{LOOPBACK_HOST}:{}/", self.source_port))?
            .join(self.entry)?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("render", source.as_str());
            query.append_pair("loadMode", self.load_mode.as_str());
            if let Some(size) = self.page_size {
                for (key, value) in size.query_pairs() {
                    query.append_pair(key, value);
                }
            }
        }
        Ok(url)
    }
}

/// Book mode renders the manifest; document mode the first staged entry.
pub fn entry_document(load_mode: LoadMode, entry_hrefs: &[String]) -> Option<&str> {
    match load_mode {
        LoadMode::Book => Some(MANIFEST_FILE_NAME),
        LoadMode::Document => entry_hrefs.first().map(String::as_str),
    }
}
