//! Publication manifest (`manifest.json`) handed to the viewer in book mode.

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const TOC_FILE_NAME: &str = "toc.html";
pub const MANIFEST_CONTEXT: &str = "https://readium.org/webpub-manifest/context.jsonld";
pub const BOOK_TYPE: &str = "http://schema.org/Book";
pub const HTML_MEDIA_TYPE: &str = "text/html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationManifest {
    #[serde(rename = "@context")]
    pub context: String,
    pub metadata: ManifestMetadata,
    pub links: Vec<ManifestLink>,
    #[serde(rename = "readingOrder")]
    pub reading_order: Vec<ManifestLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ManifestLink>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(rename = "@type")]
    pub kind: String,
    pub title: String,
    pub author: String,
    pub language: String,
    /// RFC 3339 timestamp of the staging run.
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLink {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ManifestLink {
    pub fn reading_item(href: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: HTML_MEDIA_TYPE.to_string(),
            rel: None,
            title: Some(title.into()),
        }
    }

    pub fn contents(href: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: HTML_MEDIA_TYPE.to_string(),
            rel: Some("contents".to_string()),
            title: Some(title.into()),
        }
    }
}

impl PublicationManifest {
    pub fn new(
        metadata: ManifestMetadata,
        reading_order: Vec<ManifestLink>,
        contents: Option<ManifestLink>,
    ) -> Self {
        Self {
            context: MANIFEST_CONTEXT.to_string(),
            metadata,
            links: Vec::new(),
            reading_order,
            resources: contents.map(|link| vec![link]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ManifestMetadata {
        ManifestMetadata {
            kind: BOOK_TYPE.to_string(),
            title: "Book".into(),
            author: "Ann".into(),
            language: "en".into(),
            modified: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn resources_omitted_without_contents() {
        let manifest = PublicationManifest::new(
            metadata(),
            vec![ManifestLink::reading_item("artifacts/a.html", "A")],
            None,
        );
        let json = serde_json::to_value(&manifest).expect("serialize");
        assert!(json.get("resources").is_none());
        assert_eq!(json["@context"], MANIFEST_CONTEXT);
        assert_eq!(json["metadata"]["@type"], BOOK_TYPE);
        assert_eq!(json["readingOrder"][0]["type"], "text/html");
        assert!(json["readingOrder"][0].get("rel").is_none());
    }

    #[test]
    fn resources_carry_contents_link() {
        let manifest = PublicationManifest::new(
            metadata(),
            Vec::new(),
            Some(ManifestLink::contents(TOC_FILE_NAME, "Table of Contents")),
        );
        let json = serde_json::to_value(&manifest).expect("serialize");
        assert_eq!(json["resources"][0]["href"], "toc.html");
        assert_eq!(json["resources"][0]["rel"], "contents");
        assert_eq!(json["resources"][0]["title"], "Table of Contents");
    }
}
