//! `package.json` descriptors: publication metadata fallback and theme packages.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const PACKAGE_DESCRIPTOR: &str = "package.json";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    pub author: Option<PackageAuthor>,
    pub style: Option<String>,
    pub main: Option<String>,
    pub bindery: Option<BinderyField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageAuthor {
    Name(String),
    Person { name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BinderyField {
    pub theme: Option<ThemeField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeField {
    pub style: Option<String>,
}

impl PackageDescriptor {
    pub fn read(path: &Path) -> Result<Self, PackageError> {
        let contents = fs::read_to_string(path).map_err(|source| PackageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| PackageError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Locate the closest descriptor at or above `start`.
    pub fn find_nearest(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PACKAGE_DESCRIPTOR))
            .find(|candidate| candidate.is_file())
    }

    pub fn author_name(&self) -> Option<&str> {
        match self.author.as_ref()? {
            PackageAuthor::Name(name) | PackageAuthor::Person { name } => Some(name.as_str()),
        }
    }

    /// Stylesheet declared by a theme package: the bindery theme field, then
    /// `style`, then `main`.
    pub fn stylesheet(&self) -> Option<&str> {
        self.bindery
            .as_ref()
            .and_then(|field| field.theme.as_ref())
            .and_then(|theme| theme.style.as_deref())
            .or(self.style.as_deref())
            .or(self.main.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PackageDescriptor {
        serde_json::from_str(json).expect("valid descriptor")
    }

    #[test]
    fn author_accepts_string_or_person() {
        assert_eq!(parse(r#"{"author": "Ann"}"#).author_name(), Some("Ann"));
        assert_eq!(
            parse(r#"{"author": {"name": "Bo", "email": "bo@example.com"}}"#).author_name(),
            Some("Bo")
        );
        assert_eq!(parse("{}").author_name(), None);
    }

    #[test]
    fn stylesheet_prefers_theme_field_then_style_then_main() {
        let full = parse(
            r#"{"bindery": {"theme": {"style": "theme.css"}}, "style": "style.css", "main": "main.css"}"#,
        );
        assert_eq!(full.stylesheet(), Some("theme.css"));

        let style = parse(r#"{"style": "style.css", "main": "main.css"}"#);
        assert_eq!(style.stylesheet(), Some("style.css"));

        let main = parse(r#"{"main": "index.css"}"#);
        assert_eq!(main.stylesheet(), Some("index.css"));

        assert_eq!(parse("{}").stylesheet(), None);
    }

    #[test]
    fn find_nearest_walks_up() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join(PACKAGE_DESCRIPTOR), "{}").expect("write");

        assert_eq!(
            PackageDescriptor::find_nearest(&nested),
            Some(dir.path().join(PACKAGE_DESCRIPTOR))
        );
    }
}
