//! Theme resolution: URLs, stylesheet paths and theme packages become
//! [`ThemeRecord`]s.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    config::package::{PACKAGE_DESCRIPTOR, PackageDescriptor, PackageError},
    domain::theme::{STYLESHEET_EXTENSION, ThemeRecord},
    util::paths,
};

const PACKAGES_DIR: &str = "node_modules";

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme `{reference}` could not be found at `{path}`")]
    NotFound { reference: String, path: PathBuf },
    #[error("theme package `{reference}` does not declare a stylesheet")]
    MissingStylesheet { reference: String },
    #[error("theme `{reference}` points at `{stylesheet}`, which is not a stylesheet")]
    NotStylesheet {
        reference: String,
        stylesheet: String,
    },
    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Resolves theme references relative to a context directory, where theme
/// packages are looked up under `node_modules`.
#[derive(Debug, Clone)]
pub struct ThemeResolver {
    context_dir: PathBuf,
}

impl ThemeResolver {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            context_dir: context_dir.into(),
        }
    }

    /// Resolve an optional reference. Path-like references resolve against
    /// `base_dir`; package names against the context directory.
    pub fn resolve(
        &self,
        reference: Option<&str>,
        base_dir: &Path,
    ) -> Result<Option<ThemeRecord>, ThemeError> {
        let Some(reference) = reference.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(None);
        };

        if let Some(url) = parse_remote(reference) {
            let name = remote_name(&url);
            debug!(
                target = "bindery::theme",
                reference,
                name = %name,
                "Resolved remote theme"
            );
            return Ok(Some(ThemeRecord::remote(name, url)));
        }

        let root = self.install_root(reference, base_dir);
        if has_stylesheet_extension(&root) {
            if !root.is_file() {
                return Err(ThemeError::NotFound {
                    reference: reference.to_string(),
                    path: root,
                });
            }
            let name = root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| reference.to_string());
            return Ok(Some(ThemeRecord::local(name, root)));
        }

        let descriptor_path = root.join(PACKAGE_DESCRIPTOR);
        if !descriptor_path.is_file() {
            return Err(ThemeError::NotFound {
                reference: reference.to_string(),
                path: root,
            });
        }
        let descriptor = PackageDescriptor::read(&descriptor_path)?;
        let stylesheet = descriptor
            .stylesheet()
            .ok_or_else(|| ThemeError::MissingStylesheet {
                reference: reference.to_string(),
            })?;
        if !has_stylesheet_extension(Path::new(stylesheet)) {
            return Err(ThemeError::NotStylesheet {
                reference: reference.to_string(),
                stylesheet: stylesheet.to_string(),
            });
        }

        let package_name = descriptor.name.as_deref().unwrap_or(reference);
        let name = package_theme_name(package_name);
        let location = paths::normalize(&root.join(stylesheet));
        debug!(
            target = "bindery::theme",
            reference,
            name = %name,
            location = %location.display(),
            "Resolved theme package"
        );
        Ok(Some(ThemeRecord::local(name, location)))
    }

    fn install_root(&self, reference: &str, base_dir: &Path) -> PathBuf {
        let candidate = Path::new(reference);
        if is_path_like(reference) {
            paths::absolutize(base_dir, candidate)
        } else {
            paths::normalize(&self.context_dir.join(PACKAGES_DIR).join(candidate))
        }
    }
}

fn parse_remote(reference: &str) -> Option<Url> {
    let lower = reference.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }
    Url::parse(reference).ok()
}

/// Final non-empty path segment, or the host for bare origins.
fn remote_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn is_path_like(reference: &str) -> bool {
    reference.starts_with('.')
        || reference.starts_with('/')
        || reference.starts_with('\\')
        || Path::new(reference).is_absolute()
        || has_stylesheet_extension(Path::new(reference))
}

pub(crate) fn has_stylesheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(STYLESHEET_EXTENSION))
}

/// Staged file name of a package theme: `@scope/pkg` becomes `@scope-pkg.css`.
pub fn package_theme_name(package_name: &str) -> String {
    let flattened = package_name.replace(['/', '\\'], "-");
    format!("{flattened}.{STYLESHEET_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::domain::theme::{ThemeKind, ThemeLocation};

    fn setup() -> (TempDir, ThemeResolver) {
        let dir = TempDir::new().expect("temp dir");
        let resolver = ThemeResolver::new(dir.path());
        (dir, resolver)
    }

    fn write_package(root: &Path, descriptor: &str, files: &[&str]) {
        fs::create_dir_all(root).expect("mkdir");
        fs::write(root.join(PACKAGE_DESCRIPTOR), descriptor).expect("write descriptor");
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, "body {}").expect("write stylesheet");
        }
    }

    #[test]
    fn missing_reference_yields_no_theme() {
        let (dir, resolver) = setup();
        assert_eq!(resolver.resolve(None, dir.path()).expect("ok"), None);
        assert_eq!(resolver.resolve(Some("  "), dir.path()).expect("ok"), None);
    }

    #[test]
    fn remote_url_is_named_by_last_segment_without_fetching() {
        let (dir, resolver) = setup();
        let record = resolver
            .resolve(Some("https://cdn.example.com/themes/slide.css"), dir.path())
            .expect("ok")
            .expect("theme");

        assert_eq!(record.kind(), ThemeKind::RemoteUri);
        assert_eq!(record.name, "slide.css");
        assert_eq!(
            record.location,
            ThemeLocation::Remote(
                Url::parse("https://cdn.example.com/themes/slide.css").expect("url")
            )
        );
    }

    #[test]
    fn local_stylesheet_is_named_by_basename() {
        let (dir, resolver) = setup();
        fs::create_dir_all(dir.path().join("styles")).expect("mkdir");
        fs::write(dir.path().join("styles/book.css"), "body {}").expect("write");

        let record = resolver
            .resolve(Some("./styles/book.css"), dir.path())
            .expect("ok")
            .expect("theme");

        assert_eq!(record.kind(), ThemeKind::LocalPath);
        assert_eq!(record.name, "book.css");
        assert_eq!(
            record.location,
            ThemeLocation::Local(dir.path().join("styles/book.css"))
        );
    }

    #[test]
    fn missing_local_stylesheet_is_an_error() {
        let (dir, resolver) = setup();
        let err = resolver
            .resolve(Some("nope.css"), dir.path())
            .expect_err("missing");
        assert!(matches!(err, ThemeError::NotFound { .. }));
    }

    #[test]
    fn package_theme_uses_theme_field_first() {
        let (dir, resolver) = setup();
        let root = dir.path().join("node_modules/@press/theme-novel");
        write_package(
            &root,
            r#"{"name": "@press/theme-novel", "bindery": {"theme": {"style": "dist/theme.css"}}, "main": "index.js"}"#,
            &["dist/theme.css"],
        );

        let record = resolver
            .resolve(Some("@press/theme-novel"), dir.path())
            .expect("ok")
            .expect("theme");

        assert_eq!(record.name, "@press-theme-novel.css");
        assert_eq!(
            record.location,
            ThemeLocation::Local(root.join("dist/theme.css"))
        );
    }

    #[test]
    fn package_main_must_be_a_stylesheet() {
        let (dir, resolver) = setup();
        write_package(
            &dir.path().join("node_modules/plain"),
            r#"{"name": "plain", "main": "index.js"}"#,
            &[],
        );

        let err = resolver
            .resolve(Some("plain"), dir.path())
            .expect_err("not a stylesheet");
        assert!(matches!(err, ThemeError::NotStylesheet { .. }));
    }

    #[test]
    fn package_without_stylesheet_fields_is_an_error() {
        let (dir, resolver) = setup();
        write_package(&dir.path().join("node_modules/bare"), r#"{"name": "bare"}"#, &[]);

        let err = resolver
            .resolve(Some("bare"), dir.path())
            .expect_err("no stylesheet");
        assert!(matches!(err, ThemeError::MissingStylesheet { .. }));
    }

    #[test]
    fn same_package_resolves_to_same_record() {
        let (dir, resolver) = setup();
        write_package(
            &dir.path().join("node_modules/solo"),
            r#"{"name": "solo", "style": "solo.css"}"#,
            &["solo.css"],
        );

        let first = resolver.resolve(Some("solo"), dir.path()).expect("ok");
        let second = resolver
            .resolve(Some("solo"), &dir.path().join("chapters"))
            .expect("ok");
        assert_eq!(first, second);
    }

    #[test]
    fn package_theme_name_flattens_separators() {
        assert_eq!(package_theme_name("@scope/name"), "@scope-name.css");
        assert_eq!(package_theme_name("plain"), "plain.css");
    }
}
