//! Theme records and the deduplicated, ordered set of active themes.

use std::path::PathBuf;

use url::Url;

/// Stylesheet file extension recognised for themes.
pub const STYLESHEET_EXTENSION: &str = "css";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeKind {
    LocalPath,
    RemoteUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeLocation {
    /// Stylesheet on disk; copied into the staging root under the theme name.
    Local(PathBuf),
    /// Stylesheet fetched by the viewer at render time; never copied.
    Remote(Url),
}

/// A concrete theme. `name` is the identity key and, for local themes, the
/// staged file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRecord {
    pub name: String,
    pub location: ThemeLocation,
}

impl ThemeRecord {
    pub fn local(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            location: ThemeLocation::Local(path),
        }
    }

    pub fn remote(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            location: ThemeLocation::Remote(url),
        }
    }

    pub fn kind(&self) -> ThemeKind {
        match self.location {
            ThemeLocation::Local(_) => ThemeKind::LocalPath,
            ThemeLocation::Remote(_) => ThemeKind::RemoteUri,
        }
    }

    pub fn location_display(&self) -> String {
        match &self.location {
            ThemeLocation::Local(path) => path.display().to_string(),
            ThemeLocation::Remote(url) => url.to_string(),
        }
    }
}

/// Result of offering a record to a [`ThemeSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeInsert {
    Added,
    /// Same name and location as an existing record.
    Duplicate,
    /// Same name, different location; the existing record is kept.
    Conflict { kept: ThemeRecord },
}

/// Ordered theme sequence keyed by name where the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeSet {
    records: Vec<ThemeRecord>,
}

impl ThemeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ThemeRecord) -> ThemeInsert {
        match self.records.iter().find(|existing| existing.name == record.name) {
            Some(existing) if existing.location == record.location => ThemeInsert::Duplicate,
            Some(existing) => ThemeInsert::Conflict {
                kept: existing.clone(),
            },
            None => {
                self.records.push(record);
                ThemeInsert::Added
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ThemeRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThemeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, url: &str) -> ThemeRecord {
        ThemeRecord::remote(name, Url::parse(url).expect("valid url"))
    }

    #[test]
    fn same_name_and_location_is_stored_once() {
        let mut set = ThemeSet::new();
        let record = ThemeRecord::local("theme.css", PathBuf::from("/themes/theme.css"));
        assert_eq!(set.insert(record.clone()), ThemeInsert::Added);
        assert_eq!(set.insert(record), ThemeInsert::Duplicate);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn conflicting_location_keeps_first_record() {
        let mut set = ThemeSet::new();
        let first = remote("style.css", "https://a.example/style.css");
        let second = remote("style.css", "https://b.example/style.css");

        set.insert(first.clone());
        let outcome = set.insert(second);

        assert_eq!(outcome, ThemeInsert::Conflict { kept: first.clone() });
        assert_eq!(set.get("style.css"), Some(&first));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut set = ThemeSet::new();
        set.insert(remote("b.css", "https://x.example/b.css"));
        set.insert(ThemeRecord::local("a.css", PathBuf::from("/a.css")));
        let names: Vec<_> = set.iter().map(|record| record.name.as_str()).collect();
        assert_eq!(names, ["b.css", "a.css"]);
    }
}
