//! Lexical path helpers used when laying out the staging tree.
//!
//! Nothing here touches the filesystem: inputs are expected to be absolute and
//! already normalised by the caller.

use std::path::{Component, Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Bytes that cannot appear raw in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Collapse `.` and `..` components without consulting the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Join `path` onto `base` unless it is already absolute, then normalise.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Compute the relative path leading from directory `from` to `to`.
pub fn relative_to(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let mut relative = PathBuf::new();
    for _ in shared..from.len() {
        relative.push("..");
    }
    for component in &to[shared..] {
        relative.push(component);
    }
    relative
}

/// Render a relative path as a URL reference: forward slashes, each segment
/// percent-encoded.
pub fn to_href(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => {
                Some(utf8_percent_encode(&part.to_string_lossy(), PATH_SEGMENT).to_string())
            }
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `path` lies strictly below `root`.
pub fn is_strictly_within(root: &Path, path: &Path) -> bool {
    path != root && path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_parent_segments() {
        assert_eq!(
            normalize(Path::new("/book/src/../chapters/./one.md")),
            PathBuf::from("/book/chapters/one.md")
        );
    }

    #[test]
    fn relative_to_walks_up_and_down() {
        let from = Path::new("/out/artifacts/part");
        let to = Path::new("/out/theme.css");
        assert_eq!(relative_to(from, to), PathBuf::from("../../theme.css"));
    }

    #[test]
    fn relative_to_sibling_file() {
        let from = Path::new("/out");
        let to = Path::new("/out/artifacts/one.html");
        assert_eq!(to_href(&relative_to(from, to)), "artifacts/one.html");
    }

    #[test]
    fn href_segments_are_percent_encoded() {
        assert_eq!(
            to_href(Path::new("../part one/c#1?.html")),
            "../part%20one/c%231%3F.html"
        );
        assert_eq!(to_href(Path::new("100%/é.html")), "100%25/%C3%A9.html");
    }

    #[test]
    fn strict_containment_excludes_root_itself() {
        let root = Path::new("/out/artifacts");
        assert!(is_strictly_within(root, Path::new("/out/artifacts/a.html")));
        assert!(!is_strictly_within(root, root));
        assert!(!is_strictly_within(root, Path::new("/out/a.html")));
    }
}
