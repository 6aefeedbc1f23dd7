//! Synthesised table-of-contents document.

use askama::Template;

use super::markdown::DocumentShell;

/// One list item: a staged entry relative to the TOC document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocLink {
    pub href: String,
    pub label: String,
}

#[derive(Template)]
#[template(path = "toc.html")]
struct TocTemplate<'a> {
    shell: DocumentShell<'a>,
    heading: &'a str,
    links: &'a [TocLink],
}

pub fn render_toc(
    shell: &DocumentShell<'_>,
    heading: &str,
    links: &[TocLink],
) -> Result<String, askama::Error> {
    TocTemplate {
        shell: *shell,
        heading,
        links,
    }
    .render()
}
