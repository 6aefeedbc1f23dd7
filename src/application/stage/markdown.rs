use askama::Template;
use comrak::{Arena, format_html, options::Options, parse_document};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("markdown rendering failed: {message}")]
pub struct TransformError {
    pub message: String,
}

/// Converts Markdown into a standalone HTML document.
pub trait MarkdownTransform: Send + Sync {
    fn transform(
        &self,
        source: &str,
        document: &DocumentShell<'_>,
    ) -> Result<String, TransformError>;
}

/// Head values injected around a transformed body.
#[derive(Debug, Clone, Copy)]
pub struct DocumentShell<'a> {
    pub language: &'a str,
    pub title: Option<&'a str>,
    pub stylesheet: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "document.html")]
struct DocumentTemplate<'a> {
    shell: DocumentShell<'a>,
    body: &'a str,
}

impl DocumentShell<'_> {
    /// Full HTML5 document around an already rendered `body`.
    pub fn wrap(&self, body: &str) -> Result<String, askama::Error> {
        DocumentTemplate { shell: *self, body }.render()
    }
}

/// Comrak with GitHub-flavoured extensions; front matter is skipped and raw
/// HTML passes through untouched.
pub struct ComrakTransform {
    options: Options<'static>,
}

impl ComrakTransform {
    pub fn new() -> Self {
        Self {
            options: default_options(),
        }
    }
}

impl Default for ComrakTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownTransform for ComrakTransform {
    fn transform(
        &self,
        source: &str,
        document: &DocumentShell<'_>,
    ) -> Result<String, TransformError> {
        let arena = Arena::new();
        let root = parse_document(&arena, source, &self.options);

        let mut body = String::new();
        format_html(root, &self.options, &mut body).map_err(|err| TransformError {
            message: err.to_string(),
        })?;
        document.wrap(&body).map_err(|err| TransformError {
            message: err.to_string(),
        })
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;
    render.figure_with_caption = true;

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell<'a>(stylesheet: Option<&'a str>) -> DocumentShell<'a> {
        DocumentShell {
            language: "en",
            title: Some("Intro & Setup"),
            stylesheet,
        }
    }

    #[test]
    fn wraps_body_with_head_metadata() {
        let html = ComrakTransform::new()
            .transform("# Hello\n", &shell(Some("../theme.css")))
            .expect("render");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<title>Intro &amp; Setup</title>"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"../theme.css\">"));
        assert!(html.contains("Hello</h1>"));
    }

    #[test]
    fn front_matter_is_not_rendered() {
        let html = ComrakTransform::new().transform(
            "---\ntitle: Hidden\n---\n\nBody text\n",
            &shell(None),
        )
        .expect("render");

        assert!(!html.contains("title: Hidden"));
        assert!(html.contains("<p>Body text</p>"));
        assert!(!html.contains("rel=\"stylesheet\""));
    }

    #[test]
    fn head_values_are_escaped_but_body_is_not() {
        let shell = DocumentShell {
            language: "en",
            title: Some("<b>Bold</b>"),
            stylesheet: None,
        };
        let html = shell.wrap("<p><em>kept</em></p>").expect("render");

        assert!(html.contains("<title>&lt;b&gt;Bold&lt;/b&gt;</title>"));
        assert!(html.contains("<body>\n<p><em>kept</em></p>\n</body>"));
    }

    #[test]
    fn tables_render_with_extensions() {
        let html = ComrakTransform::new()
            .transform("| a | b |\n|---|---|\n| 1 | 2 |\n", &shell(None))
            .expect("render");
        assert!(html.contains("<table>"));
    }
}
