//! Title and theme discovery inside source documents.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str, text};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::types::DocumentType;

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("front matter is not valid YAML: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    #[error("html scan failed: {message}")]
    Html { message: String },
}

/// Values found inside a document that may supply an entry's title or theme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub title: Option<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    theme: Option<String>,
}

pub fn discover(document_type: DocumentType, source: &str) -> Result<Discovered, DiscoverError> {
    match document_type {
        DocumentType::Markdown => discover_markdown(source),
        DocumentType::Html => discover_html(source),
    }
}

/// Split a leading `---` fenced front matter block from the Markdown body.
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, source)
}

fn discover_markdown(source: &str) -> Result<Discovered, DiscoverError> {
    let (front_matter, body) = split_front_matter(source);
    let front: FrontMatter = match front_matter {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)?,
        _ => FrontMatter::default(),
    };

    let title = non_empty(front.title).or_else(|| first_heading(body));
    Ok(Discovered {
        title,
        theme: non_empty(front.theme),
    })
}

/// Text of the first ATX level-one heading outside fenced code.
fn first_heading(body: &str) -> Option<String> {
    let mut fence: Option<&str> = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("# ") {
            let text = heading.trim().trim_end_matches('#').trim_end();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn discover_html(source: &str) -> Result<Discovered, DiscoverError> {
    let title = Rc::new(RefCell::new(None::<String>));
    let buffer = Rc::new(RefCell::new(String::new()));
    let theme = Rc::new(RefCell::new(None::<String>));

    rewrite_str(
        source,
        RewriteStrSettings {
            element_content_handlers: vec![
                text!("title", {
                    let title = Rc::clone(&title);
                    let buffer = Rc::clone(&buffer);
                    move |chunk| {
                        if title.borrow().is_some() {
                            return Ok(());
                        }
                        buffer.borrow_mut().push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let text = buffer.borrow().trim().to_string();
                            buffer.borrow_mut().clear();
                            if !text.is_empty() {
                                *title.borrow_mut() = Some(text);
                            }
                        }
                        Ok(())
                    }
                }),
                element!(r#"link[rel~="stylesheet"][href]"#, {
                    let theme = Rc::clone(&theme);
                    move |el| {
                        if theme.borrow().is_some() {
                            return Ok(());
                        }
                        if let Some(href) = el.get_attribute("href") {
                            let lower = href.to_ascii_lowercase();
                            if lower.starts_with("http://") || lower.starts_with("https://") {
                                *theme.borrow_mut() = Some(href);
                            }
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| DiscoverError::Html {
        message: err.to_string(),
    })?;

    let title = title.borrow_mut().take();
    let theme = theme.borrow_mut().take();
    Ok(Discovered { title, theme })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
