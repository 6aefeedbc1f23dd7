//! Page-size directive passed to the viewer through the navigation URL.

use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid page size `{input}`: expected a format name or `width,height`")]
pub struct SizeParseError {
    pub input: String,
}

/// Either a named format (`A4`, `letter`, `JIS-B5`) or an explicit pair of
/// CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSize {
    Format(String),
    Dimensions { width: String, height: String },
}

impl PageSize {
    /// Query pairs understood by the broker page.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            PageSize::Format(format) => vec![("size", format.as_str())],
            PageSize::Dimensions { width, height } => {
                vec![("width", width.as_str()), ("height", height.as_str())]
            }
        }
    }
}

impl FromStr for PageSize {
    type Err = SizeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_page_size(input)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::Format(format) => f.write_str(format),
            PageSize::Dimensions { width, height } => write!(f, "{width},{height}"),
        }
    }
}

/// Parse `"A4"` into a format and `"210mm,297mm"` into dimensions. The comma
/// shorthand needs exactly two non-empty components.
pub fn parse_page_size(input: &str) -> Result<PageSize, SizeParseError> {
    let error = || SizeParseError {
        input: input.to_string(),
    };

    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [format] if !format.is_empty() => Ok(PageSize::Format((*format).to_string())),
        [width, height] if !width.is_empty() && !height.is_empty() => {
            Ok(PageSize::Dimensions {
                width: (*width).to_string(),
                height: (*height).to_string(),
            })
        }
        _ => Err(error()),
    }
}
