//! Static content for the local servers: the embedded broker page and files
//! served from a directory on disk.

use std::{
    borrow::Cow,
    path::{Component, Path as FsPath, PathBuf},
    sync::Arc,
};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};
use tracing::debug;

static BROKER_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/broker");

const INDEX_FILE: &str = "index.html";

/// Root directory handed to [`serve_directory`].
#[derive(Debug, Clone)]
pub struct DirectoryRoot(pub Arc<PathBuf>);

/// Serve the embedded broker bootstrap page and its scripts.
pub async fn serve_broker(path: Option<Path<String>>) -> Response {
    let captured = path.map(|Path(value)| value);
    match resolve_embedded(&BROKER_ASSETS, captured) {
        Some(asset) => asset.into_response(),
        None => not_found("infra::assets::serve_broker"),
    }
}

/// Serve files below the state's root directory. Directory requests map to
/// their `index.html`; parent-directory segments are refused.
pub async fn serve_directory(
    State(root): State<DirectoryRoot>,
    path: Option<Path<String>>,
) -> Response {
    let captured = path.map(|Path(value)| value).unwrap_or_default();
    let Some(relative) = sanitize(&captured) else {
        return rejected("infra::assets::serve_directory", StatusCode::BAD_REQUEST);
    };

    let mut candidate = root.0.join(&relative);
    if captured.is_empty() || captured.ends_with('/') || candidate.is_dir() {
        candidate.push(INDEX_FILE);
    }

    match tokio::fs::read(&candidate).await {
        Ok(contents) => Asset {
            mime: mime_guess::from_path(&candidate),
            contents: Cow::Owned(contents),
        }
        .into_response(),
        Err(err) => {
            debug!(
                target = "bindery::assets",
                path = %candidate.display(),
                error = %err,
                "Static file not served"
            );
            not_found("infra::assets::serve_directory")
        }
    }
}

/// Relative path with only normal components, or `None` for traversal attempts.
pub fn sanitize(requested: &str) -> Option<PathBuf> {
    let trimmed = requested.trim_start_matches('/');
    let mut relative = PathBuf::new();
    for component in FsPath::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

fn not_found(source: &'static str) -> Response {
    debug!(target = "bindery::assets", source, "Static asset not found");
    with_common_headers(StatusCode::NOT_FOUND.into_response())
}

fn rejected(source: &'static str, status: StatusCode) -> Response {
    debug!(
        target = "bindery::assets",
        source,
        status = status.as_u16(),
        "Static asset request rejected"
    );
    with_common_headers(status.into_response())
}

struct Asset<'a> {
    contents: Cow<'a, [u8]>,
    mime: MimeGuess,
}

fn resolve_embedded(
    bundle: &'static Dir<'static>,
    path: Option<String>,
) -> Option<Asset<'static>> {
    let mut candidate = path.unwrap_or_default();
    if candidate.starts_with('/') {
        candidate = candidate.trim_start_matches('/').to_string();
    }
    if candidate.is_empty() || candidate.ends_with('/') {
        candidate.push_str(INDEX_FILE);
    }
    if candidate.contains("..") {
        return None;
    }

    let file = bundle.get_file(&candidate)?;
    Some(Asset {
        mime: mime_guess::from_path(&candidate),
        contents: Cow::Borrowed(file.contents()),
    })
}

impl IntoResponse for Asset<'static> {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        match self.contents {
            Cow::Borrowed(slice) => build_response(Bytes::from_static(slice), mime),
            Cow::Owned(bytes) => build_response(Bytes::from(bytes), mime),
        }
    }
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    with_common_headers(response)
}

/// Staged content changes between builds and is fetched cross-origin by the
/// viewer.
fn with_common_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
