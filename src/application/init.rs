//! `bindery init`: write a starter configuration file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::config::{DEFAULT_CONFIG_FILE, INIT_TEMPLATE};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("`{0}` already exists; pass --force to overwrite it")]
    Exists(PathBuf),
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn write_config_template(dir: &Path, force: bool) -> Result<PathBuf, InitError> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        return Err(InitError::Exists(path));
    }

    fs::write(&path, INIT_TEMPLATE).map_err(|source| InitError::Write {
        path: path.clone(),
        source,
    })?;
    info!(target = "bindery::init", path = %path.display(), "Wrote configuration template");
    Ok(path)
}
