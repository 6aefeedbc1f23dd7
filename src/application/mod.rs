//! Build pipeline services: entry and theme resolution, staging, rendering
//! and PDF post-processing.

pub mod build;
pub mod discover;
pub mod entries;
pub mod error;
pub mod init;
pub mod pdf;
pub mod render;
pub mod stage;
pub mod theme;
