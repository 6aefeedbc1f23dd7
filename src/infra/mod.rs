//! Infrastructure adapters: content servers, browser driver and telemetry.

pub mod assets;
pub mod browser;
pub mod error;
pub mod http;
pub mod telemetry;
