//! Domain layer types and invariants.

pub mod entry;
pub mod manifest;
pub mod page_size;
pub mod theme;
pub mod types;
