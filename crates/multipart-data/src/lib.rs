//! Data-driven part kinds and engine settings.
//!
//! A content directory holds `parts.{ron,toml,json}` (required) and
//! optionally `settings.{ron,toml,json}`. [`load_part_data`] reads both and
//! resolves them into a [`PartData`] ready to build an engine from.

pub mod descriptor;
pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, PartData, load_part_data};
