//! CLI command implementations

pub mod import;
pub mod version;
