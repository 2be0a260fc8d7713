//! CDB Common Library
//!
//! Shared building blocks for the CDB concept importer:
//!
//! - **Domain types**: concepts, facets and mapping records exchanged
//!   between creators, the import pipeline and the graph layer
//! - **Error types**: the shared error taxonomy root
//! - **Logging**: centralized tracing initialization for all components

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CdbError, Result};
pub use types::{Concept, ConceptCoordinates, Facet, FacetKind, ImportMapping, MappingRecord};
