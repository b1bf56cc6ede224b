//! Action Block Engine — selection and chaining of reusable generation
//! directives.
//!
//! Picks "action blocks" (templated prompt units with structured metadata)
//! that fit a runtime narrative context, using a versioned concept
//! ontology, hard filters, weighted scorers, and a greedy chain builder.

pub mod core;
pub mod schema;

pub use crate::core::ontology::{OntologyError, OntologyRegistry};
pub use crate::core::registry::{BlockRegistry, RegistryError};
pub use crate::core::selector::{BlockSelector, SelectorBuilder};
pub use crate::schema::block::{ActionBlock, BlockError, BlockKind};
pub use crate::schema::concept::{ConceptId, Namespace};
pub use crate::schema::context::SelectionContext;
pub use crate::schema::result::SelectionResult;
