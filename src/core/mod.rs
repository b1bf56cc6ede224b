pub mod filter;
pub mod ontology;
pub mod registry;
pub mod render;
pub mod scorer;
pub mod selector;
