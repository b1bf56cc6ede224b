pub mod block;
pub mod concept;
pub mod context;
pub mod result;
