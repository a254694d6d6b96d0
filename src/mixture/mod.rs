//! Mixture node module
//!
//! The differentiable mixture-of-operations node and the index mapping
//! between the full catalog and the diversity-eligible subset.

mod index_map;
mod node;

pub use index_map::IndexMapping;
pub use node::MixtureNode;
