//! Record Tree
//!
//! Reconstructs the parent/child tree of a store and assigns every record a
//! path built from names alone, so records can be matched across stores whose
//! ids have nothing in common.

pub mod children;
pub mod path;

pub use children::ChildrenIndex;
pub use path::{join_path, PathBuilder, PathIndex};
