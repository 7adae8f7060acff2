//! Pagediff: Identifier-Independent Store Reconciliation
//!
//! Compares two hierarchical record stores whose records were created
//! independently. Records are paired by their path in the tree, attribute
//! values are resolved into self-contained documents, and paired documents are
//! diffed structurally.

pub mod config;
pub mod diff;
pub mod error;
pub mod exceptions;
pub mod keyed_index;
pub mod logging;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
