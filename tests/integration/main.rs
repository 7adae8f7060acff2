//! Integration tests for the pagediff reconciliation engine

mod end_to_end;
mod isolation;
mod path_determinism;
mod snapshot_files;
mod support;
