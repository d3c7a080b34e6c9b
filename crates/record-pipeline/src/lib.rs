//! Reshapes provider tables into JSON-safe records.

pub mod merger;
pub mod normalizer;

pub use merger::{merge_statements, PERIOD_COLUMN};
pub use normalizer::{cell_to_json, to_records};
