//! Data quality checks.
//!
//! This module flags cells whose text does not follow the canonical syntax
//! of their column type.

mod syntax_errors;

pub use syntax_errors::{count_syntax_errors, find_syntax_errors};
