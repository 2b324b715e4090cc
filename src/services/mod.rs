//! Procore API service implementations.

mod companies;
mod custom_fields;
mod documents;
mod projects;
mod users;

pub use companies::*;
pub use custom_fields::*;
pub use documents::*;
pub use projects::*;
pub use users::*;

use crate::error::{ProcoreError, ProcoreResult};

fn require_id(parameter: &str, id: i64) -> ProcoreResult<()> {
    if id <= 0 {
        return Err(ProcoreError::invalid_argument(
            parameter,
            format!("{} must be a positive number", parameter),
        ));
    }
    Ok(())
}

fn require_text(parameter: &str, value: &str) -> ProcoreResult<()> {
    if value.trim().is_empty() {
        return Err(ProcoreError::invalid_argument(
            parameter,
            format!("{} cannot be empty", parameter),
        ));
    }
    Ok(())
}
