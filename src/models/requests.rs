//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming query parameters.

use serde::Deserialize;

/// Query for DELETE /cache/candidates
///
/// # Fields
/// - `pattern`: regular expression matched against user ids
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    pub pattern: String,
}
