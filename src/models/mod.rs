//! Request and Response models for the diagnostics API
//!
//! Cache snapshots serialize directly; only envelope types live here.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::InvalidateQuery;
pub use responses::{ErrorResponse, HealthResponse, InvalidateResponse};
