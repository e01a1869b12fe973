//! API Module
//!
//! HTTP handlers and routing for the diagnostics surface.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Component occupancy snapshot
//! - `GET /stats/users/:user_id` - Per-user view
//! - `DELETE /cache/candidates?pattern=` - Pattern invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
