//! Candidates Module
//!
//! Per-user ranked candidate queues, prefetch scheduling, and the request-path
//! orchestration that drives the scoring collaborator.

mod cache;
mod queue;
mod recommender;

pub use cache::CandidateCache;
pub use queue::{CandidateQueue, CandidateRef, InstallPolicy};
pub use recommender::Recommender;
