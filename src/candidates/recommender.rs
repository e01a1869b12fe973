//! Recommender
//!
//! Request-path glue between the candidate cache and the scoring collaborator:
//! cold population on a drained queue, consumption, and background refill once
//! the queue crosses its low-water mark.

use std::sync::Arc;

use tracing::{info, warn};

use crate::candidates::{CandidateCache, CandidateRef, InstallPolicy};
use crate::collaborators::Scorer;
use crate::error::Result;

// == Recommender ==
#[derive(Debug, Clone)]
pub struct Recommender {
    cache: Arc<CandidateCache>,
}

impl Recommender {
    pub fn new(cache: Arc<CandidateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CandidateCache> {
        &self.cache
    }

    // == Next Candidates ==
    /// Serves the next `count` candidates for `user_id`.
    ///
    /// A missing or fully drained queue is populated synchronously; a scoring
    /// failure on that path is returned. Once served, a refill is spawned if the
    /// queue is at its low-water mark and none is outstanding.
    pub async fn next_candidates(
        &self,
        user_id: &str,
        count: usize,
        scorer: Arc<dyn Scorer>,
    ) -> Result<Vec<CandidateRef>> {
        if self.cache.remaining_count(user_id).await == 0 {
            info!(user_id, "cold population");
            let candidates = scorer.compute_candidates(user_id).await?;
            self.cache
                .install(user_id, candidates, InstallPolicy::Cold)
                .await?;
        }

        let served = self.cache.consume(user_id, count).await;

        if self.cache.should_prefetch(user_id).await {
            self.spawn_prefetch(user_id.to_string(), scorer);
        }

        Ok(served)
    }

    // == Prefetch ==
    /// Runs a refill whose in-flight marker the caller already holds.
    ///
    /// On failure the marker is released and the existing queue is untouched.
    /// If the marker was lost meanwhile (the queue was invalidated or rebuilt)
    /// the batch is discarded and 0 is returned.
    pub async fn prefetch(&self, user_id: &str, scorer: &dyn Scorer) -> Result<usize> {
        match scorer.compute_candidates(user_id).await {
            Ok(candidates) => {
                let remaining = self
                    .cache
                    .install(user_id, candidates, InstallPolicy::Replenish)
                    .await?;
                info!(user_id, remaining, "prefetch installed");
                Ok(remaining)
            }
            Err(e) => {
                warn!(user_id, error = %e, "prefetch failed");
                self.cache.abort_prefetch(user_id).await;
                Err(e.into())
            }
        }
    }

    fn spawn_prefetch(&self, user_id: String, scorer: Arc<dyn Scorer>) {
        let this = self.clone();
        tokio::spawn(async move {
            // Failure is already logged and the marker released
            let _ = this.prefetch(&user_id, scorer.as_ref()).await;
        });
    }
}
