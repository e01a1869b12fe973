//! Candidate Queue
//!
//! Per-user ranked candidate list with a consumption cursor.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// == Candidate Ref ==
/// A ranked match candidate produced by the scoring collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRef {
    /// Identity of the recommended user
    pub id: String,
    /// Ranking score, higher is better
    pub score: f64,
}

impl CandidateRef {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

// == Install Policy ==
/// How an installed batch relates to the existing queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPolicy {
    /// Replace the queue and reset the cursor
    Cold,
    /// Append after the existing candidates, keeping the cursor
    Replenish,
}

// == Candidate Queue ==
/// Ordered candidates for one user and how far they have been served.
///
/// Invariant: `cursor <= candidates.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateQueue {
    pub user_id: String,
    pub candidates: Vec<CandidateRef>,
    pub cursor: usize,
    /// Size of the most recently installed batch, drives the low-water mark
    pub last_batch_size: usize,
}

impl CandidateQueue {
    // == Constructor ==
    /// A freshly populated queue with nothing served yet.
    pub fn cold(user_id: impl Into<String>, candidates: Vec<CandidateRef>) -> Self {
        let last_batch_size = candidates.len();
        Self {
            user_id: user_id.into(),
            candidates,
            cursor: 0,
            last_batch_size,
        }
    }

    pub fn remaining(&self) -> usize {
        self.candidates.len() - self.cursor
    }

    // == Consume ==
    /// Advances the cursor by at most `count` and returns the served slice.
    pub fn consume(&mut self, count: usize) -> Vec<CandidateRef> {
        let take = count.min(self.remaining());
        let start = self.cursor;
        self.cursor += take;
        debug_assert!(self.cursor <= self.candidates.len());
        self.candidates[start..self.cursor].to_vec()
    }

    // == Replenish ==
    /// Appends candidates not already queued. Returns how many were added.
    pub fn replenish(&mut self, candidates: Vec<CandidateRef>) -> usize {
        let mut seen: HashSet<String> = self.candidates.iter().map(|c| c.id.clone()).collect();
        let before = self.candidates.len();
        self.last_batch_size = candidates.len();
        for candidate in candidates {
            if seen.insert(candidate.id.clone()) {
                self.candidates.push(candidate);
            }
        }
        self.candidates.len() - before
    }

    // == Low Water ==
    /// Low-water test: `remaining <= max(floor, last_batch_size * percent / 100)`.
    pub fn is_below_low_water(&self, percent: usize, floor: usize) -> bool {
        let mark = (self.last_batch_size * percent / 100).max(floor);
        self.remaining() <= mark
    }
}
