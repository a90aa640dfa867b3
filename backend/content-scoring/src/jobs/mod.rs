// ============================================
// Jobs Module
// ============================================
//
// Scoring runs over a data source snapshot. A run is triggered by the
// embedding service for one user at a fixed `now`; scheduling and fan-out
// across users belong to the caller.

pub mod scoring_run;

pub use scoring_run::{
    BatchOutcome, CancellationFlag, CandidateScorer, ContentScoringPipeline, ProfileOutcome,
    RunStats, ScoringReport, ScoringRequest,
};
