/// Ranking Module
///
/// Final stage of the scoring pipeline.
///
/// # Workflow
/// 1. Multiply the personalized score by a 30-day half-life freshness decay
/// 2. Apply the velocity multiplier `(1 + 0.5 * velocity_boost)`
/// 3. Sort by final score (descending), content id (ascending) on ties
/// 4. Optionally truncate to the caller's top-K
pub mod combiner;

pub use combiner::{
    freshness_decay, rank_order, Ranker, ScoreCombiner, FRESHNESS_HALF_LIFE_DAYS,
    VELOCITY_STRENGTH,
};
