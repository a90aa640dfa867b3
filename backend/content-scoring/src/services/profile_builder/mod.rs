// ============================================
// User Affinity Profile Builder
// ============================================
//
// Builds a user's affinity profile from their interaction history:
// 1. InteractionWeighter: per-event decayed scores (recency + time)
// 2. AffinityAggregator: per-dimension sqrt(n) normalization + softmax
//
// ┌──────────────────────┐     ┌──────────────────────┐
// │ InteractionWeighter  │ ──▶ │ AffinityAggregator   │ ──▶ AffinityProfile
// │ (events → scores)    │     │ (scores → weights)   │
// └──────────────────────┘     └──────────────────────┘
//
// Profiles are ephemeral: recomputed from the snapshot on every run.

pub mod affinity_aggregator;
pub mod interaction_weighter;

pub use affinity_aggregator::{softmax, AffinityAggregator, AffinityProfile};
pub use interaction_weighter::{
    InteractionWeighter, WeighingOutcome, WeightedInteraction, RECENCY_HALF_LIFE,
    TIME_HALF_LIFE_DAYS,
};
