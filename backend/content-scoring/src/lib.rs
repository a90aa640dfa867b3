//! Personalized content scoring.
//!
//! Builds a per-user affinity profile from interaction history, then ranks
//! content by combining engagement quality, personal affinity, freshness
//! and velocity into one deterministic score per item.

pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use config::ScoringConfig;
pub use error::{Result, ScoringError};
pub use jobs::{CancellationFlag, ContentScoringPipeline, RunStats, ScoringReport, ScoringRequest};
pub use models::{
    AffinityWeight, ContentId, ContentItem, ContentScore, Dimension, InteractionAction,
    InteractionEvent, ItemFailure, ItemFailureReason, UserId,
};
pub use services::{AffinityCache, AffinityProfile, InMemorySnapshot, ScoringDataSource};
