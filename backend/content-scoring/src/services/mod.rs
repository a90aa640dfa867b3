pub mod affinity_cache;
pub mod data_source;
pub mod personalization;
pub mod profile_builder;
pub mod quality;
pub mod ranking;
pub mod velocity;

pub use affinity_cache::AffinityCache;
pub use data_source::{InMemorySnapshot, ScoringDataSource, SnapshotData};
pub use personalization::PersonalizationCombiner;
pub use profile_builder::{AffinityAggregator, AffinityProfile, InteractionWeighter};
pub use ranking::{Ranker, ScoreCombiner};
pub use velocity::{EngagementWindows, VelocityDetector};
