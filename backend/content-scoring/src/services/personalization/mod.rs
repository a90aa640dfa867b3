// ============================================
// Personalization Combiner
// ============================================
//
// Blends content quality with the user's affinity for the item's keys:
//
//   w_k            = SUM(weight(user, k, key) for key in item.keys(k))
//   weighted_score = min((mean_score + 1) * (1 + SUM_k f_k * (1 - exp(-w_k))), 6.0)
//
// Dimension factors: category = 0.5, genre = 1.0, tag = 0.8.
// The saturating term gives diminishing returns as w_k grows.

use crate::models::{ContentItem, Dimension};
use crate::services::profile_builder::AffinityProfile;
use crate::utils::saturate;

pub const MAX_WEIGHTED_SCORE: f64 = 6.0;

/// Contribution factor of each dimension
pub fn dimension_factor(dimension: Dimension) -> f64 {
    match dimension {
        Dimension::Category => 0.5,
        Dimension::Genre => 1.0,
        Dimension::Tag => 0.8,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalizationCombiner;

impl PersonalizationCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Summed affinity of the user over the item's keys in one dimension
    pub fn dimension_affinity(
        item: &ContentItem,
        profile: &AffinityProfile,
        dimension: Dimension,
    ) -> f64 {
        item.keys(dimension)
            .iter()
            .map(|key| profile.weight(dimension, key))
            .sum()
    }

    /// Personalized, capped score of one item for one user
    pub fn weighted_score(
        &self,
        mean_score: f64,
        item: &ContentItem,
        profile: &AffinityProfile,
    ) -> f64 {
        let boost: f64 = Dimension::ALL
            .iter()
            .map(|dimension| {
                let affinity = Self::dimension_affinity(item, profile, *dimension);
                dimension_factor(*dimension) * saturate(affinity)
            })
            .sum();

        ((mean_score + 1.0) * (1.0 + boost)).min(MAX_WEIGHTED_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKeys;
    use crate::services::profile_builder::{AffinityAggregator, WeightedInteraction};
    use chrono::{TimeZone, Utc};

    fn item(categories: &[&str], genres: &[&str], tags: &[&str]) -> ContentItem {
        ContentItem {
            content_id: 1,
            title: "item".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            like_count: 0,
            comment_count: 0,
            dislike_count: 0,
            categories: categories.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn profile_for(keys: ContentKeys) -> AffinityProfile {
        let weighted = vec![WeightedInteraction {
            event_id: 1,
            content_id: 1,
            recency_index: 0,
            age_days: 0.0,
            score: 2.0,
            keys,
        }];
        AffinityAggregator::new().build_profile(1, &weighted)
    }

    #[test]
    fn test_no_affinity_keeps_base_score() {
        let combiner = PersonalizationCombiner::new();
        let profile = AffinityProfile::empty(1);

        let score = combiner.weighted_score(0.4, &item(&["music"], &[], &[]), &profile);
        assert!((score - 1.4).abs() < 1e-12);

        let score = combiner.weighted_score(0.0, &item(&[], &[], &[]), &profile);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_affinity_in_every_dimension() {
        let combiner = PersonalizationCombiner::new();
        let content = item(&["music"], &["jazz"], &["live"]);
        let profile = profile_for(content.content_keys());

        // Each dimension has a single key with weight 1.0
        let expected = 1.4 * (1.0 + (0.5 + 1.0 + 0.8) * (1.0 - (-1.0f64).exp()));
        let score = combiner.weighted_score(0.4, &content, &profile);
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_unmatched_keys_contribute_nothing() {
        let combiner = PersonalizationCombiner::new();
        let profile = profile_for(item(&["sports"], &[], &[]).content_keys());

        let score = combiner.weighted_score(0.2, &item(&["music"], &[], &[]), &profile);
        assert!((score - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_score_is_capped() {
        let combiner = PersonalizationCombiner::new();
        let content = item(&["music"], &["jazz"], &["live"]);
        let profile = profile_for(content.content_keys());

        // An out-of-range mean score still cannot exceed the cap
        let score = combiner.weighted_score(10.0, &content, &profile);
        assert_eq!(score, MAX_WEIGHTED_SCORE);
    }

    #[test]
    fn test_weighted_score_bounds_for_valid_quality() {
        let combiner = PersonalizationCombiner::new();
        let content = item(&["a", "b"], &["c"], &["d", "e", "f"]);
        let profile = profile_for(content.content_keys());

        for mean in [0.0, 0.1, 0.25, 0.4] {
            let score = combiner.weighted_score(mean, &content, &profile);
            assert!((0.0..=MAX_WEIGHTED_SCORE).contains(&score));
        }
    }
}
