// ============================================
// Affinity Aggregator
// ============================================
//
// Turns weighted interactions into per-dimension affinity weights.
//
// For each key k of a dimension (category / genre / tag):
//   raw(k)    = SUM(scores contributing to k) / sqrt(n_k)
//   weight(k) = exp(raw(k) - max_j raw(j)) / SUM_j exp(raw(j) - max_j raw(j))
//
// An event contributes to every key its content carries in the dimension.
// Keys are visited in lexicographic order so the float sums are reproducible.

use super::interaction_weighter::WeightedInteraction;
use crate::models::{AffinityWeight, Dimension, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Numerically stable softmax with temperature 1 (max-subtraction)
pub fn softmax(raw_scores: &[f64]) -> Vec<f64> {
    if raw_scores.is_empty() {
        return Vec::new();
    }

    let max = raw_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw_scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();

    exps.into_iter().map(|e| e / total).collect()
}

/// A user's affinity weights across all dimensions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AffinityProfile {
    pub user_id: UserId,
    weights: BTreeMap<Dimension, BTreeMap<String, f64>>,
}

impl AffinityProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            weights: BTreeMap::new(),
        }
    }

    /// Weight of `key` in `dimension`, 0 when the user has none
    pub fn weight(&self, dimension: Dimension, key: &str) -> f64 {
        self.weights
            .get(&dimension)
            .and_then(|keys| keys.get(key))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&BTreeMap<String, f64>> {
        self.weights.get(&dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.values().all(|keys| keys.is_empty())
    }

    /// Flatten into `AffinityWeight` records ordered by (dimension, key)
    pub fn records(&self) -> Vec<AffinityWeight> {
        self.weights
            .iter()
            .flat_map(|(dimension, keys)| {
                keys.iter().map(move |(key, weight)| AffinityWeight {
                    user_id: self.user_id,
                    dimension: *dimension,
                    key: key.clone(),
                    weight: *weight,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AffinityAggregator;

impl AffinityAggregator {
    pub fn new() -> Self {
        Self
    }

    /// sqrt(n)-normalized raw score per key of one dimension
    pub fn raw_scores(
        dimension: Dimension,
        weighted: &[WeightedInteraction],
    ) -> BTreeMap<String, f64> {
        let mut grouped: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

        for interaction in weighted {
            for key in interaction.keys.keys(dimension) {
                let entry = grouped.entry(key.as_str()).or_insert((0.0, 0));
                entry.0 += interaction.score;
                entry.1 += 1;
            }
        }

        grouped
            .into_iter()
            .map(|(key, (sum, n))| (key.to_string(), sum / (n as f64).sqrt()))
            .collect()
    }

    /// Affinity weights of one user for one dimension; empty when no event has keys there
    pub fn aggregate(
        &self,
        user_id: UserId,
        dimension: Dimension,
        weighted: &[WeightedInteraction],
    ) -> Vec<AffinityWeight> {
        Self::normalize(Self::raw_scores(dimension, weighted))
            .into_iter()
            .map(|(key, weight)| AffinityWeight {
                user_id,
                dimension,
                key,
                weight,
            })
            .collect()
    }

    /// Affinity weights of one user for all three dimensions
    pub fn build_profile(
        &self,
        user_id: UserId,
        weighted: &[WeightedInteraction],
    ) -> AffinityProfile {
        let mut weights = BTreeMap::new();

        for dimension in Dimension::ALL {
            let normalized = Self::normalize(Self::raw_scores(dimension, weighted));
            debug!(
                user_id = user_id,
                dimension = dimension.as_str(),
                keys = normalized.len(),
                "Normalized dimension affinity"
            );
            if !normalized.is_empty() {
                weights.insert(dimension, normalized);
            }
        }

        AffinityProfile { user_id, weights }
    }

    fn normalize(raw: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let (keys, scores): (Vec<String>, Vec<f64>) = raw.into_iter().unzip();
        keys.into_iter().zip(softmax(&scores)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKeys;

    fn interaction(score: f64, categories: &[&str], tags: &[&str]) -> WeightedInteraction {
        WeightedInteraction {
            event_id: 0,
            content_id: 0,
            recency_index: 0,
            age_days: 0.0,
            score,
            keys: ContentKeys {
                categories: categories.iter().map(|s| s.to_string()).collect(),
                genres: Default::default(),
                tags: tags.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let weights = softmax(&[1.0, 2.0, 3.0, -4.0]);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(weights.iter().all(|w| *w > 0.0 && *w < 1.0));
    }

    #[test]
    fn test_softmax_is_overflow_safe() {
        let weights = softmax(&[1000.0, 1000.0]);
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((weights[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_raw_scores_normalize_by_sqrt_n() {
        let weighted = vec![
            interaction(2.0, &["music"], &[]),
            interaction(2.0, &["music", "sports"], &[]),
        ];

        let raw = AffinityAggregator::raw_scores(Dimension::Category, &weighted);
        assert!((raw["music"] - 4.0 / 2f64.sqrt()).abs() < 1e-12);
        assert!((raw["sports"] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_weights_per_dimension_sum_to_one() {
        let aggregator = AffinityAggregator::new();
        let weighted = vec![
            interaction(2.0, &["music"], &["live"]),
            interaction(4.0, &["sports"], &["live", "outdoor"]),
            interaction(-5.0, &["news"], &[]),
        ];

        for dimension in [Dimension::Category, Dimension::Tag] {
            let weights = aggregator.aggregate(7, dimension, &weighted);
            let total: f64 = weights.iter().map(|w| w.weight).sum();
            assert!((total - 1.0).abs() < 1e-9, "{:?} sums to {}", dimension, total);
            assert!(weights.iter().all(|w| w.user_id == 7 && w.dimension == dimension));
        }
    }

    #[test]
    fn test_single_key_gets_full_weight() {
        let aggregator = AffinityAggregator::new();
        let weights =
            aggregator.aggregate(1, Dimension::Category, &[interaction(-5.0, &["news"], &[])]);
        assert_eq!(weights.len(), 1);
        assert!((weights[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_dimension_yields_no_weights() {
        let aggregator = AffinityAggregator::new();
        let weighted = vec![interaction(2.0, &["music"], &[])];

        assert!(aggregator
            .aggregate(1, Dimension::Genre, &weighted)
            .is_empty());

        let profile = aggregator.build_profile(1, &weighted);
        assert!(profile.dimension(Dimension::Genre).is_none());
        assert_eq!(profile.weight(Dimension::Genre, "anything"), 0.0);
        assert!((profile.weight(Dimension::Category, "music") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_higher_engagement_gets_higher_weight() {
        let aggregator = AffinityAggregator::new();
        let weighted = vec![
            interaction(4.0, &["sports"], &[]),
            interaction(2.0, &["music"], &[]),
            interaction(-5.0, &["news"], &[]),
        ];

        let profile = aggregator.build_profile(1, &weighted);
        let sports = profile.weight(Dimension::Category, "sports");
        let music = profile.weight(Dimension::Category, "music");
        let news = profile.weight(Dimension::Category, "news");
        assert!(sports > music && music > news);
    }

    #[test]
    fn test_profile_records_are_ordered() {
        let aggregator = AffinityAggregator::new();
        let weighted = vec![interaction(2.0, &["b", "a"], &["z"])];

        let records = aggregator.build_profile(3, &weighted).records();
        let keys: Vec<(Dimension, &str)> = records
            .iter()
            .map(|r| (r.dimension, r.key.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Dimension::Category, "a"),
                (Dimension::Category, "b"),
                (Dimension::Tag, "z")
            ]
        );
    }
}
