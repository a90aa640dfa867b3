// ============================================
// Score Combiner & Ranker
// ============================================
//
// final_score = weighted_score * exp(-ln2 * age_days / 30) * (1 + 0.5 * velocity_boost)
//
// Ranking sorts by final_score descending; equal scores are ordered by
// content_id ascending so the output is fully deterministic.

use crate::models::{ContentItem, ContentScore};
use crate::utils::{days_between, half_life_decay};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Half-life of the content freshness decay, in days
pub const FRESHNESS_HALF_LIFE_DAYS: f64 = 30.0;
/// Strength of the velocity multiplier
pub const VELOCITY_STRENGTH: f64 = 0.5;

pub fn freshness_decay(age_days: f64) -> f64 {
    half_life_decay(age_days, FRESHNESS_HALF_LIFE_DAYS)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCombiner;

impl ScoreCombiner {
    pub fn new() -> Self {
        Self
    }

    pub fn final_score(weighted_score: f64, age_days: f64, velocity_boost: f64) -> f64 {
        weighted_score * freshness_decay(age_days) * (1.0 + VELOCITY_STRENGTH * velocity_boost)
    }

    /// Content age at `now`; items created after `now` count as brand new
    pub fn age_days(item: &ContentItem, now: DateTime<Utc>) -> f64 {
        let age = days_between(item.created_at, now);
        if age < 0.0 {
            warn!(
                content_id = item.content_id,
                created_at = %item.created_at,
                "Content created after the reference time, treating as age 0"
            );
            return 0.0;
        }
        age
    }

    /// Assemble the output record of one item
    pub fn combine(
        &self,
        item: &ContentItem,
        mean_score: f64,
        weighted_score: f64,
        velocity_boost: f64,
        now: DateTime<Utc>,
    ) -> ContentScore {
        let age_days = Self::age_days(item, now);

        ContentScore {
            content_id: item.content_id,
            title: item.title.clone(),
            mean_score,
            weighted_score,
            age_days,
            velocity_boost,
            final_score: Self::final_score(weighted_score, age_days, velocity_boost),
        }
    }
}

/// Ordering used by the ranker: final_score descending, then content_id ascending
pub fn rank_order(a: &ContentScore, b: &ContentScore) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.content_id.cmp(&b.content_id))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker;

impl Ranker {
    pub fn new() -> Self {
        Self
    }

    /// Sort scored items and optionally keep only the first `top_k`
    pub fn rank(&self, mut scores: Vec<ContentScore>, top_k: Option<usize>) -> Vec<ContentScore> {
        scores.sort_by(rank_order);

        if let Some(k) = top_k {
            scores.truncate(k);
        }

        debug!(
            ranked = scores.len(),
            top_score = scores.first().map(|s| s.final_score),
            "Ranking complete"
        );

        scores
    }
}
