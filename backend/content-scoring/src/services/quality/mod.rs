// ============================================
// Content Quality Estimator
// ============================================
//
// mean_score = 0.4 * (likes + comments) / (likes + dislikes + comments)
//
// Content with no engagement at all scores 0.

use crate::models::ContentItem;

/// Scale applied to the positive engagement ratio
pub const MEAN_SCORE_WEIGHT: f64 = 0.4;

/// Quality score from raw engagement counters, in [0, 0.4]
pub fn mean_score(like_count: u64, comment_count: u64, dislike_count: u64) -> f64 {
    let positive = like_count as f64 + comment_count as f64;
    let total = positive + dislike_count as f64;

    if total == 0.0 {
        return 0.0;
    }

    MEAN_SCORE_WEIGHT * (positive / total)
}

pub fn item_mean_score(item: &ContentItem) -> f64 {
    mean_score(item.like_count, item.comment_count, item.dislike_count)
}
