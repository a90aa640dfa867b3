// ============================================
// Velocity Detector (trend signal)
// ============================================
//
// Compares short-window and long-window engagement of a content item:
//
//   velocity_boost = tanh((s_recent - s_baseline / 4) / (|s_baseline| + 1))
//
// Where:
//   - s_recent: engagement in the last 7 days, summed across all users
//   - s_baseline: engagement in the last 30 days, summed across all users
//
// Windows overlap (the 7-day window is part of the 30-day window). Each event
// is scored like a profile interaction: its recency index is assigned per user
// over that user's 30-day events on all content, so callers must pass the
// unfiltered window and restrict to their candidates afterwards. Aggregates
// are floored at 0.

use crate::models::{ContentId, InteractionEvent, UserId};
use crate::services::profile_builder::InteractionWeighter;
use crate::utils::days_between;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const BASELINE_WINDOW_DAYS: i64 = 30;

/// Bounded trend signal in [-1, 1]; 0 when both windows are empty
pub fn velocity_boost(s_recent: f64, s_baseline: f64) -> f64 {
    ((s_recent - s_baseline / 4.0) / (s_baseline.abs() + 1.0)).tanh()
}

/// Content-level engagement totals for the two windows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngagementWindows {
    pub recent: f64,
    pub baseline: f64,
}

impl EngagementWindows {
    pub fn velocity_boost(&self) -> f64 {
        velocity_boost(self.recent, self.baseline)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityDetector;

impl VelocityDetector {
    pub fn new() -> Self {
        Self
    }

    /// Start of the baseline window; events before this do not count
    pub fn baseline_since(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(BASELINE_WINDOW_DAYS)
    }

    /// Aggregate all users' engagement per content item over both windows
    pub fn window_totals(
        &self,
        events: Vec<InteractionEvent>,
        now: DateTime<Utc>,
    ) -> BTreeMap<ContentId, EngagementWindows> {
        let (accepted, _rejected) = InteractionWeighter::reject_future(events, now);
        let since = Self::baseline_since(now);

        let mut by_user: BTreeMap<UserId, Vec<InteractionEvent>> = BTreeMap::new();
        for event in accepted.into_iter().filter(|e| e.occurred_at >= since) {
            by_user.entry(event.user_id).or_default().push(event);
        }

        let mut totals: BTreeMap<ContentId, EngagementWindows> = BTreeMap::new();

        for (_user_id, events) in by_user {
            for (event, recency_index) in InteractionWeighter::order_by_recency(events) {
                let age_days = days_between(event.occurred_at, now);
                let score = InteractionWeighter::event_score(event.action, recency_index, age_days);

                let windows = totals.entry(event.content_id).or_default();
                windows.baseline += score;
                if age_days <= RECENT_WINDOW_DAYS as f64 {
                    windows.recent += score;
                }
            }
        }

        for windows in totals.values_mut() {
            windows.recent = windows.recent.max(0.0);
            windows.baseline = windows.baseline.max(0.0);
        }

        debug!(content_count = totals.len(), "Computed engagement windows");

        totals
    }
}
