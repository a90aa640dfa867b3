// ============================================
// Interaction Weighter
// ============================================
//
// Converts one user's raw interaction events into doubly-decayed scores.
//
// score = action_weight * exp(-ln2 * i / 20) * exp(-ln2 * d / 45)
//
// Where:
//   - action_weight: like = +2, comment = +4, dislike = -5
//   - i: recency index (0 = most recent event of the user)
//   - d: days between the event and the reference time `now`
//
// Events that happen after `now` are malformed and rejected before the
// recency index is assigned.

use crate::models::{ContentId, ContentKeys, EventId, InteractionAction, InteractionEvent};
use crate::utils::{days_between, half_life_decay};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Half-life of the recency decay, in interactions
pub const RECENCY_HALF_LIFE: f64 = 20.0;
/// Half-life of the time decay, in days
pub const TIME_HALF_LIFE_DAYS: f64 = 45.0;

/// One accepted event with its decayed score and the keys of its content
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedInteraction {
    pub event_id: EventId,
    pub content_id: ContentId,
    pub recency_index: usize,
    pub age_days: f64,
    pub score: f64,
    pub keys: ContentKeys,
}

#[derive(Debug, Clone, Default)]
pub struct WeighingOutcome {
    /// Accepted events, most recent first
    pub weighted: Vec<WeightedInteraction>,
    /// Events dated after `now`
    pub rejected: usize,
    /// Accepted events whose content has no metadata (scored, but keyless)
    pub unknown_content: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionWeighter;

impl InteractionWeighter {
    pub fn new() -> Self {
        Self
    }

    /// Sort events most recent first and attach their recency index.
    ///
    /// Ties on `occurred_at` are broken by `event_id` (higher id first), so the
    /// order is total and independent of the input order.
    pub fn order_by_recency(mut events: Vec<InteractionEvent>) -> Vec<(InteractionEvent, usize)> {
        events.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.event_id.cmp(&a.event_id))
        });

        events.into_iter().enumerate().map(|(i, e)| (e, i)).collect()
    }

    /// Doubly-decayed score of a single event
    pub fn event_score(action: InteractionAction, recency_index: usize, age_days: f64) -> f64 {
        action.weight()
            * half_life_decay(recency_index as f64, RECENCY_HALF_LIFE)
            * half_life_decay(age_days, TIME_HALF_LIFE_DAYS)
    }

    /// Split off events dated after `now`, returning (accepted, rejected count)
    pub fn reject_future(
        events: Vec<InteractionEvent>,
        now: DateTime<Utc>,
    ) -> (Vec<InteractionEvent>, usize) {
        let total = events.len();
        let accepted: Vec<InteractionEvent> = events
            .into_iter()
            .filter(|e| {
                let valid = e.occurred_at <= now;
                if !valid {
                    debug!(
                        event_id = e.event_id,
                        user_id = e.user_id,
                        action = e.action.as_str(),
                        occurred_at = %e.occurred_at,
                        "Interaction dated after the reference time"
                    );
                }
                valid
            })
            .collect();
        let rejected = total - accepted.len();

        if rejected > 0 {
            warn!(
                rejected = rejected,
                now = %now,
                "Rejected interactions dated after the reference time"
            );
        }

        (accepted, rejected)
    }

    /// Score one user's events, joining each with its content keys
    pub fn weigh(
        &self,
        events: Vec<InteractionEvent>,
        content_keys: &HashMap<ContentId, ContentKeys>,
        now: DateTime<Utc>,
    ) -> WeighingOutcome {
        if events.is_empty() {
            return WeighingOutcome::default();
        }

        let (accepted, rejected) = Self::reject_future(events, now);
        let mut unknown_content = 0usize;

        let weighted: Vec<WeightedInteraction> = Self::order_by_recency(accepted)
            .into_iter()
            .map(|(event, recency_index)| {
                let age_days = days_between(event.occurred_at, now);
                let score = Self::event_score(event.action, recency_index, age_days);
                let keys = match content_keys.get(&event.content_id) {
                    Some(keys) => keys.clone(),
                    None => {
                        unknown_content += 1;
                        ContentKeys::default()
                    }
                };

                WeightedInteraction {
                    event_id: event.event_id,
                    content_id: event.content_id,
                    recency_index,
                    age_days,
                    score,
                    keys,
                }
            })
            .collect();

        if unknown_content > 0 {
            warn!(
                unknown_content = unknown_content,
                "Interactions reference content without metadata"
            );
        }

        debug!(
            weighted = weighted.len(),
            rejected = rejected,
            "Weighted user interactions"
        );

        WeighingOutcome {
            weighted,
            rejected,
            unknown_content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn event(
        event_id: EventId,
        content_id: ContentId,
        action: InteractionAction,
        at: DateTime<Utc>,
    ) -> InteractionEvent {
        InteractionEvent {
            event_id,
            user_id: 1,
            content_id,
            action,
            occurred_at: at,
        }
    }

    #[test]
    fn test_order_by_recency_breaks_ties_by_event_id() {
        let t = now() - Duration::days(1);
        let events = vec![
            event(1, 10, InteractionAction::Like, t),
            event(3, 11, InteractionAction::Like, now() - Duration::days(3)),
            event(2, 12, InteractionAction::Like, t),
        ];

        let ordered = InteractionWeighter::order_by_recency(events);
        let ids: Vec<(EventId, usize)> = ordered.iter().map(|(e, i)| (e.event_id, *i)).collect();
        assert_eq!(ids, vec![(2, 0), (1, 1), (3, 2)]);
    }

    #[test]
    fn test_event_score_fresh_like() {
        let score = InteractionWeighter::event_score(InteractionAction::Like, 0, 0.0);
        assert!((score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_event_score_halves_at_half_lives() {
        let by_index = InteractionWeighter::event_score(InteractionAction::Comment, 20, 0.0);
        assert!((by_index - 2.0).abs() < 1e-9);

        let by_age = InteractionWeighter::event_score(InteractionAction::Comment, 0, 45.0);
        assert!((by_age - 2.0).abs() < 1e-9);

        let dislike = InteractionWeighter::event_score(InteractionAction::Dislike, 20, 45.0);
        assert!((dislike + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_weigh_rejects_future_events_before_indexing() {
        let weighter = InteractionWeighter::new();
        let mut keys = HashMap::new();
        keys.insert(10, ContentKeys::default());

        let events = vec![
            event(1, 10, InteractionAction::Like, now() + Duration::hours(1)),
            event(2, 10, InteractionAction::Comment, now() - Duration::days(2)),
        ];

        let outcome = weighter.weigh(events, &keys, now());
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.weighted.len(), 1);
        // The surviving event is the most recent accepted one
        assert_eq!(outcome.weighted[0].recency_index, 0);
        assert_eq!(outcome.weighted[0].event_id, 2);
    }

    #[test]
    fn test_weigh_joins_keys_and_counts_unknown_content() {
        let weighter = InteractionWeighter::new();
        let mut keys = HashMap::new();
        keys.insert(
            10,
            ContentKeys {
                categories: ["music".to_string()].into_iter().collect(),
                ..Default::default()
            },
        );

        let events = vec![
            event(1, 10, InteractionAction::Like, now()),
            event(2, 99, InteractionAction::Like, now() - Duration::days(1)),
        ];

        let outcome = weighter.weigh(events, &keys, now());
        assert_eq!(outcome.unknown_content, 1);
        assert!(outcome.weighted[0].keys.categories.contains("music"));
        assert!(outcome.weighted[1].keys.categories.is_empty());
    }

    #[test]
    fn test_weigh_empty() {
        let outcome = InteractionWeighter::new().weigh(Vec::new(), &HashMap::new(), now());
        assert!(outcome.weighted.is_empty());
        assert_eq!(outcome.rejected, 0);
    }
}
