// ============================================
// Scoring Run (personalized ranking for one user)
// ============================================
//
// Orchestrates one scoring run over an immutable snapshot at a fixed `now`.
//
// Workflow:
// 1. Build (or reuse) the user's affinity profile
//    interactions → InteractionWeighter → AffinityAggregator
// 2. Fetch the candidate content set, reporting requested ids with no metadata
// 3. Aggregate 7/30-day engagement windows over all content, keep the candidates
// 4. Score candidates in parallel batches (rayon), checking cancellation per batch
//    quality → personalization → freshness × velocity
// 5. Serial merge, sort and top-K truncation
//
// Usage:
//   let pipeline = ContentScoringPipeline::new(Arc::new(source), ScoringConfig::from_env()?);
//   let report = pipeline.score(ScoringRequest::new(user_id, now), &CancellationFlag::new()).await?;

use crate::config::ScoringConfig;
use crate::error::{Result, ScoringError};
use crate::models::{
    ContentId, ContentItem, ContentKeys, ContentScore, InteractionEvent, ItemFailure,
    ItemFailureReason, UserId,
};
use crate::services::affinity_cache::AffinityCache;
use crate::services::data_source::ScoringDataSource;
use crate::services::personalization::PersonalizationCombiner;
use crate::services::profile_builder::{AffinityAggregator, AffinityProfile, InteractionWeighter};
use crate::services::quality;
use crate::services::ranking::{Ranker, ScoreCombiner};
use crate::services::velocity::{EngagementWindows, VelocityDetector};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cooperative cancellation shared between a caller and a running job
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to abandon the batches it has not started yet
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Input of one scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRequest {
    pub user_id: UserId,
    pub now: DateTime<Utc>,
    /// Truncate the ranking; falls back to `ScoringConfig::default_top_k`
    pub top_k: Option<usize>,
    /// Restrict the candidate set; `None` scores the whole catalog
    pub candidate_ids: Option<Vec<ContentId>>,
}

impl ScoringRequest {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            now,
            top_k: None,
            candidate_ids: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_candidates(mut self, candidate_ids: Vec<ContentId>) -> Self {
        self.candidate_ids = Some(candidate_ids);
        self
    }
}

/// Scoring run statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStats {
    pub interactions_fetched: usize,
    pub rejected_interactions: usize,
    pub unknown_interaction_content: usize,
    pub affinity_cache_hit: bool,
    pub candidates_fetched: usize,
    pub candidates_scored: usize,
    pub batches_total: usize,
    pub batches_completed: usize,
}

/// Output of one scoring run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringReport {
    pub user_id: UserId,
    pub now: DateTime<Utc>,
    /// Sorted by final score descending, content id ascending on ties
    pub ranked: Vec<ContentScore>,
    /// Candidates excluded from the ranking
    pub failures: Vec<ItemFailure>,
    pub stats: RunStats,
    /// True when remaining batches were abandoned; `ranked` holds the finished ones
    pub cancelled: bool,
}

/// Affinity profile plus the data-quality counters of building it
#[derive(Debug, Clone)]
pub struct ProfileOutcome {
    pub profile: Arc<AffinityProfile>,
    pub interactions_fetched: usize,
    pub rejected_interactions: usize,
    pub unknown_interaction_content: usize,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub scores: Vec<ContentScore>,
    pub batches_total: usize,
    pub batches_completed: usize,
}

/// CPU-bound candidate scoring, shared with the blocking worker
#[derive(Debug, Clone, Copy)]
pub struct CandidateScorer {
    personalization: PersonalizationCombiner,
    combiner: ScoreCombiner,
    batch_size: usize,
}

impl CandidateScorer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            personalization: PersonalizationCombiner::new(),
            combiner: ScoreCombiner::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Score a single candidate for the user described by `profile`
    pub fn score_item(
        &self,
        item: &ContentItem,
        profile: &AffinityProfile,
        windows: EngagementWindows,
        now: DateTime<Utc>,
    ) -> ContentScore {
        let mean_score = quality::item_mean_score(item);
        let weighted_score = self
            .personalization
            .weighted_score(mean_score, item, profile);
        let velocity_boost = windows.velocity_boost();

        self.combiner
            .combine(item, mean_score, weighted_score, velocity_boost, now)
    }

    /// Score candidates in parallel batches; batches not yet started when the
    /// flag is raised are skipped
    pub fn score_batches(
        &self,
        items: &[ContentItem],
        profile: &AffinityProfile,
        windows: &BTreeMap<ContentId, EngagementWindows>,
        now: DateTime<Utc>,
        cancel: &CancellationFlag,
    ) -> BatchOutcome {
        let batches: Vec<Option<Vec<ContentScore>>> = items
            .par_chunks(self.batch_size)
            .map(|batch| {
                if cancel.is_cancelled() {
                    return None;
                }

                Some(
                    batch
                        .iter()
                        .map(|item| {
                            let item_windows =
                                windows.get(&item.content_id).copied().unwrap_or_default();
                            self.score_item(item, profile, item_windows, now)
                        })
                        .collect(),
                )
            })
            .collect();

        let batches_total = batches.len();
        let mut batches_completed = 0usize;
        let mut scores = Vec::with_capacity(items.len());

        for batch in batches.into_iter().flatten() {
            batches_completed += 1;
            scores.extend(batch);
        }

        BatchOutcome {
            scores,
            batches_total,
            batches_completed,
        }
    }
}

/// Personalized content scoring pipeline over a data source
pub struct ContentScoringPipeline<D: ScoringDataSource> {
    source: Arc<D>,
    config: ScoringConfig,
    cache: Option<Arc<AffinityCache>>,
    weighter: InteractionWeighter,
    aggregator: AffinityAggregator,
    velocity: VelocityDetector,
    scorer: CandidateScorer,
    ranker: Ranker,
}

impl<D: ScoringDataSource> ContentScoringPipeline<D> {
    pub fn new(source: Arc<D>, config: ScoringConfig) -> Self {
        let cache = match (config.affinity_cache_enabled, config.affinity_cache_bucket_secs) {
            (false, _) => None,
            (true, None) => Some(Arc::new(AffinityCache::new(config.affinity_cache_max_entries))),
            (true, Some(secs)) => Some(Arc::new(AffinityCache::bucketed(
                secs,
                config.affinity_cache_max_entries,
            ))),
        };

        Self {
            source,
            scorer: CandidateScorer::new(config.batch_size),
            config,
            cache,
            weighter: InteractionWeighter::new(),
            aggregator: AffinityAggregator::new(),
            velocity: VelocityDetector::new(),
            ranker: Ranker::new(),
        }
    }

    /// Share an affinity cache between pipelines
    pub fn with_cache(mut self, cache: Arc<AffinityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Build the user's affinity profile, or reuse the cached one for this `now`
    pub async fn affinity_profile(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<ProfileOutcome> {
        if let Some(profile) = self.cache.as_ref().and_then(|c| c.get(user_id, now)) {
            debug!(user_id = user_id, "Affinity profile cache hit");
            return Ok(ProfileOutcome {
                profile,
                interactions_fetched: 0,
                rejected_interactions: 0,
                unknown_interaction_content: 0,
                cache_hit: true,
            });
        }

        let events = self.fetch_valid_interactions(user_id, now).await?;
        let interactions_fetched = events.len();

        let interacted: BTreeSet<ContentId> = events.iter().map(|e| e.content_id).collect();
        let content_keys: HashMap<ContentId, ContentKeys> = if interacted.is_empty() {
            HashMap::new()
        } else {
            self.source
                .fetch_content(Some(interacted.into_iter().collect()))
                .await?
                .into_iter()
                .map(|item| (item.content_id, item.content_keys()))
                .collect()
        };

        let outcome = self.weighter.weigh(events, &content_keys, now);
        let profile = self.aggregator.build_profile(user_id, &outcome.weighted);

        let profile = match &self.cache {
            Some(cache) => cache.insert_once(user_id, now, profile),
            None => Arc::new(profile),
        };

        Ok(ProfileOutcome {
            profile,
            interactions_fetched,
            rejected_interactions: outcome.rejected,
            unknown_interaction_content: outcome.unknown_content,
            cache_hit: false,
        })
    }

    /// Fetch up to `interaction_limit` events dated at or before `now`.
    ///
    /// Events after `now` sort first, so each one found in a full page pushes
    /// the fetch limit up by one until the page covers `limit` valid events.
    /// The returned list still holds the future events; the weighter rejects
    /// and counts them.
    async fn fetch_valid_interactions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<InteractionEvent>> {
        let limit = self.config.interaction_limit;
        let mut requested = limit;

        loop {
            let events = self.source.fetch_interactions(user_id, requested).await?;
            let future = events.iter().filter(|e| e.occurred_at > now).count();

            match (limit, requested) {
                (Some(limit), Some(current))
                    if events.len() >= current && limit + future > current =>
                {
                    debug!(
                        user_id = user_id,
                        future = future,
                        "Extending interaction fetch past future-dated events"
                    );
                    requested = Some(limit + future);
                }
                _ => return Ok(events),
            }
        }
    }

    /// Fetch candidates, reporting requested ids the data source has no metadata for
    async fn fetch_candidates(
        &self,
        candidate_ids: Option<&[ContentId]>,
    ) -> Result<(Vec<ContentItem>, Vec<ItemFailure>)> {
        let requested: Option<BTreeSet<ContentId>> =
            candidate_ids.map(|ids| ids.iter().copied().collect());

        let fetched = self
            .source
            .fetch_content(requested.as_ref().map(|ids| ids.iter().copied().collect()))
            .await?;

        // One row per content id, ordered by id
        let mut by_id: BTreeMap<ContentId, ContentItem> = BTreeMap::new();
        for item in fetched {
            let keep = requested
                .as_ref()
                .map_or(true, |ids| ids.contains(&item.content_id));
            if keep {
                by_id.entry(item.content_id).or_insert(item);
            }
        }

        let failures: Vec<ItemFailure> = requested
            .iter()
            .flatten()
            .filter(|id| !by_id.contains_key(*id))
            .map(|id| ItemFailure {
                content_id: *id,
                reason: ItemFailureReason::MissingMetadata,
            })
            .collect();

        for failure in &failures {
            warn!(
                content_id = failure.content_id,
                "Candidate has no content metadata, excluding from ranking"
            );
        }

        Ok((by_id.into_values().collect(), failures))
    }

    /// Run the full pipeline for one user
    pub async fn score(
        &self,
        request: ScoringRequest,
        cancel: &CancellationFlag,
    ) -> Result<ScoringReport> {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();
        let ScoringRequest {
            user_id,
            now,
            top_k,
            candidate_ids,
        } = request;

        info!(
            run_id = %run_id,
            user_id = user_id,
            now = %now,
            "Starting scoring run"
        );

        let profile = self.affinity_profile(user_id, now).await?;

        let (items, failures) = self.fetch_candidates(candidate_ids.as_deref()).await?;

        // Recency indices need every user's full window, so the engagement is
        // aggregated over all content and only then narrowed to the candidates
        let windows = if items.is_empty() {
            BTreeMap::new()
        } else {
            let events = self
                .source
                .fetch_engagement_since(VelocityDetector::baseline_since(now))
                .await?;
            let mut totals = self.velocity.window_totals(events, now);
            let candidate_set: BTreeSet<ContentId> =
                items.iter().map(|item| item.content_id).collect();
            totals.retain(|content_id, _| candidate_set.contains(content_id));
            totals
        };

        let candidates_fetched = items.len();
        let scorer = self.scorer;
        let batch_profile = Arc::clone(&profile.profile);
        let batch_cancel = cancel.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            scorer.score_batches(&items, &batch_profile, &windows, now, &batch_cancel)
        })
        .await
        .map_err(|e| ScoringError::Task(e.to_string()))?;

        let cancelled = outcome.batches_completed < outcome.batches_total;
        if cancelled {
            warn!(
                run_id = %run_id,
                user_id = user_id,
                completed = outcome.batches_completed,
                total = outcome.batches_total,
                "Scoring run cancelled, returning partial results"
            );
        }

        let stats = RunStats {
            interactions_fetched: profile.interactions_fetched,
            rejected_interactions: profile.rejected_interactions,
            unknown_interaction_content: profile.unknown_interaction_content,
            affinity_cache_hit: profile.cache_hit,
            candidates_fetched,
            candidates_scored: outcome.scores.len(),
            batches_total: outcome.batches_total,
            batches_completed: outcome.batches_completed,
        };

        let ranked = self
            .ranker
            .rank(outcome.scores, top_k.or(self.config.default_top_k));

        info!(
            run_id = %run_id,
            user_id = user_id,
            scored = stats.candidates_scored,
            ranked = ranked.len(),
            failures = failures.len(),
            rejected = stats.rejected_interactions,
            cache_hit = stats.affinity_cache_hit,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Scoring run completed"
        );

        Ok(ScoringReport {
            user_id,
            now,
            ranked,
            failures,
            stats,
            cancelled,
        })
    }
}
