// ============================================
// Scoring Data Source
// ============================================
//
// Read-only contract with the external data store. Implement this trait to
// plug the pipeline into the storage that holds interactions and content.
//
// InMemorySnapshot is an owned snapshot implementation used by tests, batch
// exporters and callers that already hold the rows in memory.

use crate::error::{Result, ScoringError};
use crate::models::{ContentId, ContentItem, Dimension, InteractionEvent, UserId};
use crate::services::profile_builder::InteractionWeighter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringDataSource: Send + Sync {
    /// A user's interactions, most recent first, optionally limited
    async fn fetch_interactions(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<InteractionEvent>>;

    /// Content rows for the given ids, or the whole catalog when `None`
    async fn fetch_content(&self, content_ids: Option<Vec<ContentId>>) -> Result<Vec<ContentItem>>;

    /// All users' interactions on any content at or after `since`.
    ///
    /// Not filtered by content: a user's recency index is counted over every
    /// event in the window, not only the events on the scored candidates.
    async fn fetch_engagement_since(&self, since: DateTime<Utc>) -> Result<Vec<InteractionEvent>>;

    /// Keys of one content item in one dimension
    async fn fetch_tag_mappings(
        &self,
        dimension: Dimension,
        content_id: ContentId,
    ) -> Result<BTreeSet<String>> {
        let items = self.fetch_content(Some(vec![content_id])).await?;
        Ok(items
            .into_iter()
            .find(|item| item.content_id == content_id)
            .map(|item| item.keys(dimension).clone())
            .unwrap_or_default())
    }
}

/// Serialized form of a data snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub interactions: Vec<InteractionEvent>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

/// Immutable in-memory snapshot of interactions and content
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshot {
    interactions: Vec<InteractionEvent>,
    content: BTreeMap<ContentId, ContentItem>,
}

impl InMemorySnapshot {
    pub fn new(interactions: Vec<InteractionEvent>, content: Vec<ContentItem>) -> Self {
        Self {
            interactions,
            content: content
                .into_iter()
                .map(|item| (item.content_id, item))
                .collect(),
        }
    }

    /// Load a snapshot from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        let data: SnapshotData = serde_json::from_str(json)
            .map_err(|e| ScoringError::DataSource(format!("invalid snapshot: {}", e)))?;
        Ok(Self::from(data))
    }

    pub fn content_count(&self) -> usize {
        self.content.len()
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }
}

impl From<SnapshotData> for InMemorySnapshot {
    fn from(data: SnapshotData) -> Self {
        Self::new(data.interactions, data.content)
    }
}

#[async_trait]
impl ScoringDataSource for InMemorySnapshot {
    async fn fetch_interactions(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<InteractionEvent>> {
        let events: Vec<InteractionEvent> = self
            .interactions
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();

        let mut ordered: Vec<InteractionEvent> = InteractionWeighter::order_by_recency(events)
            .into_iter()
            .map(|(event, _)| event)
            .collect();

        if let Some(limit) = limit {
            ordered.truncate(limit);
        }

        debug!(user_id = user_id, count = ordered.len(), "Fetched interactions");

        Ok(ordered)
    }

    async fn fetch_content(&self, content_ids: Option<Vec<ContentId>>) -> Result<Vec<ContentItem>> {
        let items = match content_ids {
            Some(ids) => {
                let wanted: HashSet<ContentId> = ids.into_iter().collect();
                self.content
                    .values()
                    .filter(|item| wanted.contains(&item.content_id))
                    .cloned()
                    .collect()
            }
            None => self.content.values().cloned().collect(),
        };

        Ok(items)
    }

    async fn fetch_engagement_since(&self, since: DateTime<Utc>) -> Result<Vec<InteractionEvent>> {
        Ok(self
            .interactions
            .iter()
            .filter(|e| e.occurred_at >= since)
            .cloned()
            .collect())
    }
}
