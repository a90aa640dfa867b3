use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type UserId = i64;
pub type ContentId = i64;
pub type EventId = i64;

/// User action recorded against a content item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Like,
    Comment,
    Dislike,
}

impl InteractionAction {
    /// Fixed action weight: like = +2, comment = +4, dislike = -5
    pub fn weight(&self) -> f64 {
        match self {
            InteractionAction::Like => 2.0,
            InteractionAction::Comment => 4.0,
            InteractionAction::Dislike => -5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::Like => "like",
            InteractionAction::Comment => "comment",
            InteractionAction::Dislike => "dislike",
        }
    }
}

/// Immutable historical interaction fact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionEvent {
    /// Stable secondary ordering key for events sharing a timestamp
    pub event_id: EventId,
    pub user_id: UserId,
    pub content_id: ContentId,
    pub action: InteractionAction,
    pub occurred_at: DateTime<Utc>,
}

/// Feature dimension used for affinity grouping
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Genre,
    Tag,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Category, Dimension::Genre, Dimension::Tag];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Genre => "genre",
            Dimension::Tag => "tag",
        }
    }
}

/// Content snapshot row with engagement counters and categorical keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub content_id: ContentId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
    pub dislike_count: u64,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ContentItem {
    /// Keys of this item in the given dimension
    pub fn keys(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Category => &self.categories,
            Dimension::Genre => &self.genres,
            Dimension::Tag => &self.tags,
        }
    }

    pub fn content_keys(&self) -> ContentKeys {
        ContentKeys {
            categories: self.categories.clone(),
            genres: self.genres.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Categorical keys of a content item, detached from its counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentKeys {
    pub categories: BTreeSet<String>,
    pub genres: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl ContentKeys {
    pub fn keys(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Category => &self.categories,
            Dimension::Genre => &self.genres,
            Dimension::Tag => &self.tags,
        }
    }
}

/// Normalized preference of a user for one key within a dimension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffinityWeight {
    pub user_id: UserId,
    pub dimension: Dimension,
    pub key: String,
    pub weight: f64,
}

/// Result of one scoring run for one (user, content) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentScore {
    pub content_id: ContentId,
    pub title: String,
    pub mean_score: f64,
    pub weighted_score: f64,
    pub age_days: f64,
    pub velocity_boost: f64,
    pub final_score: f64,
}

/// Why a candidate was dropped from the ranked output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemFailureReason {
    /// The data source returned no metadata row for a requested content id
    MissingMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub content_id: ContentId,
    pub reason: ItemFailureReason,
}
