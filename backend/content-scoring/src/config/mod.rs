use crate::error::{Result, ScoringError};
use serde::Deserialize;

const ENV_PREFIX: &str = "CONTENT_SCORING_";

/// Operational settings for a scoring run.
///
/// Formula constants (action weights, half-lives, dimension factors, caps)
/// are fixed and live next to the component that uses them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoringConfig {
    /// Upper bound on interactions fetched per user
    #[serde(default = "default_interaction_limit")]
    pub interaction_limit: Option<usize>,
    /// Number of content items scored per parallel batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Truncation applied when the caller passes no explicit top-K
    #[serde(default)]
    pub default_top_k: Option<usize>,
    #[serde(default = "default_true")]
    pub affinity_cache_enabled: bool,
    /// Reuse cached profiles across `now` values within buckets of this
    /// width. Unset keys the cache by the exact `now`, which keeps runs
    /// independent of earlier runs.
    #[serde(default)]
    pub affinity_cache_bucket_secs: Option<i64>,
    #[serde(default = "default_cache_max_entries")]
    pub affinity_cache_max_entries: usize,
}

fn default_interaction_limit() -> Option<usize> {
    Some(500)
}

fn default_batch_size() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_cache_max_entries() -> usize {
    10_000
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            interaction_limit: default_interaction_limit(),
            batch_size: default_batch_size(),
            default_top_k: None,
            affinity_cache_enabled: true,
            affinity_cache_bucket_secs: None,
            affinity_cache_max_entries: default_cache_max_entries(),
        }
    }
}

impl ScoringConfig {
    /// Load from `CONTENT_SCORING_*` environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: ScoringConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit variable iterator, without touching the process environment
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: ScoringConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ScoringError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if matches!(self.affinity_cache_bucket_secs, Some(secs) if secs <= 0) {
            return Err(ScoringError::InvalidConfig(
                "affinity_cache_bucket_secs must be greater than 0".to_string(),
            ));
        }
        if self.interaction_limit == Some(0) {
            return Err(ScoringError::InvalidConfig(
                "interaction_limit must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
