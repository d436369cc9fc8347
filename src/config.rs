//! Runtime configuration
//!
//! `AnalyzerConfig` is read from the environment (optionally via `.env`).
//! `ConsensusConfig` holds every threshold the consensus engine uses.

use crate::error::AnalysisError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Settings for the live analyst invoker and the orchestrator
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub orchestrator: OrchestratorConfig,
}

impl AnalyzerConfig {
    /// Load from process environment after applying `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let defaults = OrchestratorConfig::default();

        let orchestrator = OrchestratorConfig {
            call_timeout: Duration::from_secs(env_parse(
                "ANALYST_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
            article_deadline: Duration::from_secs(env_parse(
                "ARTICLE_DEADLINE_SECS",
                defaults.article_deadline.as_secs(),
            )?),
            max_retries: env_parse("ANALYST_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff: Duration::from_millis(env_parse(
                "ANALYST_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            max_concurrent_articles: env_parse(
                "MAX_CONCURRENT_ARTICLES",
                defaults.max_concurrent_articles,
            )?,
        };

        orchestrator.validate()?;

        Ok(Self {
            gemini_api_key,
            gemini_model,
            orchestrator,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            AnalysisError::Config("GEMINI_API_KEY not configured".to_string())
        })
    }
}

/// Parse an optional environment variable, rejecting malformed values
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            AnalysisError::Config(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

/// Timeouts, retry and concurrency limits for a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Bound on a single analyst call attempt
    pub call_timeout: Duration,
    /// Bound on all role invocations for one article
    pub article_deadline: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_concurrent_articles: usize,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(AnalysisError::Config("call timeout must be positive".to_string()));
        }
        if self.article_deadline.is_zero() {
            return Err(AnalysisError::Config(
                "article deadline must be positive".to_string(),
            ));
        }
        if self.max_concurrent_articles == 0 {
            return Err(AnalysisError::Config(
                "max concurrent articles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            article_deadline: Duration::from_secs(90),
            max_retries: 1,
            retry_backoff: Duration::from_millis(750),
            max_concurrent_articles: 2,
        }
    }
}

/// Consensus thresholds.
///
/// Calibrated so that +0.50 (0.85) / -0.50 (0.85) / +0.50 (0.70) across the
/// three roles lands on `neutral` and `hold` with a sentiment divergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Scores at or above this are `bullish`; strictly below its negation
    /// they are `bearish`
    pub bullish_threshold: f64,
    /// Scores at or above this are `strong_bullish`; strictly below its
    /// negation they are `strong_bearish`
    pub strong_threshold: f64,
    /// Raw score spread above which market dynamics gains weight
    pub divergence_spread: f64,
    /// Opposite-sign pairs at least this far apart are a sentiment conflict
    pub conflict_spread: f64,
    /// Multiplier on the fundamental weight when the article carries hard figures
    pub fundamental_boost: f64,
    /// Multiplier on the market-dynamics weight under divergence
    pub dynamics_boost: f64,
    /// Fraction of confidence removed at maximal spread (2.0)
    pub spread_penalty: f64,
    /// Confidence multiplier applied once per detected conflict
    pub conflict_decay: f64,
    /// Below this decision confidence the recommendation is `hold`
    pub hold_floor: f64,
    /// Minimum decision confidence for an undamped recommendation
    pub strong_action_confidence: f64,
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("bullish_threshold", self.bullish_threshold),
            ("strong_threshold", self.strong_threshold),
            ("divergence_spread", self.divergence_spread),
            ("conflict_spread", self.conflict_spread),
            ("fundamental_boost", self.fundamental_boost),
            ("dynamics_boost", self.dynamics_boost),
            ("spread_penalty", self.spread_penalty),
            ("conflict_decay", self.conflict_decay),
            ("hold_floor", self.hold_floor),
            ("strong_action_confidence", self.strong_action_confidence),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::Config(format!("{} must be finite, got {}", name, value)));
        }

        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(0.0 < self.bullish_threshold
            && self.bullish_threshold < self.strong_threshold
            && self.strong_threshold <= 1.0)
        {
            return Err(AnalysisError::Config(
                "category thresholds must satisfy 0 < bullish < strong <= 1".to_string(),
            ));
        }
        if self.fundamental_boost < 1.0 || self.dynamics_boost < 1.0 {
            return Err(AnalysisError::Config("weight boosts must be >= 1".to_string()));
        }
        // Spread and conflicts must each strictly lower confidence
        if !(self.spread_penalty > 0.0 && self.spread_penalty <= 1.0) {
            return Err(AnalysisError::Config("spread penalty must lie in (0, 1]".to_string()));
        }
        if !(self.conflict_decay > 0.0 && self.conflict_decay < 1.0) {
            return Err(AnalysisError::Config("conflict decay must lie in (0, 1)".to_string()));
        }
        if !in_unit(self.hold_floor) || !in_unit(self.strong_action_confidence) {
            return Err(AnalysisError::Config(
                "confidence thresholds must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            bullish_threshold: 0.2,
            strong_threshold: 0.6,
            divergence_spread: 0.5,
            conflict_spread: 0.5,
            fundamental_boost: 1.5,
            dynamics_boost: 1.25,
            spread_penalty: 0.5,
            conflict_decay: 0.85,
            hold_floor: 0.35,
            strong_action_confidence: 0.65,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConsensusConfig::default().validate().is_ok());
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = ConsensusConfig {
            bullish_threshold: 0.7,
            strong_threshold: 0.6,
            ..ConsensusConfig::default()
        };
        assert!(matches!(config.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_penalties_must_strictly_lower_confidence() {
        let no_decay = ConsensusConfig {
            conflict_decay: 1.0,
            ..ConsensusConfig::default()
        };
        assert!(matches!(no_decay.validate(), Err(AnalysisError::Config(_))));

        let no_penalty = ConsensusConfig {
            spread_penalty: 0.0,
            ..ConsensusConfig::default()
        };
        assert!(matches!(no_penalty.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let nan_boost = ConsensusConfig {
            fundamental_boost: f64::NAN,
            ..ConsensusConfig::default()
        };
        assert!(matches!(nan_boost.validate(), Err(AnalysisError::Config(_))));

        let infinite_spread = ConsensusConfig {
            divergence_spread: f64::INFINITY,
            ..ConsensusConfig::default()
        };
        assert!(infinite_spread.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = OrchestratorConfig {
            max_concurrent_articles: 0,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        env::set_var("NEWS_CONSENSUS_TEST_BAD_NUMBER", "twelve");
        let parsed: Result<u64> = env_parse("NEWS_CONSENSUS_TEST_BAD_NUMBER", 5);
        assert!(matches!(parsed, Err(AnalysisError::Config(_))));

        let parsed: u64 = env_parse("NEWS_CONSENSUS_TEST_UNSET_NUMBER", 5).unwrap();
        assert_eq!(parsed, 5);
    }
}
