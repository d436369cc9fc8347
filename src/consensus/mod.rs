//! Consensus engine
//!
//! Pure, deterministic synthesis of 1..=3 opinions into one judgment.
//! Inputs are never mutated; opinions are processed in role order so the
//! output does not depend on the order they arrived in.
//!
//! WEIGHT → SCORE → CATEGORY → IMPACT → CONFLICTS → CONFIDENCE
//!   → RECOMMENDATION → SUMMARY

use crate::config::ConsensusConfig;
use crate::error::AnalysisError;
use crate::models::{
    AnalystRole, Conflict, ConflictKind, ConsensusResult, ImpactLevel, NewsArticle,
    OpinionRecord, PairAgreement, Recommendation, RoleWeight, SentimentCategory,
    VolatilityExpectation, WeightingProfile,
};
use crate::signals;
use crate::Result;
use std::collections::HashSet;
use tracing::debug;

mod summary;

/// Cap on merged factor/risk/opportunity lists
const MAX_LIST_ITEMS: usize = 5;

pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Merge the valid opinions for one article.
    ///
    /// Fails with `NoOpinionsAvailable` on an empty set; never fabricates a
    /// neutral result.
    pub fn synthesize(
        &self,
        article: &NewsArticle,
        opinions: &[OpinionRecord],
    ) -> Result<ConsensusResult> {
        if opinions.is_empty() {
            return Err(AnalysisError::NoOpinionsAvailable {
                article_id: article.article_id.clone(),
            });
        }

        let mut seen = HashSet::with_capacity(opinions.len());
        for opinion in opinions {
            opinion.validate()?;
            if !seen.insert(opinion.role) {
                return Err(AnalysisError::DuplicateRole(opinion.role));
            }
        }

        let mut ordered: Vec<&OpinionRecord> = opinions.iter().collect();
        ordered.sort_by_key(|o| o.role);

        let (min_score, max_score) = score_range(&ordered);
        let spread = max_score - min_score;

        // === WEIGHT ===
        let (weighting_profile, weights) = self.weigh(article, &ordered, spread);

        // === SCORE ===
        let weighted: f64 = ordered
            .iter()
            .zip(&weights)
            .map(|(o, w)| o.sentiment_score * w.weight)
            .sum();
        let overall_sentiment_score = weighted.clamp(min_score, max_score);
        let overall_sentiment_category = self.categorize(overall_sentiment_score);

        // === IMPACT ===
        let market_impact = ordered
            .iter()
            .map(|o| o.impact_level)
            .max()
            .unwrap_or(ImpactLevel::Low);

        // === CONFLICTS ===
        let conflicts = self.detect_conflicts(&ordered);

        // === CONFIDENCE ===
        let decision_confidence = self.decision_confidence(&ordered, spread, conflicts.len());

        // === RECOMMENDATION ===
        let recommendation =
            self.recommend(overall_sentiment_category, decision_confidence, &conflicts);

        let volatility_expectation = volatility_expectation(&ordered, &conflicts);

        debug!(
            article_id = %article.article_id,
            score = overall_sentiment_score,
            category = %overall_sentiment_category,
            confidence = decision_confidence,
            conflicts = conflicts.len(),
            "Consensus computed"
        );

        let executive_summary = summary::executive_summary(
            overall_sentiment_category,
            market_impact,
            recommendation,
            &conflicts,
        );
        let detailed_rationale =
            summary::detailed_rationale(&ordered, &weights, weighting_profile, &conflicts);
        let agreement_score = 1.0 - spread / 2.0;
        let notable_insights = summary::notable_insights(
            overall_sentiment_category,
            agreement_score,
            &conflicts,
            &ordered,
        );

        Ok(ConsensusResult {
            article_id: article.article_id.clone(),
            contributing_roles: ordered.iter().map(|o| o.role).collect(),
            weighting_profile,
            weights,
            overall_sentiment_score,
            overall_sentiment_category,
            market_impact,
            recommendation,
            decision_confidence,
            agreement_score,
            agreement_matrix: agreement_matrix(&ordered),
            conflicts,
            volatility_expectation,
            unified_factors: unified_factors(&ordered),
            key_risks: merge_items(ordered.iter().flat_map(|o| o.risk_factors.iter())),
            key_opportunities: merge_items(ordered.iter().flat_map(|o| o.opportunities.iter())),
            executive_summary,
            detailed_rationale,
            notable_insights,
        })
    }

    /// Five-way discretization. Bullish thresholds are inclusive; on the
    /// bearish side a score exactly on a threshold takes the less extreme
    /// category (-0.2 is neutral, -0.6 is bearish).
    pub fn categorize(&self, score: f64) -> SentimentCategory {
        let bullish = self.config.bullish_threshold;
        let strong = self.config.strong_threshold;

        if score >= strong {
            SentimentCategory::StrongBullish
        } else if score >= bullish {
            SentimentCategory::Bullish
        } else if score >= -bullish {
            SentimentCategory::Neutral
        } else if score >= -strong {
            SentimentCategory::Bearish
        } else {
            SentimentCategory::StrongBearish
        }
    }

    /// Confidence-proportional weights with context boosts, normalized to 1
    fn weigh(
        &self,
        article: &NewsArticle,
        opinions: &[&OpinionRecord],
        spread: f64,
    ) -> (WeightingProfile, Vec<RoleWeight>) {
        let has_role = |role: AnalystRole| opinions.iter().any(|o| o.role == role);

        let earnings_focused = has_role(AnalystRole::Fundamental)
            && signals::quantitative_signal(article).is_strong();
        let uncertainty_high =
            has_role(AnalystRole::MarketDynamics) && spread > self.config.divergence_spread;

        let total_confidence: f64 = opinions.iter().map(|o| o.confidence).sum();

        let raw: Vec<f64> = opinions
            .iter()
            .map(|o| {
                // All-zero confidence degrades to equal weighting
                let base = if total_confidence > 0.0 { o.confidence } else { 1.0 };
                match o.role {
                    AnalystRole::Fundamental if earnings_focused => {
                        base * self.config.fundamental_boost
                    }
                    AnalystRole::MarketDynamics if uncertainty_high => {
                        base * self.config.dynamics_boost
                    }
                    _ => base,
                }
            })
            .collect();

        let sum: f64 = raw.iter().sum();
        let weights = opinions
            .iter()
            .zip(raw)
            .map(|(o, w)| RoleWeight {
                role: o.role,
                weight: w / sum,
            })
            .collect();

        let profile = match (earnings_focused, uncertainty_high) {
            (false, false) => WeightingProfile::Confidence,
            (true, false) => WeightingProfile::EarningsFocused,
            (false, true) => WeightingProfile::UncertaintyHigh,
            (true, true) => WeightingProfile::EarningsUncertainty,
        };

        (profile, weights)
    }

    /// Conflicts in detection order: sentiment, timing, impact
    fn detect_conflicts(&self, opinions: &[&OpinionRecord]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        // Widest opposite-sign pair at or beyond the conflict spread
        let mut widest: Option<(&OpinionRecord, &OpinionRecord, f64)> = None;
        for (i, a) in opinions.iter().enumerate() {
            for b in &opinions[i + 1..] {
                let diff = (a.sentiment_score - b.sentiment_score).abs();
                let opposite = a.sentiment_score * b.sentiment_score < 0.0;
                if opposite
                    && diff >= self.config.conflict_spread
                    && widest.map_or(true, |(_, _, best)| diff > best)
                {
                    widest = Some((*a, *b, diff));
                }
            }
        }
        if let Some((a, b, _)) = widest {
            let (low, high) = if a.sentiment_score <= b.sentiment_score { (a, b) } else { (b, a) };
            conflicts.push(Conflict {
                kind: ConflictKind::SentimentDivergence,
                roles: vec![low.role, high.role],
                description: format!(
                    "{} sees {:+.2} sentiment while {} sees {:+.2}",
                    low.role, low.sentiment_score, high.role, high.sentiment_score
                ),
                implication: "High uncertainty in market reaction".to_string(),
            });
        }

        if opinions.windows(2).any(|w| w[0].time_horizon != w[1].time_horizon) {
            conflicts.push(Conflict {
                kind: ConflictKind::TimingDisagreement,
                roles: opinions.iter().map(|o| o.role).collect(),
                description: format!(
                    "Roles disagree on impact timing: {}",
                    opinions
                        .iter()
                        .map(|o| format!("{}={}", o.role, o.time_horizon))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                implication: "Mixed signals on when the impact will materialize".to_string(),
            });
        }

        if opinions.windows(2).any(|w| w[0].impact_level != w[1].impact_level) {
            conflicts.push(Conflict {
                kind: ConflictKind::ImpactDisagreement,
                roles: opinions.iter().map(|o| o.role).collect(),
                description: format!(
                    "Roles disagree on impact severity: {}",
                    opinions
                        .iter()
                        .map(|o| format!("{}={}", o.role, o.impact_level))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                implication: "Uncertainty in reaction magnitude".to_string(),
            });
        }

        conflicts
    }

    /// Confidence-weighted mean confidence, reduced by the raw score range
    /// and once per conflict.
    ///
    /// Reads raw confidences, not the boosted weights: pushing scores apart
    /// never raises the result.
    fn decision_confidence(
        &self,
        opinions: &[&OpinionRecord],
        spread: f64,
        conflict_count: usize,
    ) -> f64 {
        let total: f64 = opinions.iter().map(|o| o.confidence).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let mean_confidence =
            opinions.iter().map(|o| o.confidence * o.confidence).sum::<f64>() / total;

        let agreement = 1.0 - self.config.spread_penalty * (spread / 2.0);
        let decay = self.config.conflict_decay.powi(conflict_count as i32);

        (mean_confidence * agreement * decay).clamp(0.0, 1.0)
    }

    /// Category mapped to an action, damped toward `hold` one notch for any
    /// conflict and one for sub-strong confidence
    fn recommend(
        &self,
        category: SentimentCategory,
        confidence: f64,
        conflicts: &[Conflict],
    ) -> Recommendation {
        if confidence < self.config.hold_floor {
            return Recommendation::Hold;
        }

        let mut notches = 0;
        if !conflicts.is_empty() {
            notches += 1;
        }
        if confidence < self.config.strong_action_confidence {
            notches += 1;
        }

        let level = category.level();
        let damped = (level.abs() - notches).max(0) * level.signum();
        Recommendation::from_level(damped)
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self {
            config: ConsensusConfig::default(),
        }
    }
}

fn score_range(opinions: &[&OpinionRecord]) -> (f64, f64) {
    opinions.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
        (lo.min(o.sentiment_score), hi.max(o.sentiment_score))
    })
}

fn agreement_matrix(opinions: &[&OpinionRecord]) -> Vec<PairAgreement> {
    let mut pairs = Vec::new();
    for (i, a) in opinions.iter().enumerate() {
        for b in &opinions[i + 1..] {
            pairs.push(PairAgreement {
                first: a.role,
                second: b.role,
                agreement: 1.0 - (a.sentiment_score - b.sentiment_score).abs() / 2.0,
            });
        }
    }
    pairs
}

fn volatility_expectation(
    opinions: &[&OpinionRecord],
    conflicts: &[Conflict],
) -> VolatilityExpectation {
    let mentions = signals::volatility_mentions(opinions.iter().copied());

    if conflicts.len() >= 3 {
        VolatilityExpectation::VeryHigh
    } else if mentions >= 3 {
        VolatilityExpectation::High
    } else if conflicts.len() >= 2 || mentions >= 1 {
        VolatilityExpectation::Moderate
    } else {
        VolatilityExpectation::Low
    }
}

/// Factors named by two or more roles, in first-mention order
fn unified_factors(opinions: &[&OpinionRecord]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut mentions: Vec<HashSet<AnalystRole>> = Vec::new();

    for opinion in opinions {
        for factor in &opinion.primary_factors {
            let key = factor.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            match order.iter().position(|f| *f == key) {
                Some(idx) => {
                    mentions[idx].insert(opinion.role);
                }
                None => {
                    order.push(key);
                    mentions.push(HashSet::from([opinion.role]));
                }
            }
        }
    }

    order
        .into_iter()
        .zip(mentions)
        .filter(|(_, roles)| roles.len() >= 2)
        .map(|(factor, _)| factor)
        .take(MAX_LIST_ITEMS)
        .collect()
}

/// Case-insensitive dedup preserving first spelling and order
fn merge_items<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| !item.trim().is_empty())
        .filter(|item| seen.insert(item.trim().to_lowercase()))
        .take(MAX_LIST_ITEMS)
        .cloned()
        .collect()
}
