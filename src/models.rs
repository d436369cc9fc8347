//! Core data models for the news consensus analyzer

use crate::error::{AgentFailure, AnalysisError};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on `primary_factors` per opinion
pub const MAX_PRIMARY_FACTORS: usize = 5;

//
// ================= Enums =================
//

/// The closed set of analyst roles. Each role is bound to its own prompt frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRole {
    Sentiment,
    Fundamental,
    MarketDynamics,
}

impl AnalystRole {
    pub const ALL: [AnalystRole; 3] = [
        AnalystRole::Sentiment,
        AnalystRole::Fundamental,
        AnalystRole::MarketDynamics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystRole::Sentiment => "sentiment",
            AnalystRole::Fundamental => "fundamental",
            AnalystRole::MarketDynamics => "market_dynamics",
        }
    }
}

/// Ordered by severity: `Low < Moderate < High < VeryHigh`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    #[serde(alias = "negligible")]
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Moderate => "moderate",
            ImpactLevel::High => "high",
            ImpactLevel::VeryHigh => "very_high",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeHorizon {
    Immediate,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Immediate => "immediate",
            TimeHorizon::ShortTerm => "short_term",
            TimeHorizon::MediumTerm => "medium_term",
            TimeHorizon::LongTerm => "long_term",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SentimentCategory {
    StrongBearish,
    Bearish,
    Neutral,
    Bullish,
    StrongBullish,
}

impl SentimentCategory {
    pub const ALL: [SentimentCategory; 5] = [
        SentimentCategory::StrongBearish,
        SentimentCategory::Bearish,
        SentimentCategory::Neutral,
        SentimentCategory::Bullish,
        SentimentCategory::StrongBullish,
    ];

    /// Signed distance from neutral, -2..=2
    pub fn level(&self) -> i8 {
        match self {
            SentimentCategory::StrongBearish => -2,
            SentimentCategory::Bearish => -1,
            SentimentCategory::Neutral => 0,
            SentimentCategory::Bullish => 1,
            SentimentCategory::StrongBullish => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::StrongBearish => "strong_bearish",
            SentimentCategory::Bearish => "bearish",
            SentimentCategory::Neutral => "neutral",
            SentimentCategory::Bullish => "bullish",
            SentimentCategory::StrongBullish => "strong_bullish",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Recommendation {
    /// Inverse of `level`; values outside -2..=2 saturate
    pub fn from_level(level: i8) -> Self {
        match level {
            i8::MIN..=-2 => Recommendation::StrongSell,
            -1 => Recommendation::Sell,
            0 => Recommendation::Hold,
            1 => Recommendation::Buy,
            _ => Recommendation::StrongBuy,
        }
    }

    pub fn level(&self) -> i8 {
        match self {
            Recommendation::StrongSell => -2,
            Recommendation::Sell => -1,
            Recommendation::Hold => 0,
            Recommendation::Buy => 1,
            Recommendation::StrongBuy => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongSell => "strong_sell",
            Recommendation::Sell => "sell",
            Recommendation::Hold => "hold",
            Recommendation::Buy => "buy",
            Recommendation::StrongBuy => "strong_buy",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityExpectation {
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    SentimentDivergence,
    TimingDisagreement,
    ImpactDisagreement,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::SentimentDivergence => "sentiment_divergence",
            ConflictKind::TimingDisagreement => "timing_disagreement",
            ConflictKind::ImpactDisagreement => "impact_disagreement",
        }
    }

    /// Human-readable label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            ConflictKind::SentimentDivergence => "sentiment divergence",
            ConflictKind::TimingDisagreement => "timing disagreement",
            ConflictKind::ImpactDisagreement => "impact disagreement",
        }
    }
}

/// Which reweighting rules fired for an article
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightingProfile {
    Confidence,
    EarningsFocused,
    UncertaintyHigh,
    EarningsUncertainty,
}

//
// ================= Article =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub article_id: String,
    pub headline: String,
    pub content: String,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl NewsArticle {
    pub fn validate(&self) -> Result<()> {
        if self.article_id.trim().is_empty() {
            return Err(AnalysisError::Validation("article_id is empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(AnalysisError::Validation(format!(
                "article {} has no content",
                self.article_id
            )));
        }
        Ok(())
    }

    /// Headline and body as one block of text
    pub fn full_text(&self) -> String {
        format!("{}\n\n{}", self.headline, self.content)
    }
}

//
// ================= Opinion =================
//

/// One role's structured judgment about one article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpinionRecord {
    pub role: AnalystRole,
    pub sentiment_score: f64,
    pub impact_level: ImpactLevel,
    pub time_horizon: TimeHorizon,
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub primary_factors: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
}

impl OpinionRecord {
    /// Contract check. A failing record is discarded, never coerced.
    pub fn validate(&self) -> Result<()> {
        if !self.sentiment_score.is_finite() || !(-1.0..=1.0).contains(&self.sentiment_score) {
            return Err(AnalysisError::Validation(format!(
                "{}: sentiment_score {} outside [-1, 1]",
                self.role, self.sentiment_score
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(AnalysisError::Validation(format!(
                "{}: confidence {} outside [0, 1]",
                self.role, self.confidence
            )));
        }
        if self.rationale.trim().is_empty() {
            return Err(AnalysisError::Validation(format!(
                "{}: rationale is empty",
                self.role
            )));
        }
        if self.primary_factors.len() > MAX_PRIMARY_FACTORS {
            return Err(AnalysisError::Validation(format!(
                "{}: {} primary factors (max {})",
                self.role,
                self.primary_factors.len(),
                MAX_PRIMARY_FACTORS
            )));
        }
        Ok(())
    }
}

//
// ================= Consensus =================
//

/// A detected disagreement among opinions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub roles: Vec<AnalystRole>,
    pub description: String,
    pub implication: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoleWeight {
    pub role: AnalystRole,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PairAgreement {
    pub first: AnalystRole,
    pub second: AnalystRole,
    pub agreement: f64,
}

/// Merged judgment for one article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusResult {
    pub article_id: String,
    pub contributing_roles: Vec<AnalystRole>,
    pub weighting_profile: WeightingProfile,
    pub weights: Vec<RoleWeight>,
    pub overall_sentiment_score: f64,
    pub overall_sentiment_category: SentimentCategory,
    pub market_impact: ImpactLevel,
    pub recommendation: Recommendation,
    pub decision_confidence: f64,
    pub agreement_score: f64,
    pub agreement_matrix: Vec<PairAgreement>,
    pub conflicts: Vec<Conflict>,
    pub volatility_expectation: VolatilityExpectation,
    pub unified_factors: Vec<String>,
    pub key_risks: Vec<String>,
    pub key_opportunities: Vec<String>,
    pub executive_summary: String,
    pub detailed_rationale: String,
    /// Short flags a reader should not miss (clear signal, high uncertainty)
    #[serde(default)]
    pub notable_insights: Vec<String>,
}

impl ConsensusResult {
    pub fn weight_of(&self, role: AnalystRole) -> Option<f64> {
        self.weights.iter().find(|w| w.role == role).map(|w| w.weight)
    }
}

//
// ================= Per-Article Output =================
//

/// What one role produced for one article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RoleOutcome {
    Completed(OpinionRecord),
    Failed(AgentFailure),
}

impl RoleOutcome {
    pub fn role(&self) -> AnalystRole {
        match self {
            RoleOutcome::Completed(opinion) => opinion.role,
            RoleOutcome::Failed(failure) => failure.role,
        }
    }

    pub fn opinion(&self) -> Option<&OpinionRecord> {
        match self {
            RoleOutcome::Completed(opinion) => Some(opinion),
            RoleOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleReport {
    pub article_id: String,
    pub headline: String,
    pub content_hash: String,
    /// One entry per role, in `AnalystRole::ALL` order
    pub roles: Vec<RoleOutcome>,
    pub consensus: Option<ConsensusResult>,
    pub failure: Option<String>,
    pub processing_time_ms: u64,
}

impl ArticleReport {
    pub fn opinions(&self) -> Vec<&OpinionRecord> {
        self.roles.iter().filter_map(RoleOutcome::opinion).collect()
    }

    pub fn failed_roles(&self) -> Vec<&AgentFailure> {
        self.roles
            .iter()
            .filter_map(|outcome| match outcome {
                RoleOutcome::Failed(failure) => Some(failure),
                RoleOutcome::Completed(_) => None,
            })
            .collect()
    }

    pub fn succeeded(&self) -> bool {
        self.consensus.is_some()
    }
}

//
// ================= Display =================
//

impl fmt::Display for AnalystRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCause;

    fn opinion(score: f64, confidence: f64) -> OpinionRecord {
        OpinionRecord {
            role: AnalystRole::Sentiment,
            sentiment_score: score,
            impact_level: ImpactLevel::Moderate,
            time_horizon: TimeHorizon::ShortTerm,
            confidence,
            rationale: "Headline tone is upbeat".to_string(),
            primary_factors: vec![],
            risk_factors: vec![],
            opportunities: vec![],
        }
    }

    #[test]
    fn test_opinion_validation_ranges() {
        assert!(opinion(0.4, 0.8).validate().is_ok());
        assert!(opinion(-1.0, 0.0).validate().is_ok());
        assert!(opinion(1.2, 0.8).validate().is_err());
        assert!(opinion(0.4, 1.5).validate().is_err());
        assert!(opinion(f64::NAN, 0.5).validate().is_err());
    }

    #[test]
    fn test_opinion_validation_rejects_empty_rationale() {
        let mut record = opinion(0.1, 0.5);
        record.rationale = "   ".to_string();
        assert!(matches!(record.validate(), Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn test_impact_ordering() {
        assert!(ImpactLevel::VeryHigh > ImpactLevel::High);
        assert!(ImpactLevel::High > ImpactLevel::Moderate);
        assert!(ImpactLevel::Moderate > ImpactLevel::Low);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&AnalystRole::MarketDynamics).unwrap(),
            "\"market_dynamics\""
        );
        assert_eq!(serde_json::to_string(&ImpactLevel::VeryHigh).unwrap(), "\"very_high\"");
        let low: ImpactLevel = serde_json::from_str("\"negligible\"").unwrap();
        assert_eq!(low, ImpactLevel::Low);
    }

    #[test]
    fn test_role_outcome_serialization() {
        let failed = RoleOutcome::Failed(AgentFailure::new(
            AnalystRole::Fundamental,
            FailureCause::Timeout,
        ));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["detail"]["role"], "fundamental");

        let back: RoleOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, failed);
        assert_eq!(back.role(), AnalystRole::Fundamental);
        assert!(back.opinion().is_none());
    }

    #[test]
    fn test_article_validation() {
        let article = NewsArticle {
            article_id: "FIN-X".to_string(),
            headline: "Headline".to_string(),
            content: "".to_string(),
            published_at: None,
        };
        assert!(article.validate().is_err());
    }

    #[test]
    fn test_recommendation_levels() {
        for rec in [
            Recommendation::StrongSell,
            Recommendation::Sell,
            Recommendation::Hold,
            Recommendation::Buy,
            Recommendation::StrongBuy,
        ] {
            assert_eq!(Recommendation::from_level(rec.level()), rec);
        }
        assert_eq!(Recommendation::from_level(7), Recommendation::StrongBuy);
    }
}
