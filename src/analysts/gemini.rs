//! Gemini-powered analyst
//!
//! One client, three roles: the role only changes the system prompt.

use crate::analysts::{prompts, RoleInvoker};
use crate::error::{AgentFailure, AnalysisError, FailureCause};
use crate::gemini::GeminiClient;
use crate::models::{AnalystRole, ImpactLevel, NewsArticle, OpinionRecord, TimeHorizon};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct GeminiAnalyst {
    client: GeminiClient,
}

impl GeminiAnalyst {
    pub fn new(api_key: String, model: &str) -> crate::Result<Self> {
        Ok(Self {
            client: GeminiClient::new(api_key, model)?,
        })
    }
}

#[async_trait]
impl RoleInvoker for GeminiAnalyst {
    async fn invoke(
        &self,
        article: &NewsArticle,
        role: AnalystRole,
    ) -> std::result::Result<OpinionRecord, AgentFailure> {
        let system = prompts::system_prompt(role);
        let prompt = prompts::article_prompt(article);

        let response = self
            .client
            .generate_json(&system, &prompt)
            .await
            .map_err(|e| AgentFailure::new(role, e.into()))?;

        debug!(
            article_id = %article.article_id,
            %role,
            bytes = response.len(),
            "Analyst response received"
        );

        parse_opinion(&response, role).map_err(|e| {
            warn!(article_id = %article.article_id, %role, error = %e, "Rejected analyst output");
            AgentFailure::new(role, e.into())
        })
    }
}

/// Wire shape of a model answer. The role is never taken from the model.
#[derive(Debug, Deserialize)]
struct RawOpinion {
    sentiment_score: f64,
    #[serde(alias = "impact_assessment")]
    impact_level: ImpactLevel,
    time_horizon: TimeHorizon,
    #[serde(alias = "confidence_level")]
    confidence: f64,
    #[serde(alias = "reasoning")]
    rationale: String,
    #[serde(default)]
    primary_factors: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
}

/// Parse and validate an opinion from model output
pub fn parse_opinion(response: &str, role: AnalystRole) -> crate::Result<OpinionRecord> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if cleaned.is_empty() {
        return Err(AnalysisError::Agent(AgentFailure::new(
            role,
            FailureCause::Malformed("empty response".to_string()),
        )));
    }

    let raw: RawOpinion = serde_json::from_str(cleaned)?;

    let opinion = OpinionRecord {
        role,
        sentiment_score: raw.sentiment_score,
        impact_level: raw.impact_level,
        time_horizon: raw.time_horizon,
        confidence: raw.confidence,
        rationale: raw.rationale,
        primary_factors: raw.primary_factors,
        risk_factors: raw.risk_factors,
        opportunities: raw.opportunities,
    };

    opinion.validate()?;
    Ok(opinion)
}
