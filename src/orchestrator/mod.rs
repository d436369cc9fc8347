//! Batch orchestrator
//!
//! ARTICLE → FAN-OUT (3 roles) → FAN-IN → CONSENSUS → REPORT
//!
//! Roles for one article run concurrently, each attempt bounded by the call
//! timeout and the whole fan-out bounded by the article deadline. A role
//! still running at the deadline is dropped; whatever completed is kept.
//! Failures stay local to their role and article.

use crate::analysts::RoleInvoker;
use crate::config::OrchestratorConfig;
use crate::consensus::ConsensusEngine;
use crate::error::{AgentFailure, AnalysisError, FailureCause};
use crate::evaluation::Evaluator;
use crate::models::{AnalystRole, ArticleReport, NewsArticle, OpinionRecord, RoleOutcome};
use crate::report::{self, BatchReport};
use crate::Result;
use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-article fan-in buffer. Holds at most one outcome per role.
#[derive(Debug, Default)]
pub struct OpinionBuffer {
    outcomes: BTreeMap<AnalystRole, RoleOutcome>,
}

impl OpinionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the buffer unchanged, if the role already has
    /// an outcome
    pub fn accept(&mut self, outcome: RoleOutcome) -> bool {
        match self.outcomes.entry(outcome.role()) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn opinions(&self) -> Vec<OpinionRecord> {
        self.outcomes
            .values()
            .filter_map(RoleOutcome::opinion)
            .cloned()
            .collect()
    }

    /// Outcomes in role order
    pub fn into_outcomes(self) -> Vec<RoleOutcome> {
        self.outcomes.into_values().collect()
    }
}

pub struct Orchestrator {
    invoker: Arc<dyn RoleInvoker>,
    engine: ConsensusEngine,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        invoker: Arc<dyn RoleInvoker>,
        engine: ConsensusEngine,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            invoker,
            engine,
            config,
        })
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Run every article and evaluate the successful ones.
    ///
    /// Articles run up to `max_concurrent_articles` at a time; the report
    /// keeps input order. A batch where every article failed is still
    /// returned (without evaluation) so the failures can be reported.
    pub async fn run_batch(&self, articles: &[NewsArticle]) -> Result<BatchReport> {
        if articles.is_empty() {
            return Err(AnalysisError::EmptyBatch);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, articles = articles.len(), "Batch started");

        let reports: Vec<ArticleReport> = stream::iter(articles)
            .map(|article| self.analyze_article(article))
            .buffered(self.config.max_concurrent_articles)
            .collect()
            .await;

        let evaluation = match Evaluator::new(&self.engine).evaluate(&reports) {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!(%run_id, error = %e, "No article reached a consensus");
                None
            }
        };

        let batch = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            articles: reports,
            evaluation,
        };

        info!(
            %run_id,
            succeeded = batch.succeeded_count(),
            total = batch.articles.len(),
            "Batch finished"
        );

        Ok(batch)
    }

    /// Analyze one article. Never fails: problems are recorded in the report.
    pub async fn analyze_article(&self, article: &NewsArticle) -> ArticleReport {
        let started = Instant::now();
        let content_hash = report::content_hash(article);

        if let Err(e) = article.validate() {
            warn!(article_id = %article.article_id, error = %e, "Article rejected");
            return ArticleReport {
                article_id: article.article_id.clone(),
                headline: article.headline.clone(),
                content_hash,
                roles: Vec::new(),
                consensus: None,
                failure: Some(e.to_string()),
                processing_time_ms: started.elapsed().as_millis() as u64,
            };
        }

        info!(article_id = %article.article_id, "Analyzing article");

        // === FAN-OUT ===
        let deadline = tokio::time::Instant::now() + self.config.article_deadline;
        let calls = AnalystRole::ALL.into_iter().map(|role| async move {
            match tokio::time::timeout_at(deadline, self.invoke_with_retry(article, role)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        article_id = %article.article_id,
                        %role,
                        "Article deadline reached, role cancelled"
                    );
                    Err(AgentFailure::new(role, FailureCause::DeadlineExceeded))
                }
            }
        });
        let settled = join_all(calls).await;

        // === FAN-IN ===
        let mut buffer = OpinionBuffer::new();
        for outcome in settled {
            let outcome = match outcome {
                Ok(opinion) => RoleOutcome::Completed(opinion),
                Err(failure) => RoleOutcome::Failed(failure),
            };
            if !buffer.accept(outcome) {
                warn!(article_id = %article.article_id, "Duplicate role outcome discarded");
            }
        }

        // === CONSENSUS ===
        let opinions = buffer.opinions();
        let (consensus, failure) = match self.engine.synthesize(article, &opinions) {
            Ok(consensus) => (Some(consensus), None),
            Err(e) => {
                warn!(article_id = %article.article_id, error = %e, "Article failed");
                (None, Some(e.to_string()))
            }
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        if let Some(result) = &consensus {
            info!(
                article_id = %article.article_id,
                roles = opinions.len(),
                category = %result.overall_sentiment_category,
                recommendation = %result.recommendation,
                elapsed_ms = processing_time_ms,
                "Article analyzed"
            );
        }

        ArticleReport {
            article_id: article.article_id.clone(),
            headline: article.headline.clone(),
            content_hash,
            roles: buffer.into_outcomes(),
            consensus,
            failure,
            processing_time_ms,
        }
    }

    /// One role with per-attempt timeout and bounded retry on transient causes
    async fn invoke_with_retry(
        &self,
        article: &NewsArticle,
        role: AnalystRole,
    ) -> std::result::Result<OpinionRecord, AgentFailure> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            let call = self.invoker.invoke(article, role);
            let outcome = match tokio::time::timeout(self.config.call_timeout, call).await {
                Ok(result) => result.and_then(|opinion| check_opinion(role, opinion)),
                Err(_) => Err(AgentFailure::new(role, FailureCause::Timeout)),
            };

            match outcome {
                Ok(opinion) => {
                    debug!(
                        article_id = %article.article_id,
                        %role,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        score = opinion.sentiment_score,
                        "Role completed"
                    );
                    return Ok(opinion);
                }
                Err(failure)
                    if failure.cause.is_transient() && attempt <= self.config.max_retries =>
                {
                    warn!(
                        article_id = %article.article_id,
                        %role,
                        attempt,
                        cause = %failure.cause,
                        "Transient role failure, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(failure) => {
                    warn!(
                        article_id = %article.article_id,
                        %role,
                        attempt,
                        cause = %failure.cause,
                        "Role failed"
                    );
                    return Err(failure);
                }
            }
        }
    }
}

/// Contract check on whatever the invoker returned
fn check_opinion(
    role: AnalystRole,
    opinion: OpinionRecord,
) -> std::result::Result<OpinionRecord, AgentFailure> {
    if opinion.role != role {
        return Err(AgentFailure::new(
            role,
            FailureCause::Validation(format!("expected a {} opinion, got {}", role, opinion.role)),
        ));
    }
    opinion
        .validate()
        .map_err(|e| AgentFailure::new(role, e.into()))?;
    Ok(opinion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysts::{Script, ScriptedInvoker};
    use crate::models::{ImpactLevel, Recommendation, SentimentCategory, TimeHorizon};
    use std::time::Duration;

    fn article(id: &str) -> NewsArticle {
        NewsArticle {
            article_id: id.to_string(),
            headline: format!("{} headline", id),
            content: "Management outlined a new strategy for the coming year.".to_string(),
            published_at: None,
        }
    }

    fn op(role: AnalystRole, score: f64, confidence: f64) -> OpinionRecord {
        OpinionRecord {
            role,
            sentiment_score: score,
            impact_level: ImpactLevel::Moderate,
            time_horizon: TimeHorizon::ShortTerm,
            confidence,
            rationale: format!("{} take", role),
            primary_factors: vec![],
            risk_factors: vec![],
            opportunities: vec![],
        }
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            call_timeout: Duration::from_millis(500),
            article_deadline: Duration::from_secs(2),
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            max_concurrent_articles: 2,
        }
    }

    fn all_roles(invoker: ScriptedInvoker, id: &str) -> ScriptedInvoker {
        invoker
            .respond(id, op(AnalystRole::Sentiment, 0.5, 0.85))
            .respond(id, op(AnalystRole::Fundamental, -0.5, 0.85))
            .respond(id, op(AnalystRole::MarketDynamics, 0.5, 0.70))
    }

    fn orchestrator(invoker: Arc<ScriptedInvoker>, config: OrchestratorConfig) -> Orchestrator {
        Orchestrator::new(invoker, ConsensusEngine::default(), config).unwrap()
    }

    fn failure_of(report: &ArticleReport, role: AnalystRole) -> Option<FailureCause> {
        report
            .failed_roles()
            .into_iter()
            .find(|f| f.role == role)
            .map(|f| f.cause.clone())
    }

    #[test]
    fn test_buffer_accepts_one_outcome_per_role() {
        let mut buffer = OpinionBuffer::new();
        assert!(buffer.accept(RoleOutcome::Completed(op(AnalystRole::Fundamental, 0.1, 0.5))));
        assert!(!buffer.accept(RoleOutcome::Completed(op(AnalystRole::Fundamental, 0.9, 0.9))));
        assert!(!buffer.accept(RoleOutcome::Failed(AgentFailure::new(
            AnalystRole::Fundamental,
            FailureCause::Timeout
        ))));
        assert!(buffer.accept(RoleOutcome::Completed(op(AnalystRole::Sentiment, 0.2, 0.5))));

        let opinions = buffer.opinions();
        assert_eq!(opinions.len(), 2);
        assert_eq!(opinions[0].role, AnalystRole::Sentiment);
        assert_eq!(opinions[1].sentiment_score, 0.1);
    }

    #[tokio::test]
    async fn test_all_roles_succeed() {
        let invoker = Arc::new(all_roles(ScriptedInvoker::new(), "A"));
        let orch = orchestrator(invoker, test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(report.succeeded());
        assert_eq!(report.roles.len(), 3);
        assert!(report.failed_roles().is_empty());
        assert_eq!(report.content_hash.len(), 64);

        let consensus = report.consensus.unwrap();
        assert_eq!(consensus.overall_sentiment_category, SentimentCategory::Neutral);
        assert_eq!(consensus.recommendation, Recommendation::Hold);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_remaining_roles() {
        let invoker = ScriptedInvoker::new()
            .respond("A", op(AnalystRole::Sentiment, 0.4, 0.8))
            .fail("A", AnalystRole::Fundamental, FailureCause::Malformed("not json".to_string()))
            .respond("A", op(AnalystRole::MarketDynamics, 0.3, 0.7));
        let orch = orchestrator(Arc::new(invoker), test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(report.succeeded());
        assert_eq!(report.roles.len(), 3);
        assert!(matches!(
            failure_of(&report, AnalystRole::Fundamental),
            Some(FailureCause::Malformed(_))
        ));
        assert_eq!(
            report.consensus.unwrap().contributing_roles,
            vec![AnalystRole::Sentiment, AnalystRole::MarketDynamics]
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fail("A", AnalystRole::Sentiment, FailureCause::RateLimited("429".to_string()))
                .respond("A", op(AnalystRole::Sentiment, 0.5, 0.85))
                .respond("A", op(AnalystRole::Fundamental, -0.5, 0.85))
                .respond("A", op(AnalystRole::MarketDynamics, 0.5, 0.70)),
        );
        let orch = orchestrator(invoker.clone(), test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(report.failed_roles().is_empty());
        assert_eq!(report.roles.len(), 3);
        assert_eq!(invoker.calls("A", AnalystRole::Sentiment).await, 2);
        assert_eq!(invoker.calls("A", AnalystRole::Fundamental).await, 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .respond("A", op(AnalystRole::Sentiment, 0.5, 0.85))
                .respond("A", op(AnalystRole::Fundamental, 0.4, 0.85))
                .fail(
                    "A",
                    AnalystRole::MarketDynamics,
                    FailureCause::Transport("connection reset".to_string()),
                ),
        );
        let orch = orchestrator(invoker.clone(), test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(report.succeeded());
        assert!(matches!(
            failure_of(&report, AnalystRole::MarketDynamics),
            Some(FailureCause::Transport(_))
        ));
        assert_eq!(invoker.calls("A", AnalystRole::MarketDynamics).await, 2);
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .respond("A", op(AnalystRole::Sentiment, 0.5, 0.85))
                .fail("A", AnalystRole::Fundamental, FailureCause::Malformed("prose".to_string())),
        );
        let orch = orchestrator(invoker.clone(), test_config());

        orch.analyze_article(&article("A")).await;
        assert_eq!(invoker.calls("A", AnalystRole::Fundamental).await, 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let invoker = ScriptedInvoker::new()
            .respond("A", op(AnalystRole::Sentiment, 0.5, 0.85))
            .respond("A", op(AnalystRole::Fundamental, 0.3, 0.85))
            .script(
                "A",
                AnalystRole::MarketDynamics,
                Script::Delay(
                    Duration::from_millis(300),
                    Box::new(Script::Respond(op(AnalystRole::MarketDynamics, 0.5, 0.7))),
                ),
            );
        let config = OrchestratorConfig {
            call_timeout: Duration::from_millis(50),
            max_retries: 0,
            ..test_config()
        };
        let orch = orchestrator(Arc::new(invoker), config);

        let report = orch.analyze_article(&article("A")).await;
        assert_eq!(failure_of(&report, AnalystRole::MarketDynamics), Some(FailureCause::Timeout));
        assert_eq!(report.consensus.unwrap().contributing_roles.len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_cancels_outstanding_roles() {
        let invoker = ScriptedInvoker::new()
            .respond("A", op(AnalystRole::Sentiment, 0.5, 0.85))
            .respond("A", op(AnalystRole::Fundamental, 0.3, 0.85))
            .script(
                "A",
                AnalystRole::MarketDynamics,
                Script::Delay(
                    Duration::from_secs(10),
                    Box::new(Script::Respond(op(AnalystRole::MarketDynamics, 0.5, 0.7))),
                ),
            );
        let config = OrchestratorConfig {
            call_timeout: Duration::from_secs(30),
            article_deadline: Duration::from_millis(100),
            ..test_config()
        };
        let orch = orchestrator(Arc::new(invoker), config);

        let started = Instant::now();
        let report = orch.analyze_article(&article("A")).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(report.succeeded());
        assert_eq!(
            failure_of(&report, AnalystRole::MarketDynamics),
            Some(FailureCause::DeadlineExceeded)
        );
        assert_eq!(report.opinions().len(), 2);
    }

    #[tokio::test]
    async fn test_roles_run_concurrently() {
        let delayed = |role: AnalystRole, score: f64| {
            Script::Delay(
                Duration::from_millis(150),
                Box::new(Script::Respond(op(role, score, 0.8))),
            )
        };
        let invoker = ScriptedInvoker::new()
            .script("A", AnalystRole::Sentiment, delayed(AnalystRole::Sentiment, 0.4))
            .script("A", AnalystRole::Fundamental, delayed(AnalystRole::Fundamental, 0.3))
            .script("A", AnalystRole::MarketDynamics, delayed(AnalystRole::MarketDynamics, 0.35));
        let config = OrchestratorConfig {
            article_deadline: Duration::from_millis(400),
            ..test_config()
        };
        let orch = orchestrator(Arc::new(invoker), config);

        let report = orch.analyze_article(&article("A")).await;
        assert!(report.failed_roles().is_empty());
        assert_eq!(report.opinions().len(), 3);
    }

    #[tokio::test]
    async fn test_mismatched_role_is_rejected() {
        let invoker = ScriptedInvoker::new()
            .script(
                "A",
                AnalystRole::Sentiment,
                Script::Respond(op(AnalystRole::Fundamental, 0.2, 0.8)),
            )
            .respond("A", op(AnalystRole::Fundamental, 0.2, 0.8));
        let orch = orchestrator(Arc::new(invoker), test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(matches!(
            failure_of(&report, AnalystRole::Sentiment),
            Some(FailureCause::Validation(_))
        ));
        assert_eq!(report.opinions().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_opinion_is_rejected() {
        let invoker = ScriptedInvoker::new()
            .respond("A", op(AnalystRole::Sentiment, 1.4, 0.8))
            .respond("A", op(AnalystRole::Fundamental, 0.2, 0.8));
        let orch = orchestrator(Arc::new(invoker), test_config());

        let report = orch.analyze_article(&article("A")).await;
        assert!(matches!(
            failure_of(&report, AnalystRole::Sentiment),
            Some(FailureCause::Validation(_))
        ));
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_no_opinions_fails_the_article_only() {
        let invoker = all_roles(ScriptedInvoker::new(), "B");
        let orch = orchestrator(Arc::new(invoker), test_config());

        let batch = orch.run_batch(&[article("A"), article("B")]).await.unwrap();
        let failed = &batch.articles[0];
        assert!(!failed.succeeded());
        assert_eq!(failed.failed_roles().len(), 3);
        assert!(failed.failure.is_some());

        assert!(batch.articles[1].succeeded());
        assert!(batch.require_success().is_ok());
        let evaluation = batch.evaluation.unwrap();
        assert_eq!(evaluation.evaluated_articles, 1);
        assert_eq!(evaluation.failed_articles, 1);
    }

    #[tokio::test]
    async fn test_all_articles_failing_is_catastrophic() {
        let orch = orchestrator(Arc::new(ScriptedInvoker::new()), test_config());

        let batch = orch.run_batch(&[article("A"), article("B")]).await.unwrap();
        assert!(batch.evaluation.is_none());
        assert!(matches!(
            batch.require_success(),
            Err(AnalysisError::AllArticlesFailed(2))
        ));
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let slow = |role: AnalystRole| {
            Script::Delay(Duration::from_millis(120), Box::new(Script::Respond(op(role, 0.3, 0.8))))
        };
        let invoker = all_roles(ScriptedInvoker::new(), "FAST")
            .script("SLOW", AnalystRole::Sentiment, slow(AnalystRole::Sentiment))
            .script("SLOW", AnalystRole::Fundamental, slow(AnalystRole::Fundamental))
            .script("SLOW", AnalystRole::MarketDynamics, slow(AnalystRole::MarketDynamics));
        let orch = orchestrator(Arc::new(invoker), test_config());

        let batch = orch
            .run_batch(&[article("SLOW"), article("FAST")])
            .await
            .unwrap();
        let ids: Vec<&str> = batch.articles.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids, vec!["SLOW", "FAST"]);
        assert_eq!(batch.succeeded_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_article_is_rejected_without_calls() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone(), test_config());

        let mut empty = article("E");
        empty.content = "   ".to_string();
        let report = orch.analyze_article(&empty).await;

        assert!(report.roles.is_empty());
        assert!(report.failure.is_some());
        assert_eq!(invoker.calls("E", AnalystRole::Sentiment).await, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_an_error() {
        let orch = orchestrator(Arc::new(ScriptedInvoker::new()), test_config());
        assert!(matches!(orch.run_batch(&[]).await, Err(AnalysisError::EmptyBatch)));
    }
}
