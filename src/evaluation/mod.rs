//! Batch evaluation
//!
//! Seven independent quality metrics over the articles that reached a
//! consensus. Failed articles are counted but never enter the statistics.
//! Everything here is pure: timings are read from the reports, not measured.

use crate::consensus::ConsensusEngine;
use crate::error::AnalysisError;
use crate::models::{
    AnalystRole, ArticleReport, ConflictKind, ConsensusResult, ImpactLevel, SentimentCategory,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// One scalar metric with its explanation and supporting numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricScore {
    pub name: String,
    pub value: f64,
    pub explanation: String,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    /// Articles with a consensus result
    pub evaluated_articles: usize,
    /// Articles reported as failed and excluded from the metrics
    pub failed_articles: usize,
    pub consensus_alignment: MetricScore,
    pub decision_confidence: MetricScore,
    pub processing_efficiency: MetricScore,
    pub disagreement_analysis: MetricScore,
    pub sentiment_stability: MetricScore,
    pub risk_detection_rate: MetricScore,
    pub agent_specialization: MetricScore,
}

impl EvaluationReport {
    pub fn metrics(&self) -> [&MetricScore; 7] {
        [
            &self.consensus_alignment,
            &self.decision_confidence,
            &self.processing_efficiency,
            &self.disagreement_analysis,
            &self.sentiment_stability,
            &self.risk_detection_rate,
            &self.agent_specialization,
        ]
    }

    /// Plain-text rendering for the command surface
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== EVALUATION REPORT ===\n");
        out.push_str(&format!(
            "Articles evaluated: {} (failed: {})\n\n",
            self.evaluated_articles, self.failed_articles
        ));

        for metric in self.metrics() {
            out.push_str(&format!("{:<24} {:>8.3}\n", metric.name, metric.value));
            out.push_str(&format!("    {}\n", metric.explanation));
        }

        out.push_str("\nSystem assessment:\n");
        for line in self.assessment() {
            out.push_str(&format!("- {}\n", line));
        }
        out
    }

    /// Short qualitative reading of the metrics
    pub fn assessment(&self) -> Vec<String> {
        let mut lines = Vec::new();

        let alignment = self.consensus_alignment.value;
        lines.push(if alignment >= 0.75 {
            format!("Roles largely agree (alignment {:.2}).", alignment)
        } else if alignment >= 0.5 {
            format!("Roles agree partially (alignment {:.2}).", alignment)
        } else {
            format!("Roles frequently diverge (alignment {:.2}).", alignment)
        });

        let specialization = self.agent_specialization.value;
        if specialization < 0.3 {
            lines.push(
                "Low specialization: roles often reach the same category; \
                 review their prompt frames."
                    .to_string(),
            );
        } else {
            lines.push(format!(
                "Roles contribute distinct perspectives (specialization {:.2}).",
                specialization
            ));
        }

        if self.decision_confidence.value < 0.5 {
            lines.push(
                "Decisions carry low confidence; treat recommendations as tentative.".to_string(),
            );
        }
        if self.failed_articles > 0 {
            lines.push(format!(
                "{} article(s) produced no consensus and were excluded.",
                self.failed_articles
            ));
        }
        lines
    }
}

pub struct Evaluator<'a> {
    engine: &'a ConsensusEngine,
}

impl<'a> Evaluator<'a> {
    /// The engine supplies the category thresholds used for role comparison
    pub fn new(engine: &'a ConsensusEngine) -> Self {
        Self { engine }
    }

    pub fn evaluate(&self, reports: &[ArticleReport]) -> Result<EvaluationReport> {
        let evaluated: Vec<(&ArticleReport, &ConsensusResult)> = reports
            .iter()
            .filter_map(|r| r.consensus.as_ref().map(|c| (r, c)))
            .collect();

        if evaluated.is_empty() {
            return Err(AnalysisError::EmptyBatch);
        }

        Ok(EvaluationReport {
            evaluated_articles: evaluated.len(),
            failed_articles: reports.len() - evaluated.len(),
            consensus_alignment: consensus_alignment(&evaluated),
            decision_confidence: decision_confidence(&evaluated),
            processing_efficiency: processing_efficiency(&evaluated),
            disagreement_analysis: disagreement_analysis(&evaluated),
            sentiment_stability: sentiment_stability(&evaluated),
            risk_detection_rate: risk_detection_rate(&evaluated),
            agent_specialization: self.agent_specialization(&evaluated),
        })
    }

    /// Fraction of role pairs, per article, that land in different
    /// categories when each role's own score is discretized.
    fn agent_specialization(
        &self,
        evaluated: &[(&ArticleReport, &ConsensusResult)],
    ) -> MetricScore {
        let mut compared = 0usize;
        let mut differing = 0usize;
        let mut per_pair: BTreeMap<String, (usize, usize)> = BTreeMap::new();

        for (report, _) in evaluated {
            let mut opinions = report.opinions();
            opinions.sort_by_key(|o| o.role);

            for (i, a) in opinions.iter().enumerate() {
                for b in &opinions[i + 1..] {
                    let differs = self.engine.categorize(a.sentiment_score)
                        != self.engine.categorize(b.sentiment_score);
                    let entry = per_pair.entry(pair_key(a.role, b.role)).or_default();
                    entry.0 += 1;
                    compared += 1;
                    if differs {
                        entry.1 += 1;
                        differing += 1;
                    }
                }
            }
        }

        let value = if compared == 0 { 0.0 } else { differing as f64 / compared as f64 };
        let pair_rates: BTreeMap<String, f64> = per_pair
            .into_iter()
            .map(|(pair, (seen, diff))| (pair, diff as f64 / seen as f64))
            .collect();

        MetricScore {
            name: "agent_specialization".to_string(),
            value,
            explanation: if compared == 0 {
                "No article had two or more roles to compare".to_string()
            } else {
                format!(
                    "{} of {} role pairs reached different sentiment categories",
                    differing, compared
                )
            },
            details: json!({
                "pairs_compared": compared,
                "differing_pairs": differing,
                "defined": compared > 0,
                "per_pair": pair_rates,
            }),
        }
    }
}

fn pair_key(a: AnalystRole, b: AnalystRole) -> String {
    format!("{}/{}", a, b)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Pearson correlation; `None` for fewer than two points or zero variance
fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx <= f64::EPSILON || vy <= f64::EPSILON {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
    })
}

fn consensus_alignment(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let scores: Vec<f64> = evaluated.iter().map(|(_, c)| c.agreement_score).collect();
    let (lo, hi) = min_max(&scores);
    let value = mean(&scores);
    let std = std_dev(&scores);

    MetricScore {
        name: "consensus_alignment".to_string(),
        value,
        explanation: format!(
            "Mean agreement of raw role scores is {:.2} (std {:.2}); 1.0 means identical scores",
            value, std
        ),
        details: json!({
            "mean": value,
            "std_dev": std,
            "min": lo,
            "max": hi,
            "per_article": evaluated
                .iter()
                .map(|(r, c)| json!({ "article_id": r.article_id, "agreement": c.agreement_score }))
                .collect::<Vec<_>>(),
        }),
    }
}

fn decision_confidence(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let confidences: Vec<f64> = evaluated.iter().map(|(_, c)| c.decision_confidence).collect();
    let alignments: Vec<f64> = evaluated.iter().map(|(_, c)| c.agreement_score).collect();
    let value = mean(&confidences);
    let (lo, hi) = min_max(&confidences);
    let corr = correlation(&confidences, &alignments);

    let explanation = match corr {
        Some(r) => format!(
            "Mean decision confidence {:.2}; correlation with alignment {:+.2}",
            value, r
        ),
        None => format!(
            "Mean decision confidence {:.2}; correlation with alignment undefined for this batch",
            value
        ),
    };

    MetricScore {
        name: "decision_confidence".to_string(),
        value,
        explanation,
        details: json!({
            "mean": value,
            "min": lo,
            "max": hi,
            "alignment_correlation": corr,
            "correlation_defined": corr.is_some(),
        }),
    }
}

fn processing_efficiency(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let times: Vec<f64> = evaluated
        .iter()
        .map(|(r, _)| r.processing_time_ms as f64)
        .collect();
    let value = mean(&times);
    let (lo, hi) = min_max(&times);

    MetricScore {
        name: "processing_efficiency".to_string(),
        value,
        explanation: format!("Mean wall-clock time per article: {:.0} ms", value),
        details: json!({
            "mean_ms": value,
            "min_ms": lo,
            "max_ms": hi,
            "total_ms": times.iter().sum::<f64>(),
        }),
    }
}

fn disagreement_analysis(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let counts: Vec<f64> = evaluated.iter().map(|(_, c)| c.conflicts.len() as f64).collect();
    let value = mean(&counts);

    let mut by_kind: BTreeMap<ConflictKind, usize> = BTreeMap::new();
    for (_, consensus) in evaluated {
        for conflict in &consensus.conflicts {
            *by_kind.entry(conflict.kind).or_default() += 1;
        }
    }

    // Ties go to the kind detected first
    let most_frequent = by_kind
        .iter()
        .fold(None, |best: Option<(ConflictKind, usize)>, (kind, count)| match best {
            Some((_, top)) if top >= *count => best,
            _ => Some((*kind, *count)),
        })
        .map(|(kind, _)| kind);

    let explanation = match most_frequent {
        Some(kind) => format!(
            "{:.2} conflicts per article on average; most frequent: {}",
            value,
            kind.label()
        ),
        None => "No conflicts detected in this batch".to_string(),
    };

    MetricScore {
        name: "disagreement_analysis".to_string(),
        value,
        explanation,
        details: json!({
            "mean_conflicts": value,
            "most_frequent_kind": most_frequent,
            "articles_with_conflicts": counts.iter().filter(|c| **c > 0.0).count(),
            "kind_counts": by_kind
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect::<BTreeMap<_, _>>(),
        }),
    }
}

fn sentiment_stability(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let mut distribution: BTreeMap<SentimentCategory, usize> = BTreeMap::new();
    for (_, consensus) in evaluated {
        *distribution.entry(consensus.overall_sentiment_category).or_default() += 1;
    }

    let used = distribution.len();
    let value = used as f64 / SentimentCategory::ALL.len() as f64;

    MetricScore {
        name: "sentiment_stability".to_string(),
        value,
        explanation: format!(
            "{} of {} sentiment categories used across the batch",
            used,
            SentimentCategory::ALL.len()
        ),
        details: json!({
            "categories_used": used,
            "distribution": SentimentCategory::ALL
                .iter()
                .map(|c| (c.as_str().to_string(), distribution.get(c).copied().unwrap_or(0)))
                .collect::<BTreeMap<_, _>>(),
        }),
    }
}

fn risk_detection_rate(evaluated: &[(&ArticleReport, &ConsensusResult)]) -> MetricScore {
    let risks: Vec<f64> = evaluated.iter().map(|(_, c)| c.key_risks.len() as f64).collect();
    let value = mean(&risks);

    let high_impact: Vec<f64> = evaluated
        .iter()
        .filter(|(_, c)| c.market_impact >= ImpactLevel::High)
        .map(|(_, c)| c.key_risks.len() as f64)
        .collect();
    let high_impact_mean = if high_impact.is_empty() {
        None
    } else {
        Some(mean(&high_impact))
    };

    let explanation = match high_impact_mean {
        Some(m) => format!(
            "{:.2} risk flags per article; {:.2} on {} high-impact article(s)",
            value,
            m,
            high_impact.len()
        ),
        None => format!("{:.2} risk flags per article; no high-impact articles", value),
    };

    MetricScore {
        name: "risk_detection_rate".to_string(),
        value,
        explanation,
        details: json!({
            "mean_risks": value,
            "high_impact_articles": high_impact.len(),
            "high_impact_mean_risks": high_impact_mean,
        }),
    }
}
