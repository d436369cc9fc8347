//! Deterministic text templates for consensus output

use crate::models::{
    AnalystRole, Conflict, ImpactLevel, OpinionRecord, Recommendation, RoleWeight,
    SentimentCategory, WeightingProfile,
};

/// Agreement above which a strong category counts as a clear signal
const CLEAR_SIGNAL_AGREEMENT: f64 = 0.8;
/// Sentiment-versus-fundamental gap flagged as a major divergence
const MAJOR_DIVERGENCE_GAP: f64 = 1.0;

/// `strong_buy` → `Strong Buy`
fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn humanize(snake: &str) -> String {
    snake.replace('_', " ")
}

pub(crate) fn executive_summary(
    category: SentimentCategory,
    impact: ImpactLevel,
    recommendation: Recommendation,
    conflicts: &[Conflict],
) -> String {
    let mut summary = format!(
        "Overall {} sentiment with {} expected impact. Recommendation: {}.",
        humanize(category.as_str()),
        humanize(impact.as_str()),
        title_case(recommendation.as_str()),
    );

    if let Some(primary) = conflicts.first() {
        summary.push_str(&format!(
            " However, {} area(s) of disagreement suggest caution. Primary concern: {}.",
            conflicts.len(),
            primary.kind.label()
        ));
    }

    summary
}

pub(crate) fn detailed_rationale(
    opinions: &[&OpinionRecord],
    weights: &[RoleWeight],
    profile: WeightingProfile,
    conflicts: &[Conflict],
) -> String {
    let mut parts: Vec<String> = opinions
        .iter()
        .zip(weights)
        .map(|(opinion, weight)| {
            let basis = opinion
                .primary_factors
                .first()
                .map(|f| f.to_lowercase())
                .unwrap_or_else(|| "multiple factors".to_string());
            format!(
                "{} (weight {:.1}%): sees {:+.2} sentiment based on {}.",
                opinion.role,
                weight.weight * 100.0,
                opinion.sentiment_score,
                basis
            )
        })
        .collect();

    if conflicts.is_empty() {
        parts.push("Roles are aligned, suggesting a clear market direction.".to_string());
    } else {
        parts.push(format!(
            "Key disagreements: {}.",
            conflicts
                .iter()
                .map(|c| c.kind.label())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    parts.push(
        match profile {
            WeightingProfile::Confidence => {
                "Weighting: proportional to each role's confidence."
            }
            WeightingProfile::EarningsFocused => {
                "Weighting: fundamental emphasized because the article carries hard \
                 financial figures."
            }
            WeightingProfile::UncertaintyHigh => {
                "Weighting: market dynamics emphasized because raw sentiment diverges."
            }
            WeightingProfile::EarningsUncertainty => {
                "Weighting: fundamental and market dynamics both emphasized \
                 (hard figures, divergent sentiment)."
            }
        }
        .to_string(),
    );

    parts.join(" ")
}

/// Flags worth surfacing next to the summary, in a fixed order
pub(crate) fn notable_insights(
    category: SentimentCategory,
    agreement_score: f64,
    conflicts: &[Conflict],
    opinions: &[&OpinionRecord],
) -> Vec<String> {
    let mut insights = Vec::new();

    if agreement_score > CLEAR_SIGNAL_AGREEMENT && category.level().abs() == 2 {
        insights.push("Strong agent alignment on clear market signal".to_string());
    }

    if conflicts.len() >= 2 {
        insights.push("Multiple conflicts suggest high uncertainty".to_string());
    }

    let score_of = |role: AnalystRole| {
        opinions
            .iter()
            .find(|o| o.role == role)
            .map(|o| o.sentiment_score)
    };
    if let (Some(sentiment), Some(fundamental)) = (
        score_of(AnalystRole::Sentiment),
        score_of(AnalystRole::Fundamental),
    ) {
        if (sentiment - fundamental).abs() > MAJOR_DIVERGENCE_GAP {
            insights.push("Major sentiment/fundamentals divergence detected".to_string());
        }
    }

    insights
}
