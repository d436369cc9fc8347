//! Text signal detectors
//!
//! Cheap, deterministic checks over article text and opinion lists:
//! - Quantitative signal: does the article carry hard financial figures?
//! - Volatility mentions: how many risk factors talk about swings/uncertainty?

use crate::models::{NewsArticle, OpinionRecord};
use lazy_static::lazy_static;
use regex::Regex;

/// Static keyword lists — zero allocation
const QUANT_KEYWORDS: &[&str] = &[
    "revenue", "earnings", "eps", "per share", "margin", "margins",
    "cash flow", "guidance", "profit", "net income", "operating income",
    "basis points", "year-over-year", "quarter",
];

const VOLATILITY_KEYWORDS: &[&str] = &["volatil", "uncertain", "swing", "fluctuat", "turbulen"];

/// Keyword hits needed when no explicit figure is present
const MIN_KEYWORD_HITS: usize = 2;

lazy_static! {
    /// `$25.2 billion`, `$1.05`, `23%`, `4.2 %`, `200-300 basis points`
    static ref FIGURE_PATTERN: Regex = Regex::new(
        r"(?i)(\$\s?\d[\d,]*(\.\d+)?)|(\d+(\.\d+)?\s?%)|(\d+(\.\d+)?\s?(billion|million|bn|mn)\b)"
    )
    .expect("figure pattern is valid");
}

/// Quantitative evidence found in an article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantitativeSignal {
    pub figure_count: usize,
    pub keyword_hits: usize,
}

impl QuantitativeSignal {
    /// Strong when a figure sits next to financial vocabulary, or the
    /// vocabulary alone is dense
    pub fn is_strong(&self) -> bool {
        (self.figure_count > 0 && self.keyword_hits > 0)
            || self.keyword_hits >= MIN_KEYWORD_HITS * 2
    }
}

/// Scan an article for explicit revenue/earnings style figures
pub fn quantitative_signal(article: &NewsArticle) -> QuantitativeSignal {
    let text = article.full_text();
    let lowered = text.to_lowercase();

    let figure_count = FIGURE_PATTERN.find_iter(&text).count();
    let keyword_hits = QUANT_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(**kw))
        .count();

    QuantitativeSignal {
        figure_count,
        keyword_hits,
    }
}

/// Count risk factors across opinions that mention volatility
pub fn volatility_mentions<'a>(opinions: impl IntoIterator<Item = &'a OpinionRecord>) -> usize {
    opinions
        .into_iter()
        .flat_map(|o| o.risk_factors.iter())
        .filter(|risk| {
            let lowered = risk.to_lowercase();
            VOLATILITY_KEYWORDS.iter().any(|kw| lowered.contains(kw))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalystRole, ImpactLevel, TimeHorizon};

    fn article(headline: &str, content: &str) -> NewsArticle {
        NewsArticle {
            article_id: "T-1".to_string(),
            headline: headline.to_string(),
            content: content.to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_earnings_article_is_quantitative() {
        let a = article(
            "Tesla beats Q3 expectations",
            "Earnings of $1.05 per share; revenue rose 23% to $25.2 billion.",
        );
        let signal = quantitative_signal(&a);
        assert!(signal.figure_count >= 3);
        assert!(signal.keyword_hits >= 2);
        assert!(signal.is_strong());
    }

    #[test]
    fn test_narrative_article_is_not_quantitative() {
        let a = article(
            "CEO hints at bold new direction",
            "Executives spoke about culture and vision at the annual retreat.",
        );
        assert!(!quantitative_signal(&a).is_strong());
    }

    #[test]
    fn test_figures_without_finance_vocabulary() {
        let a = article("Crowd of 5,000 gathers", "Attendance was up 12% on last year.");
        let signal = quantitative_signal(&a);
        assert!(signal.figure_count > 0);
        assert!(!signal.is_strong());
    }

    #[test]
    fn test_volatility_mentions() {
        let opinion = OpinionRecord {
            role: AnalystRole::MarketDynamics,
            sentiment_score: 0.0,
            impact_level: ImpactLevel::High,
            time_horizon: TimeHorizon::Immediate,
            confidence: 0.5,
            rationale: "Mixed".to_string(),
            primary_factors: vec![],
            risk_factors: vec![
                "Heightened volatility around the print".to_string(),
                "Regulatory uncertainty".to_string(),
                "Supply chain".to_string(),
            ],
            opportunities: vec![],
        };
        assert_eq!(volatility_mentions(&[opinion]), 2);
    }
}
