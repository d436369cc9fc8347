//! Role prompts
//!
//! Each role gets a frame the others are told to stay out of: crowd
//! psychology, business economics, or market context and timing.

use crate::models::{AnalystRole, NewsArticle, MAX_PRIMARY_FACTORS};

struct RoleFrame {
    title: &'static str,
    mandate: &'static str,
    focus_areas: &'static [&'static str],
    excluded: &'static str,
}

const SENTIMENT_FRAME: RoleFrame = RoleFrame {
    title: "Market Sentiment Analyst",
    mandate: r#"You judge how investors will FEEL about this news in the days after it lands.
Markets can stay emotional longer than the numbers justify; headlines often move
prices before anyone reads the body."#,
    focus_areas: &[
        "Tone of the headline versus the body",
        "Confidence or hedging in management language",
        "Hype, fear and FOMO triggers",
        "Fit with or break from the prevailing narrative",
        "Likely retail versus institutional reaction",
        "Social and media amplification potential",
    ],
    excluded: "Do not estimate revenue, margins or valuation, \
               and do not assess sector rotation or regulation.",
};

const FUNDAMENTAL_FRAME: RoleFrame = RoleFrame {
    title: "Fundamental Analyst",
    mandate: r#"You judge what this news does to the BUSINESS: revenue, earnings, cash flow,
execution and competitive position. Ignore how the market is likely to feel about it."#,
    focus_areas: &[
        "Explicit financial figures (revenue, EPS, margins, cash)",
        "Recurring versus one-time impact",
        "Execution risk and management track record",
        "Competitive position and moat",
        "Capital allocation and balance sheet effects",
    ],
    excluded: "Do not speculate about investor psychology, price momentum or macro timing.",
};

const MARKET_DYNAMICS_FRAME: RoleFrame = RoleFrame {
    title: "Market Strategist",
    mandate: r#"You judge the CONTEXT and TIMING: how the current regime, sector trends,
regulation and upcoming catalysts amplify or dampen this news."#,
    focus_areas: &[
        "Market regime and risk appetite",
        "Sector momentum and rotation",
        "Regulatory and policy trajectory",
        "Positioning and crowding",
        "Catalyst timing (earnings cycle, macro events)",
        "Geopolitical and liquidity conditions",
    ],
    excluded: "Do not restate the company's financial figures \
               or read the emotional tone of the headline.",
};

fn frame(role: AnalystRole) -> &'static RoleFrame {
    match role {
        AnalystRole::Sentiment => &SENTIMENT_FRAME,
        AnalystRole::Fundamental => &FUNDAMENTAL_FRAME,
        AnalystRole::MarketDynamics => &MARKET_DYNAMICS_FRAME,
    }
}

/// System instruction for a role, including the output contract
pub fn system_prompt(role: AnalystRole) -> String {
    let frame = frame(role);

    format!(
        r#"You are a Senior {title}.

{mandate}

Your focus areas:
- {focus}

Stay in your lane: {excluded}

Return ONLY a JSON object with exactly these fields:
{{
  "sentiment_score": <number from -1.0 (very bearish) to 1.0 (very bullish)>,
  "impact_level": "low" | "moderate" | "high" | "very_high",
  "time_horizon": "immediate" | "short_term" | "medium_term" | "long_term",
  "confidence": <number from 0.0 to 1.0>,
  "rationale": "<two to four sentences from your perspective>",
  "primary_factors": ["<at most {max_factors} factors>"],
  "risk_factors": ["..."],
  "opportunities": ["..."]
}}
No markdown, no commentary outside the JSON."#,
        title = frame.title,
        mandate = frame.mandate,
        focus = frame.focus_areas.join("\n- "),
        excluded = frame.excluded,
        max_factors = MAX_PRIMARY_FACTORS,
    )
}

/// User prompt carrying the article
pub fn article_prompt(article: &NewsArticle) -> String {
    format!(
        r#"Analyze this financial news article from your specialized perspective.

ARTICLE ID: {}
PUBLISHED: {}
HEADLINE: {}

CONTENT:
{}"#,
        article.article_id,
        article.published_at.as_deref().unwrap_or("unknown"),
        article.headline,
        article.content,
    )
}
