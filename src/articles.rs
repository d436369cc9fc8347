//! Article sources: the built-in sample set or a JSON file

use crate::error::AnalysisError;
use crate::models::NewsArticle;
use crate::Result;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn article(id: &str, published_at: &str, headline: &str, content: &str) -> NewsArticle {
    NewsArticle {
        article_id: id.to_string(),
        headline: headline.to_string(),
        content: content.to_string(),
        published_at: Some(published_at.to_string()),
    }
}

/// Five sample articles, each built around a tension between the headline
/// and the details
pub fn default_articles() -> Vec<NewsArticle> {
    vec![
        article(
            "FIN-001",
            "2024-10-22T16:00:00Z",
            "Tesla crushes Q3 expectations with record profits, but Musk warns of 'turbulent \
             times'",
            "Tesla (NASDAQ: TSLA) reported stunning Q3 results with earnings of $1.05 per share, \
             beating analyst expectations of $0.73. Revenue surged 23% year-over-year to $25.2 \
             billion, driven by record vehicle deliveries and improving margins. However, CEO Elon \
             Musk tempered enthusiasm during the earnings call, warning of 'turbulent times ahead' \
             and 'storm clouds gathering' for the global economy. He specifically mentioned supply \
             chain pressures and potential demand softening in key markets. The stock initially \
             surged 8% in after-hours trading before pulling back to +2% as investors digested \
             Musk's cautionary comments.",
        ),
        article(
            "FIN-002",
            "2024-11-01T14:30:00Z",
            "Small biotech CureGen soars on FDA approval, analysts remain skeptical",
            "CureGen (NASDAQ: CURE), a small-cap biotech, received FDA approval for its novel \
             cancer treatment CG-401, sending shares up 187% in pre-market trading. The drug \
             showed promising results in Phase 3 trials with 73% efficacy rate. However, leading \
             analysts from Goldman Sachs and Morgan Stanley issued cautionary notes, citing \
             commercialization challenges and competition from established players. 'While the \
             approval is positive, CureGen lacks the infrastructure to capitalize effectively,' \
             noted Goldman's biotech team. The company has just $47 million in cash reserves and \
             no existing sales force.",
        ),
        article(
            "FIN-003",
            "2024-09-15T09:00:00Z",
            "Amazon announces 'transformational' AI venture, but at massive cost",
            "Amazon (NASDAQ: AMZN) unveiled Project Olympus, a $50 billion investment in AGI \
             development over the next 5 years, calling it 'the most ambitious technical \
             undertaking in human history.' CEO Andy Jassy described it as essential for Amazon's \
             future, projecting it could add $500 billion to company value by 2030. However, the \
             massive upfront investment spooked investors, with shares falling 7% as analysts \
             worried about near-term margin pressure. CFO Brian Olsavsky acknowledged the project \
             would reduce operating margins by 200-300 basis points annually through 2028. Several \
             analysts downgraded the stock citing execution risk.",
        ),
        article(
            "FIN-004",
            "2024-10-12T10:30:00Z",
            "Regional bank FirstState posts record earnings amid industry turmoil",
            "FirstState Bank (NYSE: FSB) reported record Q2 earnings of $3.20 per share, up 45% \
             year-over-year, defying the regional banking crisis narrative. Net interest margins \
             expanded to 4.2% while credit losses remained near historic lows at 0.3%. CEO \
             Patricia Chen attributed success to conservative underwriting and limited commercial \
             real estate exposure. 'We've been preparing for this environment for years,' Chen \
             stated. However, the broader regional banking index remains down 30% year-to-date, \
             and analysts warn that FirstState's small size ($15B assets) could make it an \
             acquisition target as sector consolidation accelerates.",
        ),
        article(
            "FIN-005",
            "2024-11-21T18:45:00Z",
            "China tech giant ByteDance reports stellar growth, regulatory clouds remain",
            "ByteDance, TikTok's parent company, leaked financials show revenue grew 70% to $120 \
             billion in 2023, with operating margins exceeding 25%. The figures, first reported by \
             Bloomberg, suggest TikTok's monetization is accelerating faster than Meta or YouTube \
             at similar stages. However, regulatory pressures continue mounting with potential \
             U.S. ban legislation advancing in Congress and new EU data privacy rules taking \
             effect. India's continued ban has already cost ByteDance an estimated $6 billion \
             annually. Investment banks value the company between $250-300 billion despite the \
             regulatory overhang, suggesting massive upside if political risks resolve.",
        ),
    ]
}

/// Load a JSON array of articles. Article ids must be unique.
pub fn load_articles(path: impl AsRef<Path>) -> Result<Vec<NewsArticle>> {
    let reader = BufReader::new(File::open(path)?);
    let articles: Vec<NewsArticle> = serde_json::from_reader(reader)?;

    let mut seen = HashSet::new();
    for article in &articles {
        if !seen.insert(article.article_id.as_str()) {
            return Err(AnalysisError::Validation(format!(
                "duplicate article id {}",
                article.article_id
            )));
        }
    }

    Ok(articles)
}

/// Narrow a batch to one article by id
pub fn select_article(articles: Vec<NewsArticle>, article_id: &str) -> Result<Vec<NewsArticle>> {
    articles
        .into_iter()
        .find(|a| a.article_id == article_id)
        .map(|a| vec![a])
        .ok_or_else(|| AnalysisError::Validation(format!("article {} not found", article_id)))
}
