use clap::Parser;
use news_consensus::{
    analysts::GeminiAnalyst,
    articles,
    config::{AnalyzerConfig, ConsensusConfig},
    consensus::ConsensusEngine,
    models::{ArticleReport, RoleOutcome},
    orchestrator::Orchestrator,
    report::{self, BatchReport},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Multi-analyst consensus over financial news articles
#[derive(Parser, Debug)]
#[command(name = "news_consensus", version)]
struct Args {
    /// JSON file with an array of articles (defaults to the built-in samples)
    #[arg(long)]
    articles: Option<PathBuf>,

    /// Analyze only this article id
    #[arg(long)]
    article_id: Option<String>,

    /// Where to write the batch report
    #[arg(long, default_value = "analysis_results.json")]
    output: PathBuf,

    /// Articles processed at the same time
    #[arg(long)]
    max_concurrent: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AnalyzerConfig::from_env()?;
    if let Some(n) = args.max_concurrent {
        config.orchestrator.max_concurrent_articles = n;
    }

    let mut batch = match &args.articles {
        Some(path) => articles::load_articles(path)?,
        None => articles::default_articles(),
    };
    if let Some(id) = &args.article_id {
        batch = articles::select_article(batch, id)?;
    }

    let analyst = GeminiAnalyst::new(config.require_api_key()?.to_string(), &config.gemini_model)?;
    let engine = ConsensusEngine::new(ConsensusConfig::default())?;
    let orchestrator = Orchestrator::new(Arc::new(analyst), engine, config.orchestrator.clone())?;

    info!(
        articles = batch.len(),
        model = %config.gemini_model,
        "News consensus starting"
    );

    let result = orchestrator.run_batch(&batch).await?;

    for article in &result.articles {
        print_article(article);
    }
    if let Some(evaluation) = &result.evaluation {
        println!("\n{}", evaluation.render());
    }

    report::write_report(&result, &args.output)?;
    info!(path = %args.output.display(), run_id = %result.run_id, "Report written");

    finish(&result)
}

fn print_article(article: &ArticleReport) {
    println!("\n=== {} ===", article.article_id);
    println!("{}", article.headline);

    for outcome in &article.roles {
        match outcome {
            RoleOutcome::Completed(opinion) => println!(
                "  {:<16} {:+.2} (confidence {:.2}, {} impact, {})",
                opinion.role,
                opinion.sentiment_score,
                opinion.confidence,
                opinion.impact_level,
                opinion.time_horizon
            ),
            RoleOutcome::Failed(failure) => {
                println!("  {:<16} FAILED: {}", failure.role, failure.cause)
            }
        }
    }

    match (&article.consensus, &article.failure) {
        (Some(consensus), _) => {
            println!(
                "  Consensus: {} ({:+.2}), {} impact, recommendation {}, confidence {:.2}",
                consensus.overall_sentiment_category,
                consensus.overall_sentiment_score,
                consensus.market_impact,
                consensus.recommendation,
                consensus.decision_confidence
            );
            println!("  {}", consensus.executive_summary);
            for insight in &consensus.notable_insights {
                println!("  * {}", insight);
            }
        }
        (None, Some(reason)) => println!("  No consensus: {}", reason),
        (None, None) => println!("  No consensus"),
    }
    println!("  Processing time: {} ms", article.processing_time_ms);
}

fn finish(result: &BatchReport) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = result.require_success() {
        error!(error = %e, "Batch failed");
        return Err(Box::new(e));
    }
    Ok(())
}
