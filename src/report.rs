//! Batch report persistence
//!
//! A batch report is the one document a run produces: every article with its
//! per-role outcomes, the consensus (or failure), and the evaluation.

use crate::error::AnalysisError;
use crate::evaluation::EvaluationReport;
use crate::models::{ArticleReport, NewsArticle};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// In input order
    pub articles: Vec<ArticleReport>,
    /// Absent when no article reached a consensus
    pub evaluation: Option<EvaluationReport>,
}

impl BatchReport {
    pub fn succeeded_count(&self) -> usize {
        self.articles.iter().filter(|a| a.succeeded()).count()
    }

    /// Fails only when every article in the batch failed
    pub fn require_success(&self) -> Result<()> {
        if self.succeeded_count() == 0 {
            return Err(AnalysisError::AllArticlesFailed(self.articles.len()));
        }
        Ok(())
    }
}

pub fn write_report(report: &BatchReport, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

pub fn read_report(path: impl AsRef<Path>) -> Result<BatchReport> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// SHA-256 fingerprint of the headline and body, hex encoded
pub fn content_hash(article: &NewsArticle) -> String {
    let mut hasher = Sha256::new();

    // Stream into the hasher; the pair is serialized so field boundaries count.
    // Two strings into an infallible writer cannot fail to serialize.
    if serde_json::to_writer(
        &mut HashWriter(&mut hasher),
        &(&article.headline, &article.content),
    )
    .is_err()
    {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Lets serde write straight into a digest
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
