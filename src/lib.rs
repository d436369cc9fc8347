//! News Consensus
//!
//! Three analyst roles read each financial news article from separate
//! frames (sentiment, fundamentals, market dynamics). Their opinions are
//! merged by a deterministic consensus engine and scored across the batch.
//!
//! ARTICLE → ANALYSTS (concurrent) → CONSENSUS → EVALUATION → REPORT

pub mod analysts;
pub mod articles;
pub mod config;
pub mod consensus;
pub mod error;
pub mod evaluation;
pub mod gemini;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod signals;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use analysts::{RoleInvoker, ScriptedInvoker};
pub use consensus::ConsensusEngine;
pub use evaluation::{EvaluationReport, Evaluator};
pub use orchestrator::Orchestrator;
pub use report::BatchReport;
