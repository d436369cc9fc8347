//! Analyst role invokers
//!
//! One parameterized invoker over the closed role set. The orchestrator only
//! sees the `RoleInvoker` capability, so scripted stand-ins can replace the
//! live model in tests and dry runs.

use crate::error::{AgentFailure, FailureCause};
use crate::models::{AnalystRole, NewsArticle, OpinionRecord};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

pub mod gemini;
pub mod prompts;
pub use gemini::GeminiAnalyst;

/// Produces one opinion for one (article, role), or an `AgentFailure`.
///
/// Implementations issue exactly one external call per invocation; retry
/// policy lives in the orchestrator.
#[async_trait]
pub trait RoleInvoker: Send + Sync {
    async fn invoke(
        &self,
        article: &NewsArticle,
        role: AnalystRole,
    ) -> std::result::Result<OpinionRecord, AgentFailure>;
}

/// One scripted step for a scripted invocation
#[derive(Debug, Clone)]
pub enum Script {
    Respond(OpinionRecord),
    Fail(FailureCause),
    /// Sleep, then play the inner step
    Delay(Duration, Box<Script>),
}

/// Deterministic invoker driven by per-(article, role) scripts.
///
/// Each call pops the next step; the last step repeats once the queue is
/// down to one. Unscripted pairs fail as malformed output.
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<(String, AnalystRole), VecDeque<Script>>>,
    calls: Mutex<HashMap<(String, AnalystRole), usize>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Append a step for `(article_id, role)`
    pub fn script(mut self, article_id: &str, role: AnalystRole, step: Script) -> Self {
        self.scripts
            .get_mut()
            .entry((article_id.to_string(), role))
            .or_default()
            .push_back(step);
        self
    }

    /// Respond with `opinion` for its own role
    pub fn respond(self, article_id: &str, opinion: OpinionRecord) -> Self {
        let role = opinion.role;
        self.script(article_id, role, Script::Respond(opinion))
    }

    pub fn fail(self, article_id: &str, role: AnalystRole, cause: FailureCause) -> Self {
        self.script(article_id, role, Script::Fail(cause))
    }

    /// Number of invocations seen for `(article_id, role)`
    pub async fn calls(&self, article_id: &str, role: AnalystRole) -> usize {
        let calls = self.calls.lock().await;
        calls
            .get(&(article_id.to_string(), role))
            .copied()
            .unwrap_or(0)
    }

    async fn next_step(&self, article_id: &str, role: AnalystRole) -> Option<Script> {
        let key = (article_id.to_string(), role);

        {
            let mut calls = self.calls.lock().await;
            *calls.entry(key.clone()).or_insert(0) += 1;
        }

        let mut scripts = self.scripts.lock().await;
        let queue = scripts.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        article: &NewsArticle,
        role: AnalystRole,
    ) -> std::result::Result<OpinionRecord, AgentFailure> {
        let mut step = self
            .next_step(&article.article_id, role)
            .await
            .ok_or_else(|| {
                AgentFailure::new(
                    role,
                    FailureCause::Malformed("no scripted response".to_string()),
                )
            })?;

        loop {
            match step {
                Script::Respond(opinion) => return Ok(opinion),
                Script::Fail(cause) => return Err(AgentFailure::new(role, cause)),
                Script::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    step = *inner;
                }
            }
        }
    }
}
