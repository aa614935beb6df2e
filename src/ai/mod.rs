//! Priority advisor subsystem.
//!
//! # Responsibilities
//! - Suggest a priority, productivity tips and a short reasoning for a task
//! - Call the Google Generative Language API when a key is configured
//! - Fall back to deterministic keyword rules when the model is unavailable
//!
//! # Design Decisions
//! - Advisors sit behind the [`PriorityAdvisor`] trait so the HTTP-backed
//!   model can be swapped for a mock in tests
//! - Analysis never fails task creation; the caller treats an error as
//!   "no suggestion"

pub mod fallback;
pub mod gemini;
pub mod keyword;

pub use fallback::FallbackAdvisor;
pub use gemini::GeminiAdvisor;
pub use keyword::KeywordAdvisor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AiConfig;
use crate::tasks::model::Priority;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Advisor request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Advisor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Advisor response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// The fields of a task an advisor looks at.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub content: String,
    pub description: String,
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
}

/// An advisor's verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub suggested_priority: Option<Priority>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[async_trait]
pub trait PriorityAdvisor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn analyze(&self, task: &TaskDraft) -> Result<TaskAnalysis, AiError>;
}

/// Build the advisor chain for a configuration.
pub fn build_advisor(config: &AiConfig) -> Arc<dyn PriorityAdvisor> {
    let api_key = match (&config.api_key, config.enabled) {
        (Some(key), true) => key.clone(),
        _ => {
            tracing::info!("AI advisor disabled or no API key; using keyword rules");
            return Arc::new(KeywordAdvisor::new());
        }
    };

    match GeminiAdvisor::new(config, api_key) {
        Ok(gemini) => {
            tracing::info!(model = %config.model, "Using Gemini priority advisor");
            Arc::new(FallbackAdvisor::new(Arc::new(gemini), KeywordAdvisor::new()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Gemini client; using keyword rules");
            Arc::new(KeywordAdvisor::new())
        }
    }
}
