use async_trait::async_trait;
use std::sync::Arc;

use crate::ai::{AiError, KeywordAdvisor, PriorityAdvisor, TaskAnalysis, TaskDraft};

/// Primary advisor with keyword rules behind it.
pub struct FallbackAdvisor {
    primary: Arc<dyn PriorityAdvisor>,
    fallback: KeywordAdvisor,
}

impl FallbackAdvisor {
    pub fn new(primary: Arc<dyn PriorityAdvisor>, fallback: KeywordAdvisor) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PriorityAdvisor for FallbackAdvisor {
    fn name(&self) -> &'static str {
        "gemini+keyword"
    }

    async fn analyze(&self, task: &TaskDraft) -> Result<TaskAnalysis, AiError> {
        match self.primary.analyze(task).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                tracing::warn!(
                    advisor = self.primary.name(),
                    error = %e,
                    "Priority advisor failed, using keyword rules"
                );
                self.fallback.analyze(task).await
            }
        }
    }
}
