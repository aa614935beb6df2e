//! Google Generative Language API advisor.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::ai::{AiError, PriorityAdvisor, TaskAnalysis, TaskDraft};
use crate::config::AiConfig;
use crate::tasks::model::Priority;

const PROMPT_TEMPLATE: &str = r#"You are a productivity and motivation assistant that helps analyze tasks and assign priorities.

Please analyze the following task and provide:
- A suggested priority level: low, medium, or high
- Three detailed productivity tips (around 30 words each)
- A brief reasoning for your suggestion

Focus your tips on time management, focus and energy, task organization and planning, momentum and consistency.

Task: {content}
Description: {description}
Due Date: {due_date}
Current Priority: {priority}

Respond only with a JSON object of this shape:
{"suggestedPriority": "low" | "medium" | "high", "tips": ["..."], "reasoning": "..."}"#;

/// Advisor backed by a Gemini model.
pub struct GeminiAdvisor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    suggested_priority: String,
    #[serde(default)]
    tips: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

impl GeminiAdvisor {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Fill the prompt template for a task.
pub fn render_prompt(task: &TaskDraft) -> String {
    PROMPT_TEMPLATE
        .replace("{content}", &task.content)
        .replace("{description}", &task.description)
        .replace(
            "{due_date}",
            task.due_date.as_deref().unwrap_or("No due date specified"),
        )
        .replace(
            "{priority}",
            task.priority.map(|p| p.as_str()).unwrap_or("Not set"),
        )
}

/// Parse the model's text answer, tolerating markdown code fences and prose
/// around the JSON object.
pub fn parse_analysis(text: &str) -> Result<TaskAnalysis, AiError> {
    let start = text
        .find('{')
        .ok_or_else(|| AiError::InvalidResponse("no JSON object in answer".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| AiError::InvalidResponse("unterminated JSON object".to_string()))?;

    let raw: RawAnalysis = serde_json::from_str(&text[start..=end])
        .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

    let priority = match raw.suggested_priority.trim().to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        other => {
            return Err(AiError::InvalidResponse(format!(
                "unknown priority '{}'",
                other
            )))
        }
    };

    Ok(TaskAnalysis {
        suggested_priority: Some(priority),
        tips: raw.tips.into_iter().filter(|t| !t.trim().is_empty()).collect(),
        reasoning: raw.reasoning,
    })
}

#[async_trait]
impl PriorityAdvisor for GeminiAdvisor {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze(&self, task: &TaskDraft) -> Result<TaskAnalysis, AiError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": render_prompt(task) }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let generated: GenerateResponse = response.json().await?;
        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        let analysis = parse_analysis(&text)?;
        tracing::debug!(
            model = %self.model,
            priority = ?analysis.suggested_priority,
            tips = analysis.tips.len(),
            "Gemini analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"suggestedPriority\":\"high\",\"tips\":[\"Start now\"],\"reasoning\":\"Due soon\"}\n```";
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.suggested_priority, Some(Priority::High));
        assert_eq!(analysis.tips, vec!["Start now".to_string()]);
        assert_eq!(analysis.reasoning, "Due soon");
    }

    #[test]
    fn test_parse_rejects_unknown_priority() {
        let text = r#"{"suggestedPriority":"critical","tips":[],"reasoning":""}"#;
        assert!(matches!(parse_analysis(text), Err(AiError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_analysis("I think this is important").is_err());
    }

    #[test]
    fn test_prompt_defaults() {
        let prompt = render_prompt(&TaskDraft {
            content: "File taxes".to_string(),
            ..TaskDraft::default()
        });
        assert!(prompt.contains("Task: File taxes"));
        assert!(prompt.contains("Due Date: No due date specified"));
        assert!(prompt.contains("Current Priority: Not set"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_errors() {
        let config = AiConfig {
            base_url: "http://127.0.0.1:1/v1".to_string(),
            timeout_secs: 1,
            ..AiConfig::default()
        };
        let advisor = GeminiAdvisor::new(&config, "key".to_string()).unwrap();
        let result = advisor.analyze(&TaskDraft::default()).await;
        assert!(matches!(result, Err(AiError::Request(_))));
    }
}
