//! Priority advice through a mock Generative Language API.

mod common;

use sdk_rust::NewTask;
use serde_json::json;

use common::{gemini_reply, spawn_server, start_mock_llm, test_config, wallet, MockLlm};

fn config_for(llm: &MockLlm) -> momentum::MomentumConfig {
    let mut config = test_config();
    config.ai.enabled = true;
    config.ai.base_url = llm.base_url.clone();
    config.ai.api_key = Some("test-key".to_string());
    config.ai.timeout_secs = 5;
    config
}

#[tokio::test]
async fn test_model_suggestion_applied() {
    let answer = json!({
        "suggestedPriority": "high",
        "tips": ["Start with the hardest part.", "Timebox it to 90 minutes."],
        "reasoning": "Tax filings carry penalties when late."
    });
    let llm = start_mock_llm(
        200,
        gemini_reply(&format!("```json\n{}\n```", answer)),
    )
    .await;
    let server = spawn_server(config_for(&llm)).await;
    let client = server.login(&wallet(1)).await;

    let task = client
        .create_task(&NewTask {
            content: "File taxes".to_string(),
            priority: Some("low".to_string()),
            ..NewTask::default()
        })
        .await
        .unwrap();

    assert_eq!(llm.hits(), 1);
    assert_eq!(task.priority, "high");
    assert_eq!(
        task.tags,
        vec![
            "personal".to_string(),
            "Start with the hardest part.".to_string(),
            "Timebox it to 90 minutes.".to_string(),
        ]
    );
    assert_eq!(
        task.ai_reasoning.as_deref(),
        Some("Tax filings carry penalties when late.")
    );
}

#[tokio::test]
async fn test_model_outage_falls_back_to_keywords() {
    let llm = start_mock_llm(500, json!({ "error": { "message": "backend unavailable" } })).await;
    let server = spawn_server(config_for(&llm)).await;
    let client = server.login(&wallet(1)).await;

    let task = client
        .create_task(&NewTask {
            content: "Urgent: fix the production outage".to_string(),
            priority: Some("low".to_string()),
            ..NewTask::default()
        })
        .await
        .unwrap();

    assert!(llm.hits() >= 1);
    assert_eq!(task.priority, "high");
    assert!(task.ai_reasoning.unwrap().contains("urgent"));
}

#[tokio::test]
async fn test_unparseable_answer_keeps_requested_priority() {
    let llm = start_mock_llm(200, gemini_reply("I think this one matters a lot!")).await;
    let server = spawn_server(config_for(&llm)).await;
    let client = server.login(&wallet(1)).await;

    let task = client
        .create_task(&NewTask {
            content: "Sort the bookshelf".to_string(),
            priority: Some("low".to_string()),
            task_type: Some("other".to_string()),
            ..NewTask::default()
        })
        .await
        .unwrap();

    assert_eq!(llm.hits(), 1);
    assert_eq!(task.priority, "low");
    assert_eq!(task.tags, vec!["other".to_string()]);
}
