//! End-to-end HTTP tests against the in-memory ledger.

mod common;

use alloy::primitives::{Address, B256};
use reqwest::StatusCode;
use sdk_rust::NewTask;
use serde_json::{json, Value};

use common::{spawn_server, test_config, wallet};

fn plain_task(content: &str) -> NewTask {
    NewTask {
        content: content.to_string(),
        ..NewTask::default()
    }
}

#[tokio::test]
async fn test_login_and_task_crud() {
    let server = spawn_server(test_config()).await;
    let mut client = server.client();

    let login = client.login(&wallet(1)).await.unwrap();
    assert_eq!(login.user.address, wallet(1));
    assert_eq!(login.user.token_balance, 0.0);

    let created = client
        .create_task(&NewTask {
            content: "Write quarterly report".to_string(),
            task_type: Some("work".to_string()),
            priority: Some("medium".to_string()),
            ..NewTask::default()
        })
        .await
        .unwrap();
    assert_eq!(created.status, "to-do");
    assert_eq!(created.priority, "medium");
    assert_eq!(created.tags, vec!["work".to_string()]);
    assert!(!created.completed);
    assert!(!created.verified);
    assert!(created.task_hash.is_some());

    let tasks = client.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(client.get_task(&created.id).await.unwrap(), created);

    let updated = client
        .update_task(&created.id, json!({ "content": "Write annual report", "status": "in-progress" }))
        .await
        .unwrap();
    assert_eq!(updated.content, "Write annual report");
    assert_eq!(updated.status, "in-progress");

    let completed = client.complete_task(&created.id).await.unwrap();
    assert!(completed.completed);
    assert_eq!(completed.status, "completed");
    assert!(completed.completed_at.is_some());

    let done = client.list_tasks_filtered(Some("completed"), None).await.unwrap();
    assert_eq!(done.len(), 1);
    let todo = client.list_tasks_filtered(Some("to-do"), None).await.unwrap();
    assert!(todo.is_empty());

    client.delete_task(&created.id).await.unwrap();
    let err = client.get_task(&created.id).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_delete_by_query_parameter() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(1)).await;
    let task = client.create_task(&plain_task("Water plants")).await.unwrap();

    let http = reqwest::Client::new();
    let resp = http
        .delete(format!("{}/api/tasks", server.base_url))
        .query(&[("id", task.id.as_str())])
        .bearer_auth(client.token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let resp = http
        .delete(format!("{}/api/tasks", server.base_url))
        .bearer_auth(client.token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_valid_token_rejected() {
    let server = spawn_server(test_config()).await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/api/tasks", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = http
        .get(format!("{}/api/tasks", server.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_malformed_address() {
    let server = spawn_server(test_config()).await;
    let err = server.client().login("0x1234").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_tasks_are_scoped_to_owner() {
    let server = spawn_server(test_config()).await;
    let alice = server.login(&wallet(1)).await;
    let bob = server.login(&wallet(2)).await;

    let task = alice.create_task(&plain_task("Alice's errand")).await.unwrap();

    assert!(bob.list_tasks().await.unwrap().is_empty());
    assert_eq!(
        bob.get_task(&task.id).await.unwrap_err().status(),
        Some(StatusCode::NOT_FOUND)
    );
    assert_eq!(
        bob.delete_task(&task.id).await.unwrap_err().status(),
        Some(StatusCode::NOT_FOUND)
    );
    assert_eq!(
        bob.verify_task(&task.id, None, None).await.unwrap_err().status(),
        Some(StatusCode::NOT_FOUND)
    );
    assert_eq!(alice.list_tasks().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_task_hash_conflicts() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(1)).await;
    let hash = format!("0x{}", "ab".repeat(32));

    let task = NewTask {
        content: "Pay rent".to_string(),
        task_hash: Some(hash.clone()),
        ..NewTask::default()
    };
    let first = client.create_task(&task).await.unwrap();
    assert_eq!(first.task_hash.as_deref(), Some(hash.as_str()));

    let err = client.create_task(&task).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
}

#[tokio::test]
async fn test_relay_verification_pays_reward() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(1)).await;

    let task = client
        .create_task(&NewTask {
            content: "Refactor billing module".to_string(),
            task_type: Some("work".to_string()),
            priority: Some("high".to_string()),
            ..NewTask::default()
        })
        .await
        .unwrap();

    let outcome = client.verify_task(&task.id, None, None).await.unwrap();
    assert_eq!(outcome.mode, "relay");
    assert!(outcome.task.verified);
    assert!(outcome.task.completed);
    assert_eq!(outcome.task.status, "completed");
    assert!(outcome.task.tx_hash.is_some());

    let reward = outcome.reward.unwrap();
    assert_eq!(reward.amount, 30);
    assert!(reward.credited);
    assert_eq!(client.balance().await.unwrap(), 30.0);

    let hash: B256 = task.task_hash.unwrap().parse().unwrap();
    assert!(server.ledger.is_task_completed(hash));

    let chain = client.chain_status(&task.id).await.unwrap();
    assert!(chain.matches);
    assert!(chain.on_chain.exists && chain.on_chain.completed);

    let err = client.verify_task(&task.id, None, None).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(client.balance().await.unwrap(), 30.0);
}

#[tokio::test]
async fn test_client_submitted_verification() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(3)).await;
    let owner: Address = wallet(3).parse().unwrap();
    let stranger: Address = wallet(4).parse().unwrap();

    let task = client.create_task(&plain_task("Read a chapter")).await.unwrap();
    let hash: B256 = task.task_hash.clone().unwrap().parse().unwrap();

    // Completed on-chain by someone else: rejected.
    server.ledger.create_task_as(stranger, hash).unwrap();
    let foreign = server.ledger.complete_task_as(stranger, hash).unwrap();
    let err = client
        .verify_task(&task.id, Some(&foreign.tx_hash.to_string()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    // The owner's own transaction for a fresh task: accepted.
    let task = client.create_task(&plain_task("Read another chapter")).await.unwrap();
    let hash: B256 = task.task_hash.clone().unwrap().parse().unwrap();
    server.ledger.create_task_as(owner, hash).unwrap();
    let tx = server.ledger.complete_task_as(owner, hash).unwrap();

    let outcome = client
        .verify_task(&task.id, Some(&tx.tx_hash.to_string()), task.task_hash.as_deref())
        .await
        .unwrap();
    assert_eq!(outcome.mode, "client");
    assert_eq!(outcome.task.tx_hash, Some(tx.tx_hash.to_string()));
    assert_eq!(outcome.reward.unwrap().amount, 10);
}

#[tokio::test]
async fn test_verified_hash_pays_out_once() {
    let server = spawn_server(test_config()).await;
    let owner = server.login(&wallet(6)).await;
    let other = server.login(&wallet(7)).await;
    let hash = format!("0x{}", "42".repeat(32));
    let task = NewTask {
        content: "Renew passport".to_string(),
        task_hash: Some(hash.clone()),
        ..NewTask::default()
    };

    let created = owner.create_task(&task).await.unwrap();
    let outcome = owner.verify_task(&created.id, None, None).await.unwrap();
    assert_eq!(outcome.reward.unwrap().amount, 10);
    owner.delete_task(&created.id).await.unwrap();

    // Recreating the verified hash is refused for its owner and for anyone else
    let err = owner.create_task(&task).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    let err = other.create_task(&task).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    assert_eq!(owner.balance().await.unwrap(), 10.0);
    assert_eq!(other.balance().await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_hash_held_by_another_wallet_conflicts() {
    let server = spawn_server(test_config()).await;
    let alice = server.login(&wallet(1)).await;
    let bob = server.login(&wallet(2)).await;

    let task = alice.create_task(&plain_task("Book flights")).await.unwrap();
    let copy = NewTask {
        content: "Book flights".to_string(),
        task_hash: task.task_hash.clone(),
        ..NewTask::default()
    };
    let err = bob.create_task(&copy).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
}

#[tokio::test]
async fn test_relay_refuses_foreign_on_chain_record() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(8)).await;
    let stranger: Address = wallet(9).parse().unwrap();

    let task = client.create_task(&plain_task("Fix the bike")).await.unwrap();
    let hash: B256 = task.task_hash.clone().unwrap().parse().unwrap();
    server.ledger.create_task_as(stranger, hash).unwrap();
    server.ledger.complete_task_as(stranger, hash).unwrap();

    let err = client.verify_task(&task.id, None, None).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert!(!client.get_task(&task.id).await.unwrap().verified);
    assert_eq!(client.balance().await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_receipt_for_another_task_is_rejected() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(3)).await;
    let owner: Address = wallet(3).parse().unwrap();
    let stranger: Address = wallet(4).parse().unwrap();

    let task = client.create_task(&plain_task("Clean the garage")).await.unwrap();
    let hash: B256 = task.task_hash.clone().unwrap().parse().unwrap();
    server.ledger.create_task_as(stranger, hash).unwrap();
    server.ledger.complete_task_as(stranger, hash).unwrap();

    let unrelated = server
        .ledger
        .create_task_as(owner, B256::repeat_byte(0x5a))
        .unwrap();
    let err = client
        .verify_task(&task.id, Some(&unrelated.tx_hash.to_string()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(client.balance().await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_verification_rejects_hash_mismatch() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(1)).await;
    let task = client.create_task(&plain_task("Call the bank")).await.unwrap();

    let wrong = format!("0x{}", "00".repeat(32));
    let err = client
        .verify_task(&task.id, None, Some(&wrong))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert!(!client.get_task(&task.id).await.unwrap().verified);
}

#[tokio::test]
async fn test_verified_task_content_is_frozen() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(1)).await;
    let task = client.create_task(&plain_task("Submit expenses")).await.unwrap();
    client.verify_task(&task.id, None, None).await.unwrap();

    let err = client
        .update_task(&task.id, json!({ "content": "Something else" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    let err = client
        .update_task(&task.id, json!({ "completed": false }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    // Tags are not part of the hash.
    let updated = client
        .update_task(&task.id, json!({ "tags": ["finance"] }))
        .await
        .unwrap();
    assert_eq!(updated.tags, vec!["finance".to_string()]);
    assert!(updated.verified);
}

#[tokio::test]
async fn test_balance_adjustment() {
    let server = spawn_server(test_config()).await;
    let client = server.login(&wallet(5)).await;

    let user = client.adjust_balance(12.5).await.unwrap();
    assert_eq!(user.token_balance, 12.5);
    assert_eq!(client.balance().await.unwrap(), 12.5);
    assert_eq!(client.profile().await.unwrap().token_balance, 12.5);

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{}/api/users/me/balance", server.base_url))
        .bearer_auth(client.token().unwrap())
        .json(&json!({ "amount": "lots" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_health_and_request_id() {
    let server = spawn_server(test_config()).await;

    let (status, body) = server.client().health().await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ledger"], "memory");

    let http = reqwest::Client::new();
    let resp = http
        .get(format!("{}/health", server.base_url))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "trace-me");

    let resp = http
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst_size = 2;
    let server = spawn_server(config).await;

    let http = reqwest::Client::new();
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = http
            .post(format!("{}/api/auth/login", server.base_url))
            .json(&json!({ "walletAddress": wallet(1) }))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status());
    }
    assert_eq!(statuses[..2], [StatusCode::OK, StatusCode::OK]);
    assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);

    // Health is not rate limited.
    let resp = http
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
