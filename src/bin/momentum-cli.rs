use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "momentum-cli")]
#[command(about = "Command line client for the Momentum task API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Session token from `login`.
    #[arg(short, long, env = "MOMENTUM_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a wallet address and print the session token
    Login { wallet_address: String },
    /// List tasks
    Tasks {
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "type")]
        task_type: Option<String>,
    },
    /// Create a task
    Add {
        content: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task completed
    Complete { id: String },
    /// Verify a task on-chain (relayed unless --tx is given)
    Verify {
        id: String,
        #[arg(long)]
        tx: Option<String>,
    },
    /// Delete a task
    Delete { id: String },
    /// Show the MOM token balance
    Balance,
    /// Check service health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let res = match cli.command {
        Commands::Login { wallet_address } => {
            client
                .post(format!("{}/api/auth/login", base))
                .json(&json!({ "walletAddress": wallet_address }))
                .send()
                .await?
        }
        Commands::Tasks { status, task_type } => {
            let mut query = Vec::new();
            if let Some(status) = status {
                query.push(("status", status));
            }
            if let Some(task_type) = task_type {
                query.push(("taskType", task_type));
            }
            client
                .get(format!("{}/api/tasks", base))
                .query(&query)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Add {
            content,
            description,
            priority,
            task_type,
            due,
        } => {
            let mut body = Map::new();
            body.insert("content".into(), Value::String(content));
            for (key, value) in [
                ("description", description),
                ("priority", priority),
                ("taskType", task_type),
                ("dueDate", due),
            ] {
                if let Some(value) = value {
                    body.insert(key.into(), Value::String(value));
                }
            }
            client
                .post(format!("{}/api/tasks", base))
                .json(&Value::Object(body))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Complete { id } => {
            client
                .post(format!("{}/api/tasks/{}/complete", base, id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Verify { id, tx } => {
            let body = match tx {
                Some(tx) => json!({ "txHash": tx }),
                None => json!({}),
            };
            client
                .post(format!("{}/api/tasks/{}/verify", base, id))
                .json(&body)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Delete { id } => {
            client
                .delete(format!("{}/api/tasks/{}", base, id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Balance => {
            client
                .get(format!("{}/api/users/me/balance", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
