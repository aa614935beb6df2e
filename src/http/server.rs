//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all API handlers
//! - Wire up middleware (request id, tracing, metrics, limits, CORS)
//! - Bind the server to a listener and drain on shutdown

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::config::MomentumConfig;
use crate::http::middleware::track_metrics;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestSpan};
use crate::http::{auth, health, tasks, users};
use crate::lifecycle::shutdown;
use crate::security::{apply_security_headers, cors_layer, rate_limit_middleware, RateLimiterState};
use crate::storage::Store;
use crate::tasks::TaskService;
use crate::users::UserService;
use crate::verification::Verifier;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MomentumConfig>,
    pub store: Arc<Store>,
    pub tasks: Arc<TaskService>,
    pub users: Arc<UserService>,
    pub verifier: Arc<Verifier>,
    pub jwt: Arc<JwtKeys>,
    pub rate_limiter: Arc<RateLimiterState>,
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// HTTP server for the task API.
pub struct HttpServer {
    router: Router,
    config: Arc<MomentumConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &MomentumConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/api/auth/login", post(auth::login))
            .route(
                "/api/tasks",
                get(tasks::list_tasks)
                    .post(tasks::create_task)
                    .put(tasks::update_task)
                    .delete(tasks::delete_task_by_query),
            )
            .route("/api/tasks/{id}", get(tasks::get_task).delete(tasks::delete_task))
            .route("/api/tasks/{id}/complete", post(tasks::complete_task))
            .route("/api/tasks/{id}/verify", post(tasks::verify_task))
            .route("/api/tasks/{id}/chain", get(tasks::chain_status))
            .route("/api/users/me", get(users::me))
            .route(
                "/api/users/me/balance",
                get(users::balance).post(users::adjust_balance),
            )
            .layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ));

        let router = Router::new()
            .route("/health", get(health::health))
            .merge(api)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(cors_layer(&config.security));

        // Outermost first: the id must exist before the trace span reads it.
        apply_security_headers(router, &config.security).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
                .layer(propagate_request_id_layer()),
        )
    }

    /// Router with all layers, for driving the API without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::KeywordAdvisor;
    use crate::blockchain::MemoryLedger;
    use crate::lifecycle::startup::memory_relayer;
    use crate::lifecycle::{assemble, Services};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let config = MomentumConfig::default();
        let ledger = Arc::new(MemoryLedger::new(memory_relayer()));
        let app = assemble(&config, Services::in_memory(ledger, Arc::new(KeywordAdvisor::new())));
        HttpServer::new(app.state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = server()
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await["ledger"], "memory");
    }

    #[tokio::test]
    async fn test_login_then_create_task() {
        let router = server().router();

        let login = router
            .clone()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "walletAddress": format!("0x{}", "ab".repeat(20)) }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let token = body_json(login).await["token"].as_str().unwrap().to_string();

        let created = router
            .oneshot(
                Request::post("/api/tasks")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from(json!({ "content": "Plan the week" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = body_json(created).await;
        assert_eq!(body["task"]["status"], "to-do");
        assert_eq!(body["task"]["taskType"], "personal");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_with_error_body() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{nope"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = server()
            .router()
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
