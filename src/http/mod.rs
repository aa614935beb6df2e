//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace span, CORS, timeout, body limit, metrics)
//!     → security::rate_limit (API routes)
//!     → auth::AuthUser (bearer token → owner address)
//!     → auth.rs / tasks.rs / users.rs / health.rs
//!     → services (tasks, users, verification)
//!     → JSON body or {"error": ...}
//! ```

pub mod auth;
pub mod health;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod tasks;
pub mod users;

pub use request::X_REQUEST_ID;
pub use response::ApiJson;
pub use server::{AppState, HttpServer};
