//! Task management.
//!
//! # Responsibilities
//! - Task records and their JSON shape (`model`)
//! - Content hashing shared with the on-chain ledger (`hash`)
//! - Owner-scoped create, list, update, delete and complete (`service`)

pub mod hash;
pub mod model;
pub mod service;

pub use hash::{compute_task_hash, task_hash_of};
pub use model::{NewTask, Priority, Task, TaskFilter, TaskPatch, TaskStatus, TaskType};
pub use service::TaskService;
