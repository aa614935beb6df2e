//! Task operations, always scoped to the calling owner.

use alloy::primitives::Address;
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::ai::{PriorityAdvisor, TaskDraft};
use crate::error::{AppError, AppResult};
use crate::observability::metrics;
use crate::storage::Store;
use crate::tasks::hash::task_hash_of;
use crate::tasks::model::{NewTask, Task, TaskFilter, TaskPatch, TaskStatus};

pub struct TaskService {
    store: Arc<Store>,
    advisor: Arc<dyn PriorityAdvisor>,
}

impl TaskService {
    pub fn new(store: Arc<Store>, advisor: Arc<dyn PriorityAdvisor>) -> Self {
        Self { store, advisor }
    }

    /// Create a task for `owner`.
    ///
    /// The advisor's suggested priority replaces the requested one and its
    /// tips are appended to the tags. When the client did not supply a task
    /// hash it is computed from the stored fields.
    pub async fn create(&self, owner: Address, input: NewTask) -> AppResult<Task> {
        if input.content.trim().is_empty() {
            return Err(AppError::Validation("Task content is required".to_string()));
        }

        let task_type = input.task_type.unwrap_or_default();
        let tags = input
            .tags
            .filter(|tags| !tags.is_empty())
            .unwrap_or_else(|| vec![task_type.as_str().to_string()]);

        let mut task = Task {
            id: Uuid::new_v4().to_string(),
            content: input.content,
            description: input.description.unwrap_or_default(),
            completed: false,
            // Hashes embed the millisecond timestamp, so store exactly that
            created_at: Utc::now().trunc_subsecs(3),
            completed_at: None,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            task_type,
            status: TaskStatus::ToDo,
            tags,
            user_address: owner,
            verified: false,
            task_hash: None,
            tx_hash: None,
            ai_reasoning: None,
        };

        let draft = TaskDraft {
            content: task.content.clone(),
            description: task.description.clone(),
            due_date: task.due_date.clone(),
            priority: input.priority,
        };
        match self.advisor.analyze(&draft).await {
            Ok(analysis) => {
                if let Some(priority) = analysis.suggested_priority {
                    task.priority = priority;
                }
                task.tags.extend(analysis.tips);
                if !analysis.reasoning.is_empty() {
                    task.ai_reasoning = Some(analysis.reasoning);
                }
            }
            Err(e) => {
                tracing::warn!(advisor = self.advisor.name(), error = %e, "Task analysis failed");
            }
        }

        task.task_hash = Some(match input.task_hash {
            Some(hash) => hash,
            None => task_hash_of(&task)?,
        });

        let task = self.store.insert_task(task)?;
        metrics::record_task_event("created");
        tracing::info!(
            task_id = %task.id,
            owner = %owner,
            priority = task.priority.as_str(),
            "Task created"
        );
        Ok(task)
    }

    pub fn list(&self, owner: &Address, filter: &TaskFilter) -> Vec<Task> {
        self.store
            .list_tasks(owner)
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    }

    pub fn get(&self, owner: &Address, id: &str) -> AppResult<Task> {
        self.store.get_task(owner, id).ok_or(AppError::NotFound("Task"))
    }

    /// Apply a partial update.
    ///
    /// Verification fields are never touched here. A verified task keeps its
    /// content, description and completed status.
    pub fn update(&self, owner: &Address, patch: TaskPatch) -> AppResult<Task> {
        if patch.id.is_empty() {
            return Err(AppError::Validation("Task ID is required".to_string()));
        }
        let now = Utc::now();
        let id = patch.id.clone();

        let task = self
            .store
            .modify_task(owner, &id, |task| -> AppResult<()> {
                let next_status = patch.status.or(patch.completed.map(|done| {
                    if done {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::ToDo
                    }
                }));

                if task.verified {
                    if patch.touches_content() {
                        return Err(AppError::Conflict(
                            "Verified task content cannot be changed".to_string(),
                        ));
                    }
                    if next_status.is_some_and(|s| s != TaskStatus::Completed) {
                        return Err(AppError::Conflict(
                            "Verified task cannot be reopened".to_string(),
                        ));
                    }
                }

                if let Some(content) = patch.content {
                    if content.trim().is_empty() {
                        return Err(AppError::Validation("Task content is required".to_string()));
                    }
                    task.content = content;
                }
                if let Some(description) = patch.description {
                    task.description = description;
                }
                if let Some(priority) = patch.priority {
                    task.priority = priority;
                }
                if let Some(due_date) = patch.due_date {
                    task.due_date = Some(due_date).filter(|d| !d.is_empty());
                }
                if let Some(task_type) = patch.task_type {
                    task.task_type = task_type;
                }
                if let Some(tags) = patch.tags {
                    task.tags = tags;
                }
                if let Some(status) = next_status {
                    task.set_status(status, now);
                }
                Ok(())
            })?
            .ok_or(AppError::NotFound("Task"))?;

        metrics::record_task_event("updated");
        tracing::debug!(task_id = %task.id, owner = %owner, "Task updated");
        Ok(task)
    }

    pub fn delete(&self, owner: &Address, id: &str) -> AppResult<()> {
        if id.is_empty() {
            return Err(AppError::Validation("Task ID is required".to_string()));
        }
        if !self.store.delete_task(owner, id) {
            return Err(AppError::NotFound("Task"));
        }
        metrics::record_task_event("deleted");
        tracing::info!(task_id = %id, owner = %owner, "Task deleted");
        Ok(())
    }

    /// Mark a task completed without touching the chain.
    pub fn complete(&self, owner: &Address, id: &str) -> AppResult<Task> {
        let now = Utc::now();
        let task = self
            .store
            .modify_task(owner, id, |task| -> AppResult<()> {
                task.set_status(TaskStatus::Completed, now);
                Ok(())
            })?
            .ok_or(AppError::NotFound("Task"))?;
        metrics::record_task_event("completed");
        Ok(task)
    }
}
