//! MOM reward amounts per task type and priority.

use alloy::primitives::U256;

use crate::tasks::model::{Priority, TaskType};

/// Whole MOM tokens paid for verifying a task.
pub fn reward_amount(task_type: TaskType, priority: Priority) -> u64 {
    match (task_type, priority) {
        (TaskType::Personal, Priority::Low) => 5,
        (TaskType::Personal, Priority::Medium) => 10,
        (TaskType::Personal, Priority::High) => 15,
        (TaskType::Work, Priority::Low) => 10,
        (TaskType::Work, Priority::Medium) => 20,
        (TaskType::Work, Priority::High) => 30,
        (TaskType::Study, Priority::Low) => 8,
        (TaskType::Study, Priority::Medium) => 15,
        (TaskType::Study, Priority::High) => 25,
        (TaskType::Other, Priority::Low) => 5,
        (TaskType::Other, Priority::Medium) => 10,
        (TaskType::Other, Priority::High) => 15,
    }
}

/// Convert whole tokens to base units.
pub fn to_base_units(tokens: u64, decimals: u8) -> U256 {
    U256::from(tokens) * U256::from(10u64).pow(U256::from(decimals))
}
