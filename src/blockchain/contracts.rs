//! Contract ABI bindings.
//!
//! `TaskManager` records task-hash existence and completion per owner;
//! `MomToken` is the ERC20-style reward token.

use alloy::sol;

sol! {
    /// Task-hash ledger.
    interface TaskManager {
        /// Emitted when a task hash is first recorded.
        #[derive(Debug)]
        event TaskCreated(bytes32 indexed taskHash, address indexed owner);

        /// Emitted when the owner marks a task hash completed.
        #[derive(Debug)]
        event TaskCompleted(bytes32 indexed taskHash);

        function createTask(bytes32 taskHash) external;
        function completeTask(bytes32 taskHash) external;
        function verifyTask(bytes32 taskHash) external view returns (bool);
        function isTaskCompleted(bytes32 taskHash) external view returns (bool);
        function getTaskStatus(bytes32 taskHash) external view returns (bool exists, bool completed, bytes32 hash, uint256 timestamp);
    }
}

sol! {
    /// MOM reward token.
    interface MomToken {
        function rewardTo(address to, uint256 amount) external;
        function publicRewardTo(address to, uint256 amount) external;
        function balanceOf(address account) external view returns (uint256);
        function owner() external view returns (address);
    }
}

/// Revert reasons raised by `TaskManager`.
pub mod reverts {
    pub const TASK_EXISTS: &str = "Task already exists";
    pub const TASK_MISSING: &str = "Task does not exist";
    pub const TASK_COMPLETED: &str = "Task is already completed";
    pub const NOT_OWNER: &str = "Only the task owner can complete this task";
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, B256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(
            TaskManager::createTaskCall::SELECTOR,
            keccak256("createTask(bytes32)")[..4]
        );
        assert_eq!(
            TaskManager::getTaskStatusCall::SELECTOR,
            keccak256("getTaskStatus(bytes32)")[..4]
        );
        assert_eq!(
            MomToken::rewardToCall::SELECTOR,
            keccak256("rewardTo(address,uint256)")[..4]
        );
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            TaskManager::TaskCreated::SIGNATURE_HASH,
            keccak256("TaskCreated(bytes32,address)")
        );
        assert_eq!(
            TaskManager::TaskCompleted::SIGNATURE_HASH,
            keccak256("TaskCompleted(bytes32)")
        );
    }

    #[test]
    fn test_call_encoding_is_selector_plus_word() {
        let call = TaskManager::completeTaskCall { taskHash: B256::repeat_byte(0xab) };
        let data = call.abi_encode();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[4..], B256::repeat_byte(0xab).as_slice());
    }
}
