//! Task content hashing.
//!
//! The hash is keccak256 over the UTF-8 concatenation
//! `content ‖ description ‖ createdAt ‖ userAddress`, with `createdAt` in
//! millisecond ISO-8601 form and the address as lowercase `0x` hex. Browser
//! wallets compute the same digest before sending `createTask`.

use alloy::hex;
use alloy::primitives::{keccak256, Address, B256};
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::tasks::model::{timestamp, Task};

/// The exact string that is hashed.
pub fn hash_preimage(
    content: &str,
    description: &str,
    created_at: &DateTime<Utc>,
    owner: &Address,
) -> String {
    format!(
        "{}{}{}{}",
        content,
        description,
        timestamp::format(created_at),
        hex::encode_prefixed(owner)
    )
}

/// Compute the hash for a task's identifying fields.
pub fn compute_task_hash(
    content: &str,
    description: &str,
    created_at: &DateTime<Utc>,
    owner: &Address,
) -> AppResult<B256> {
    if content.is_empty() {
        return Err(AppError::Validation("Task data is incomplete".to_string()));
    }
    Ok(keccak256(hash_preimage(content, description, created_at, owner).as_bytes()))
}

/// Hash of a stored task recomputed from its fields.
pub fn task_hash_of(task: &Task) -> AppResult<B256> {
    compute_task_hash(&task.content, &task.description, &task.created_at, &task.user_address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap() + chrono::Duration::milliseconds(250)
    }

    fn owner() -> Address {
        "0xAbCdEf0123456789abcdef0123456789ABCDEF01".parse().unwrap()
    }

    #[test]
    fn test_preimage_shape() {
        let preimage = hash_preimage("Buy milk", "2 liters", &created_at(), &owner());
        assert_eq!(
            preimage,
            "Buy milk2 liters2024-01-15T09:30:00.250Z0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn test_hash_matches_keccak_of_preimage() {
        let hash = compute_task_hash("Buy milk", "2 liters", &created_at(), &owner()).unwrap();
        let expected = keccak256(
            "Buy milk2 liters2024-01-15T09:30:00.250Z0xabcdef0123456789abcdef0123456789abcdef01",
        );
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = compute_task_hash("a", "b", &created_at(), &owner()).unwrap();
        let b = compute_task_hash("a", "b", &created_at(), &owner()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_sensitive_to_each_field() {
        let base = compute_task_hash("a", "b", &created_at(), &owner()).unwrap();
        let later = created_at() + chrono::Duration::milliseconds(1);

        assert_ne!(base, compute_task_hash("a2", "b", &created_at(), &owner()).unwrap());
        assert_ne!(base, compute_task_hash("a", "b2", &created_at(), &owner()).unwrap());
        assert_ne!(base, compute_task_hash("a", "b", &later, &owner()).unwrap());
        assert_ne!(
            base,
            compute_task_hash("a", "b", &created_at(), &Address::repeat_byte(1)).unwrap()
        );
    }

    #[test]
    fn test_empty_content_rejected() {
        let err = compute_task_hash("", "desc", &created_at(), &owner()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
