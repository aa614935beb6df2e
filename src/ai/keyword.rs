//! Deterministic keyword and due-date rules.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::ai::{AiError, PriorityAdvisor, TaskAnalysis, TaskDraft};
use crate::tasks::model::Priority;

const HIGH_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "immediately",
    "critical",
    "emergency",
    "deadline",
    "important",
    "today",
];

const LOW_KEYWORDS: &[&str] = &[
    "someday",
    "maybe",
    "eventually",
    "optional",
    "whenever",
    "nice to have",
];

/// Due within this many days counts as urgent.
const DUE_SOON_DAYS: i64 = 2;
/// Due further out than this counts as relaxed.
const DUE_LATER_DAYS: i64 = 14;

#[derive(Debug, Clone, Default)]
pub struct KeywordAdvisor;

impl KeywordAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Analyze against a fixed "today".
    pub fn analyze_at(&self, task: &TaskDraft, today: NaiveDate) -> TaskAnalysis {
        let text = format!("{} {}", task.content, task.description).to_lowercase();
        let high_hit = HIGH_KEYWORDS.iter().find(|k| text.contains(*k));
        let low_hit = LOW_KEYWORDS.iter().find(|k| text.contains(*k));
        let days_left = task
            .due_date
            .as_deref()
            .and_then(parse_due_date)
            .map(|due| (due - today).num_days());

        let (priority, tip, reasoning) = if let Some(word) = high_hit {
            (
                Priority::High,
                "Block out the next free hour for this task and silence notifications until it is done.",
                format!("The task mentions '{}', which signals urgency.", word),
            )
        } else if let Some(days) = days_left.filter(|d| *d <= DUE_SOON_DAYS) {
            (
                Priority::High,
                "The due date is close: split the work into small steps and finish the first one today.",
                if days < 0 {
                    "The due date has already passed.".to_string()
                } else {
                    format!("The task is due in {} day(s).", days)
                },
            )
        } else if let Some(word) = low_hit {
            (
                Priority::Low,
                "Park this in a weekly review slot so it does not crowd out time-sensitive work.",
                format!("The task mentions '{}', which signals it can wait.", word),
            )
        } else if let Some(days) = days_left.filter(|d| *d > DUE_LATER_DAYS) {
            (
                Priority::Low,
                "Set a reminder a few days before the due date and keep today's focus elsewhere.",
                format!("The task is not due for {} days.", days),
            )
        } else {
            return TaskAnalysis {
                suggested_priority: None,
                tips: Vec::new(),
                reasoning: "No priority signals found; keeping the requested priority.".to_string(),
            };
        };

        TaskAnalysis {
            suggested_priority: Some(priority),
            tips: vec![tip.to_string()],
            reasoning,
        }
    }
}

/// Accepts full RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

#[async_trait]
impl PriorityAdvisor for KeywordAdvisor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn analyze(&self, task: &TaskDraft) -> Result<TaskAnalysis, AiError> {
        Ok(self.analyze_at(task, Utc::now().date_naive()))
    }
}
