use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Lifecycle of a persisted todo. Transitions are caller-driven; nothing
/// expires on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TodoStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvalidTodoStatus(other.to_string())),
        }
    }
}

/// A todo that has not been stored yet; `TodoRecord` is what comes back
/// out. `deadline` is already resolved here, `None` for unresolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTodo {
    pub owner: String,
    pub task: String,
    pub deadline: Option<NaiveDateTime>,
    pub status: TodoStatus,
}

/// Persisted form of an action item. `deadline` is `None` exactly when the
/// extracted deadline was unresolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: i64,
    pub user_id: i64,
    pub meeting_id: Option<i64>,
    pub owner: String,
    pub task: String,
    pub deadline: Option<NaiveDateTime>,
    pub status: TodoStatus,
}

/// Partial update applied to an existing todo; absent fields keep their
/// stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoUpdate {
    pub owner: Option<String>,
    pub task: Option<String>,
    pub deadline: Option<NaiveDateTime>,
    pub status: Option<TodoStatus>,
}

#[cfg(test)]
mod tests {
    use super::TodoStatus;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            TodoStatus::Pending,
            TodoStatus::InProgress,
            TodoStatus::Completed,
            TodoStatus::Cancelled,
        ] {
            let parsed: TodoStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("expired".parse::<TodoStatus>().is_err());
    }
}
