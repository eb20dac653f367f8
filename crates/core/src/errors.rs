use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("deadline `{0}` is neither an absolute timestamp nor the unresolved sentinel")]
    InvalidDeadline(String),
    #[error("unknown todo status `{0}`")]
    InvalidTodoStatus(String),
    #[error("meeting start time `{0}` is not an ISO timestamp")]
    InvalidMeetingTime(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
