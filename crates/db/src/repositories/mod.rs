use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use minuteman_core::{MeetingRecord, NewTodo, TodoRecord, TodoUpdate};

pub mod meeting;
pub mod memory;
pub mod preference;
pub mod todo;
pub mod user;

pub use meeting::SqlMeetingRepository;
pub use memory::{
    InMemoryMeetingRepository, InMemoryPreferenceRepository, InMemoryTodoRepository,
    InMemoryUserRepository,
};
pub use preference::SqlPreferenceRepository;
pub use todo::SqlTodoRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeetingSummary {
    pub id: i64,
    pub subject: String,
    pub start_time: NaiveDateTime,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, password_hash: &str) -> Result<i64, RepositoryError>;
    async fn find_by_username(&self, username: &str)
        -> Result<Option<UserAccount>, RepositoryError>;
    async fn verify(&self, username: &str, password_hash: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    /// Persist a meeting with all of its children in one transaction:
    /// everything lands or nothing does.
    async fn save_record(&self, record: &MeetingRecord) -> Result<i64, RepositoryError>;
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<MeetingSummary>, RepositoryError>;
    async fn load_record(
        &self,
        meeting_id: i64,
        user_id: i64,
    ) -> Result<Option<MeetingRecord>, RepositoryError>;
}

#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TodoRecord>, RepositoryError>;
    /// Batch-insert todos for a user, optionally tied to a meeting, in one
    /// transaction. Returns the new ids in input order.
    async fn insert_many(
        &self,
        user_id: i64,
        meeting_id: Option<i64>,
        todos: &[NewTodo],
    ) -> Result<Vec<i64>, RepositoryError>;
    /// Apply the provided fields to an existing todo. Returns `false` when
    /// the id does not exist.
    async fn update(&self, todo_id: i64, update: &TodoUpdate) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Insert or overwrite the single active value for (user, category).
    /// Backed by a uniqueness constraint so concurrent reconciliation for
    /// the same key can never produce two rows.
    async fn upsert(&self, user_id: i64, category: &str, value: &str)
        -> Result<(), RepositoryError>;
    async fn map_for_user(&self, user_id: i64) -> Result<BTreeMap<String, String>, RepositoryError>;
}
