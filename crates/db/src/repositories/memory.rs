//! In-memory repository implementations used by agent and CLI tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use minuteman_core::{MeetingRecord, NewTodo, TodoRecord, TodoUpdate};

use super::{
    MeetingRepository, MeetingSummary, PreferenceRepository, RepositoryError, TodoRepository,
    UserAccount, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, (i64, String)>>,
    next_id: AtomicI64,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, username: &str, password_hash: &str) -> Result<i64, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut users = self.users.write().await;
        users.insert(username.to_string(), (id, password_hash.to_string()));
        Ok(id)
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .get(username)
            .map(|(id, _)| UserAccount { id: *id, username: username.to_string() }))
    }

    async fn verify(&self, username: &str, password_hash: &str) -> Result<bool, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(username).is_some_and(|(_, stored)| stored == password_hash))
    }
}

#[derive(Default)]
pub struct InMemoryMeetingRepository {
    meetings: RwLock<HashMap<i64, MeetingRecord>>,
    next_id: AtomicI64,
}

#[async_trait::async_trait]
impl MeetingRepository for InMemoryMeetingRepository {
    async fn save_record(&self, record: &MeetingRecord) -> Result<i64, RepositoryError> {
        record
            .basic_info
            .start_time()
            .map_err(|error| RepositoryError::InvalidRecord(error.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut meetings = self.meetings.write().await;
        meetings.insert(id, record.clone());
        Ok(id)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<MeetingSummary>, RepositoryError> {
        let meetings = self.meetings.read().await;
        let mut summaries = Vec::new();
        for (id, record) in meetings.iter() {
            if record.user_id != user_id {
                continue;
            }
            let start_time = record
                .basic_info
                .start_time()
                .map_err(|error| RepositoryError::InvalidRecord(error.to_string()))?;
            summaries.push(MeetingSummary {
                id: *id,
                subject: record.basic_info.subject.clone(),
                start_time,
            });
        }
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(summaries)
    }

    async fn load_record(
        &self,
        meeting_id: i64,
        user_id: i64,
    ) -> Result<Option<MeetingRecord>, RepositoryError> {
        let meetings = self.meetings.read().await;
        Ok(meetings.get(&meeting_id).filter(|record| record.user_id == user_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTodoRepository {
    todos: RwLock<HashMap<i64, TodoRecord>>,
}

impl InMemoryTodoRepository {
    pub async fn seed(&self, todo: TodoRecord) {
        let mut todos = self.todos.write().await;
        todos.insert(todo.id, todo);
    }
}

#[async_trait::async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TodoRecord>, RepositoryError> {
        let todos = self.todos.read().await;
        let mut records: Vec<TodoRecord> =
            todos.values().filter(|todo| todo.user_id == user_id).cloned().collect();
        records.sort_by_key(|todo| todo.id);
        Ok(records)
    }

    async fn insert_many(
        &self,
        user_id: i64,
        meeting_id: Option<i64>,
        todos: &[NewTodo],
    ) -> Result<Vec<i64>, RepositoryError> {
        let mut store = self.todos.write().await;
        let mut next_id = store.keys().max().copied().unwrap_or(0) + 1;
        let mut ids = Vec::with_capacity(todos.len());

        for todo in todos {
            store.insert(
                next_id,
                TodoRecord {
                    id: next_id,
                    user_id,
                    meeting_id,
                    owner: todo.owner.clone(),
                    task: todo.task.clone(),
                    deadline: todo.deadline,
                    status: todo.status,
                },
            );
            ids.push(next_id);
            next_id += 1;
        }
        Ok(ids)
    }

    async fn update(&self, todo_id: i64, update: &TodoUpdate) -> Result<bool, RepositoryError> {
        let mut todos = self.todos.write().await;
        let Some(todo) = todos.get_mut(&todo_id) else {
            return Ok(false);
        };
        if let Some(owner) = &update.owner {
            todo.owner = owner.clone();
        }
        if let Some(task) = &update.task {
            todo.task = task.clone();
        }
        if let Some(deadline) = update.deadline {
            todo.deadline = Some(deadline);
        }
        if let Some(status) = update.status {
            todo.status = status;
        }
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    preferences: RwLock<HashMap<i64, BTreeMap<String, String>>>,
}

#[async_trait::async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn upsert(
        &self,
        user_id: i64,
        category: &str,
        value: &str,
    ) -> Result<(), RepositoryError> {
        let mut preferences = self.preferences.write().await;
        preferences
            .entry(user_id)
            .or_default()
            .insert(category.to_string(), value.to_string());
        Ok(())
    }

    async fn map_for_user(
        &self,
        user_id: i64,
    ) -> Result<BTreeMap<String, String>, RepositoryError> {
        let preferences = self.preferences.read().await;
        Ok(preferences.get(&user_id).cloned().unwrap_or_default())
    }
}
