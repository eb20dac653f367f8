use chrono::NaiveDateTime;
use sqlx::Row;

use minuteman_core::{NewTodo, TodoRecord, TodoStatus, TodoUpdate};

use super::{RepositoryError, TodoRepository};
use crate::DbPool;

const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct SqlTodoRepository {
    pool: DbPool,
}

impl SqlTodoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_todo(row: &sqlx::sqlite::SqliteRow) -> Result<TodoRecord, RepositoryError> {
    let id: i64 = row.try_get("todo_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: i64 =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let meeting_id: Option<i64> =
        row.try_get("meeting_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let owner: String = row.try_get("owner").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let task: String = row.try_get("task").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deadline_raw: Option<String> =
        row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_raw: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let deadline = deadline_raw
        .map(|raw| {
            NaiveDateTime::parse_from_str(&raw, DEADLINE_FORMAT)
                .map_err(|_| RepositoryError::Decode(format!("unparseable deadline `{raw}`")))
        })
        .transpose()?;
    let status: TodoStatus =
        status_raw.parse().map_err(|_| RepositoryError::Decode(format!(
            "unknown todo status `{status_raw}`"
        )))?;

    Ok(TodoRecord { id, user_id, meeting_id, owner, task, deadline, status })
}

#[async_trait::async_trait]
impl TodoRepository for SqlTodoRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TodoRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT todo_id, user_id, meeting_id, owner, task, deadline, status
             FROM todos WHERE user_id = ? ORDER BY deadline IS NULL, deadline, todo_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_todo).collect()
    }

    async fn insert_many(
        &self,
        user_id: i64,
        meeting_id: Option<i64>,
        todos: &[NewTodo],
    ) -> Result<Vec<i64>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(todos.len());

        for todo in todos {
            let deadline = todo.deadline.map(|at| at.format(DEADLINE_FORMAT).to_string());
            let id = sqlx::query(
                "INSERT INTO todos (user_id, meeting_id, owner, task, deadline, status)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(meeting_id)
            .bind(&todo.owner)
            .bind(&todo.task)
            .bind(&deadline)
            .bind(todo.status.as_str())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn update(&self, todo_id: i64, update: &TodoUpdate) -> Result<bool, RepositoryError> {
        let deadline = update.deadline.map(|at| at.format(DEADLINE_FORMAT).to_string());
        let status = update.status.map(|status| status.as_str());

        let result = sqlx::query(
            "UPDATE todos SET
                 owner = COALESCE(?, owner),
                 task = COALESCE(?, task),
                 deadline = COALESCE(?, deadline),
                 status = COALESCE(?, status)
             WHERE todo_id = ?",
        )
        .bind(&update.owner)
        .bind(&update.task)
        .bind(&deadline)
        .bind(status)
        .bind(todo_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use minuteman_core::{NewTodo, TodoStatus, TodoUpdate};

    use super::SqlTodoRepository;
    use crate::connection::connect_in_memory;
    use crate::migrations::run_pending;
    use crate::repositories::{SqlUserRepository, TodoRepository, UserRepository};

    async fn seeded_repo() -> (SqlTodoRepository, i64) {
        let pool = connect_in_memory().await;
        run_pending(&pool).await.expect("migrations");
        let users = SqlUserRepository::new(pool.clone());
        let user_id = users.create("alice", "h").await.expect("create user");

        sqlx::query(
            "INSERT INTO todos (user_id, owner, task, deadline, status)
             VALUES (?, '张三', '整理纪要', '2024-06-12 18:00', 'pending')",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("seed todo");

        (SqlTodoRepository::new(pool), user_id)
    }

    #[tokio::test]
    async fn partial_update_keeps_untouched_fields() {
        let (repo, user_id) = seeded_repo().await;
        let before = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].status, TodoStatus::Pending);

        let changed = repo
            .update(
                before[0].id,
                &TodoUpdate { status: Some(TodoStatus::Completed), ..Default::default() },
            )
            .await
            .expect("update");
        assert!(changed);

        let after = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(after[0].status, TodoStatus::Completed);
        assert_eq!(after[0].task, "整理纪要");
        assert_eq!(after[0].deadline, before[0].deadline);
    }

    #[tokio::test]
    async fn batch_insert_returns_ids_in_input_order() {
        let (repo, user_id) = seeded_repo().await;
        let deadline =
            NaiveDate::from_ymd_opt(2024, 6, 14).unwrap().and_hms_opt(18, 0, 0).unwrap();

        let ids = repo
            .insert_many(
                user_id,
                None,
                &[
                    NewTodo {
                        owner: "李四".to_string(),
                        task: "确认预算口径".to_string(),
                        deadline: Some(deadline),
                        status: TodoStatus::Pending,
                    },
                    NewTodo {
                        owner: "王五".to_string(),
                        task: "排定验收时间".to_string(),
                        deadline: None,
                        status: TodoStatus::Pending,
                    },
                ],
            )
            .await
            .expect("insert batch");

        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let todos = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(todos.len(), 3);
        let batch: Vec<_> = todos.iter().filter(|todo| ids.contains(&todo.id)).collect();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().any(|todo| todo.task == "确认预算口径"
            && todo.deadline == Some(deadline)));
        assert!(batch.iter().any(|todo| todo.task == "排定验收时间" && todo.deadline.is_none()));
    }

    #[tokio::test]
    async fn a_bad_row_rolls_back_the_whole_batch() {
        let (repo, user_id) = seeded_repo().await;

        // References a meeting that does not exist.
        let result = repo
            .insert_many(
                user_id,
                Some(9999),
                &[NewTodo {
                    owner: "李四".to_string(),
                    task: "不该落库".to_string(),
                    deadline: None,
                    status: TodoStatus::Pending,
                }],
            )
            .await;
        assert!(result.is_err());

        let todos = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(todos.len(), 1, "only the seeded todo survives");
    }

    #[tokio::test]
    async fn updating_a_missing_todo_reports_false() {
        let (repo, _) = seeded_repo().await;
        let changed = repo
            .update(9999, &TodoUpdate { status: Some(TodoStatus::Cancelled), ..Default::default() })
            .await
            .expect("update");
        assert!(!changed);
    }
}
