use sqlx::Row;

use super::{RepositoryError, UserAccount, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, username: &str, password_hash: &str) -> Result<i64, RepositoryError> {
        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, RepositoryError> {
        let row = sqlx::query("SELECT user_id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let id: i64 =
                row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let username: String =
                row.try_get("username").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            Ok(UserAccount { id, username })
        })
        .transpose()
    }

    async fn verify(&self, username: &str, password_hash: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ? AND password_hash = ?")
            .bind(username)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::SqlUserRepository;
    use crate::connection::connect_in_memory;
    use crate::migrations::run_pending;
    use crate::repositories::UserRepository;

    #[tokio::test]
    async fn create_then_find_and_verify() {
        let pool = connect_in_memory().await;
        run_pending(&pool).await.expect("migrations");
        let repo = SqlUserRepository::new(pool);

        let id = repo.create("alice", "hash-1").await.expect("create user");
        let found = repo.find_by_username("alice").await.expect("find").expect("present");
        assert_eq!(found.id, id);
        assert_eq!(found.username, "alice");

        assert!(repo.verify("alice", "hash-1").await.expect("verify"));
        assert!(!repo.verify("alice", "wrong").await.expect("verify"));
        assert!(repo.find_by_username("bob").await.expect("find").is_none());
    }
}
