use std::collections::BTreeMap;

use sqlx::Row;

use super::{PreferenceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPreferenceRepository {
    pool: DbPool,
}

impl SqlPreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PreferenceRepository for SqlPreferenceRepository {
    async fn upsert(
        &self,
        user_id: i64,
        category: &str,
        value: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO preferences (user_id, category, preference, updated_at)
             VALUES (?, ?, ?, datetime('now'))
             ON CONFLICT(user_id, category) DO UPDATE SET
                 preference = excluded.preference,
                 updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(category)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn map_for_user(
        &self,
        user_id: i64,
    ) -> Result<BTreeMap<String, String>, RepositoryError> {
        let rows = sqlx::query("SELECT category, preference FROM preferences WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let category: String =
                    row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let preference: String = row
                    .try_get("preference")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok((category, preference))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SqlPreferenceRepository;
    use crate::connection::connect_in_memory;
    use crate::migrations::run_pending;
    use crate::repositories::{PreferenceRepository, SqlUserRepository, UserRepository};

    async fn seeded_repo() -> (SqlPreferenceRepository, i64) {
        let pool = connect_in_memory().await;
        run_pending(&pool).await.expect("migrations");
        let users = SqlUserRepository::new(pool.clone());
        let user_id = users.create("alice", "h").await.expect("create user");
        (SqlPreferenceRepository::new(pool), user_id)
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_category() {
        let (repo, user_id) = seeded_repo().await;

        repo.upsert(user_id, "部门", "平台研发部").await.expect("first upsert");
        repo.upsert(user_id, "部门", "平台研发部").await.expect("second upsert");

        let map = repo.map_for_user(user_id).await.expect("map");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("部门").map(String::as_str), Some("平台研发部"));
    }

    #[tokio::test]
    async fn category_collision_overwrites_instead_of_duplicating() {
        let (repo, user_id) = seeded_repo().await;

        repo.upsert(user_id, "称呼", "老张").await.expect("insert");
        repo.upsert(user_id, "称呼", "张工").await.expect("overwrite");

        let map = repo.map_for_user(user_id).await.expect("map");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("称呼").map(String::as_str), Some("张工"));
    }

    #[tokio::test]
    async fn categories_are_scoped_per_user() {
        let (repo, user_id) = seeded_repo().await;
        repo.upsert(user_id, "语言", "中文").await.expect("insert");

        let other = repo.map_for_user(user_id + 1).await.expect("map");
        assert!(other.is_empty());
    }
}
