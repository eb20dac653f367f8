use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use crate::connection::connect_in_memory;
    use crate::migrations::run_pending;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "meetings",
        "attendees",
        "agenda_conclusions",
        "follow_ups",
        "todos",
        "preferences",
        "idx_meetings_user_id",
        "idx_attendees_meeting_id",
        "idx_agenda_conclusions_meeting_id",
        "idx_follow_ups_meeting_id",
        "idx_todos_user_id",
        "idx_todos_meeting_id",
        "idx_preferences_user_id",
    ];

    #[tokio::test]
    async fn migrations_create_all_managed_objects() {
        let pool = connect_in_memory().await;
        run_pending(&pool).await.expect("run migrations");

        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE name NOT LIKE 'sqlite_%'")
            .fetch_all(&pool)
            .await
            .expect("list schema objects");
        let names: Vec<String> =
            rows.iter().map(|row| row.get::<String, _>("name")).collect();

        for object in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == object), "missing schema object {object}");
        }
    }

    #[tokio::test]
    async fn preference_category_is_unique_per_user() {
        let pool = connect_in_memory().await;
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO users (username, password_hash) VALUES ('u', 'h')")
            .execute(&pool)
            .await
            .expect("insert user");
        sqlx::query("INSERT INTO preferences (user_id, category, preference) VALUES (1, '部门', 'A')")
            .execute(&pool)
            .await
            .expect("first insert");

        let duplicate =
            sqlx::query("INSERT INTO preferences (user_id, category, preference) VALUES (1, '部门', 'B')")
                .execute(&pool)
                .await;
        assert!(duplicate.is_err(), "duplicate (user, category) must violate the constraint");
    }
}
