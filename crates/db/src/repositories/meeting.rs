use chrono::NaiveDateTime;
use sqlx::Row;

use minuteman_core::deadline::{self, Deadline, UNRESOLVED_SENTINEL};
use minuteman_core::{AgendaConclusion, BasicInfo, FollowUp, MeetingRecord, TodoItem, TodoStatus};

use super::{MeetingRepository, MeetingSummary, RepositoryError};
use crate::DbPool;

const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct SqlMeetingRepository {
    pool: DbPool,
}

impl SqlMeetingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_start_time(raw: &str) -> Result<NaiveDateTime, RepositoryError> {
    deadline::parse_timestamp(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unparseable meeting start time `{raw}`")))
}

/// Deadline column value for one extracted todo: unresolved stays NULL,
/// everything else is normalized against the meeting start.
fn deadline_column(raw: &str, meeting_start: NaiveDateTime) -> Option<String> {
    match deadline::normalize(raw, meeting_start) {
        Deadline::Resolved(at) => Some(at.format(DEADLINE_FORMAT).to_string()),
        Deadline::Unresolved => None,
    }
}

#[async_trait::async_trait]
impl MeetingRepository for SqlMeetingRepository {
    async fn save_record(&self, record: &MeetingRecord) -> Result<i64, RepositoryError> {
        let start_time = record
            .basic_info
            .start_time()
            .map_err(|error| RepositoryError::InvalidRecord(error.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let meeting_id = sqlx::query(
            "INSERT INTO meetings (user_id, subject, start_time, duration, raw_text)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.user_id)
        .bind(&record.basic_info.subject)
        .bind(&record.basic_info.time)
        .bind(&record.basic_info.duration)
        .bind(&record.raw_text)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for name in &record.basic_info.attendees {
            sqlx::query("INSERT INTO attendees (meeting_id, name) VALUES (?, ?)")
                .bind(meeting_id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for (position, item) in record.agendas.iter().enumerate() {
            sqlx::query(
                "INSERT INTO agenda_conclusions (meeting_id, position, agenda, conclusion)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(meeting_id)
            .bind(position as i64)
            .bind(&item.agenda)
            .bind(&item.conclusion)
            .execute(&mut *tx)
            .await?;
        }

        for todo in &record.todos {
            sqlx::query(
                "INSERT INTO todos (user_id, meeting_id, owner, task, deadline, status)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(record.user_id)
            .bind(meeting_id)
            .bind(&todo.owner)
            .bind(&todo.task)
            .bind(deadline_column(&todo.deadline, start_time))
            .bind(TodoStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for follow_up in &record.follow_ups {
            sqlx::query("INSERT INTO follow_ups (meeting_id, topic, reason) VALUES (?, ?, ?)")
                .bind(meeting_id)
                .bind(&follow_up.topic)
                .bind(&follow_up.reason)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(meeting_id)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<MeetingSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT meeting_id, subject, start_time FROM meetings
             WHERE user_id = ? ORDER BY start_time DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: i64 = row
                    .try_get("meeting_id")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let subject: String =
                    row.try_get("subject").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let start_time_raw: String = row
                    .try_get("start_time")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(MeetingSummary { id, subject, start_time: parse_start_time(&start_time_raw)? })
            })
            .collect()
    }

    async fn load_record(
        &self,
        meeting_id: i64,
        user_id: i64,
    ) -> Result<Option<MeetingRecord>, RepositoryError> {
        let meeting = sqlx::query(
            "SELECT subject, start_time, duration, raw_text FROM meetings
             WHERE meeting_id = ? AND user_id = ?",
        )
        .bind(meeting_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(meeting) = meeting else {
            return Ok(None);
        };

        let subject: String =
            meeting.try_get("subject").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let time: String =
            meeting.try_get("start_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let duration: String =
            meeting.try_get("duration").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let raw_text: String =
            meeting.try_get("raw_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let attendees = sqlx::query(
            "SELECT name FROM attendees WHERE meeting_id = ? ORDER BY attendee_id",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string())))
        .collect::<Result<Vec<String>, _>>()?;

        let agendas = sqlx::query(
            "SELECT agenda, conclusion FROM agenda_conclusions
             WHERE meeting_id = ? ORDER BY position",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(AgendaConclusion {
                agenda: row
                    .try_get("agenda")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                conclusion: row
                    .try_get("conclusion")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let todos = sqlx::query(
            "SELECT owner, task, deadline FROM todos WHERE meeting_id = ? ORDER BY todo_id",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            let deadline: Option<String> =
                row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            Ok(TodoItem {
                owner: row.try_get("owner").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                task: row.try_get("task").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                deadline: deadline.unwrap_or_else(|| UNRESOLVED_SENTINEL.to_string()),
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let follow_ups = sqlx::query(
            "SELECT topic, reason FROM follow_ups WHERE meeting_id = ? ORDER BY follow_up_id",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(FollowUp {
                topic: row.try_get("topic").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                reason: row
                    .try_get("reason")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(MeetingRecord {
            basic_info: BasicInfo { attendees, time, subject, duration },
            agendas,
            todos,
            follow_ups,
            raw_text,
            user_id,
        }))
    }
}
