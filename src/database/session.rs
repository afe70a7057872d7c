use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::question::Question;
use crate::models::session::{GameResult, NewSession, Reward, Session, SessionCompletion};
use sqlx::types::Json;

const SESSION_COLUMNS: &str = r#"
    device_id,
    ip,
    ua,
    started_at,
    end_time,
    COALESCE(checked_in, false) AS checked_in,
    checkin_link,
    quiz,
    score,
    reward,
    finished_at
"#;

/// Every mutation is guarded by `finished_at IS NULL`, so a finished
/// session can never be written again regardless of request interleaving.
#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_session(&self, device_id: &str) -> Result<Option<Session>, AppError>;
    /// Returns `None` when a row for the device already exists.
    async fn create_session(&self, session: &NewSession) -> Result<Option<Session>, AppError>;
    async fn record_checkin(&self, device_id: &str, link: &str) -> Result<bool, AppError>;
    async fn store_quiz(&self, device_id: &str, quiz: &[Question]) -> Result<bool, AppError>;
    /// Returns `None` when the session is missing or was already finished.
    /// A row that is checked in at write time is finalized with the top reward.
    async fn finish_session(&self, device_id: &str, completion: &SessionCompletion) -> Result<Option<GameResult>, AppError>;
    async fn get_result(&self, device_id: &str) -> Result<Option<GameResult>, AppError>;
}

#[async_trait::async_trait]
impl SessionRepository for PostgresRepository {
    async fn get_session(&self, device_id: &str) -> Result<Option<Session>, AppError> {
        let query = format!("SELECT {} FROM sessions WHERE device_id = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, Session>(&query).bind(device_id).fetch_optional(&self.pool).await?;

        Ok(session)
    }

    async fn create_session(&self, session: &NewSession) -> Result<Option<Session>, AppError> {
        let query = format!(
            r#"
            INSERT INTO sessions (device_id, ip, ua, end_time, checked_in, checkin_link)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (device_id) DO NOTHING
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );

        let created = sqlx::query_as::<_, Session>(&query)
            .bind(&session.device_id)
            .bind(&session.ip)
            .bind(&session.user_agent)
            .bind(session.end_time)
            .bind(session.checked_in)
            .bind(&session.checkin_link)
            .fetch_optional(&self.pool)
            .await?;

        Ok(created)
    }

    async fn record_checkin(&self, device_id: &str, link: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET checked_in = true, checkin_link = $2
            WHERE device_id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(device_id)
        .bind(link)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn store_quiz(&self, device_id: &str, quiz: &[Question]) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE sessions SET quiz = $2 WHERE device_id = $1 AND finished_at IS NULL")
            .bind(device_id)
            .bind(Json(quiz))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish_session(&self, device_id: &str, completion: &SessionCompletion) -> Result<Option<GameResult>, AppError> {
        // The check-in override is evaluated against the row as written, so a
        // check-in landing after the caller's read still yields the top tier.
        let result = sqlx::query_as::<_, GameResult>(
            r#"
            UPDATE sessions
            SET score = $2,
                reward = CASE WHEN COALESCE(checked_in, false) OR $4 THEN $6 ELSE $3 END,
                finished_at = now(),
                checked_in = COALESCE(checked_in, false) OR $4,
                checkin_link = COALESCE($5, checkin_link)
            WHERE device_id = $1 AND finished_at IS NULL
            RETURNING score, reward
            "#,
        )
        .bind(device_id)
        .bind(completion.score)
        .bind(completion.reward)
        .bind(completion.checkin_link.is_some())
        .bind(&completion.checkin_link)
        .bind(Reward::GiftLarge)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn get_result(&self, device_id: &str) -> Result<Option<GameResult>, AppError> {
        let result = sqlx::query_as::<_, GameResult>("SELECT score, reward FROM sessions WHERE device_id = $1")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }
}
