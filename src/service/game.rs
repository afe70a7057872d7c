use crate::config::GameConfig;
use crate::database::session::SessionRepository;
use crate::error::app_error::AppError;
use crate::models::game::{QuestionsResponse, StartResponse};
use crate::models::question::{Question, QuestionPools};
use crate::models::session::{GameResult, NewSession, Reward, Session, SessionCompletion};
use crate::service::pool_cache::PoolCache;
use crate::service::question_source::QuestionSource;
use chrono::{Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

/// Client details captured when a session is created.
#[derive(Debug, Clone, Default)]
pub struct StartInput {
    pub device_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub checked_in: bool,
    pub link: Option<String>,
}

fn pick<R: Rng + ?Sized>(pool: &[Question], name: &'static str, rng: &mut R) -> Result<Question, AppError> {
    pool.choose(rng).cloned().ok_or(AppError::EmptyPool(name))
}

/// Checked-in players answer one question from pool A; everyone else gets
/// two from pool A and one from pool B. Draws are independent, so repeats are possible.
pub fn build_quiz<R: Rng + ?Sized>(pools: &QuestionPools, checked_in: bool, rng: &mut R) -> Result<Vec<Question>, AppError> {
    if checked_in {
        return Ok(vec![pick(&pools.a, "A", rng)?]);
    }

    Ok(vec![pick(&pools.a, "A", rng)?, pick(&pools.a, "A", rng)?, pick(&pools.b, "B", rng)?])
}

pub struct GameService<'a> {
    repository: &'a dyn SessionRepository,
    config: &'a GameConfig,
}

impl<'a> GameService<'a> {
    pub fn new(repository: &'a dyn SessionRepository, config: &'a GameConfig) -> Self {
        GameService { repository, config }
    }

    fn late_link(&self, link: Option<String>) -> Option<String> {
        if self.config.late_checkin_enabled { link } else { None }
    }

    async fn existing_session(&self, device_id: &str) -> Result<Session, AppError> {
        self.repository.get_session(device_id).await?.ok_or(AppError::SessionNotFound)
    }

    pub async fn start(&self, input: StartInput) -> Result<StartResponse, AppError> {
        if let Some(session) = self.repository.get_session(&input.device_id).await? {
            return self.resume(session, input.link).await;
        }

        let new_session = NewSession {
            device_id: input.device_id.clone(),
            ip: input.ip,
            user_agent: input.user_agent,
            end_time: Utc::now() + Duration::seconds(self.config.session_duration_seconds),
            checked_in: input.checked_in || input.link.is_some(),
            checkin_link: input.link.clone(),
        };

        match self.repository.create_session(&new_session).await? {
            Some(created) => {
                info!(device_id = %created.device_id, checked_in = created.checked_in, "session created");
                Ok(StartResponse::started(created.end_time))
            }
            None => {
                // Another request created the row between our read and insert.
                let session = self.existing_session(&input.device_id).await?;
                self.resume(session, input.link).await
            }
        }
    }

    async fn resume(&self, session: Session, link: Option<String>) -> Result<StartResponse, AppError> {
        if let Some(result) = session.finished_result() {
            return Ok(StartResponse::already_played(result));
        }

        if let Some(link) = self.late_link(link)
            && self.repository.record_checkin(&session.device_id, &link).await?
        {
            info!(device_id = %session.device_id, "late check-in recorded");
        }

        Ok(StartResponse::started(session.end_time))
    }

    /// Assembles a fresh quiz on every call until the session is finished.
    pub async fn questions(&self, device_id: &str, pools: &PoolCache) -> Result<QuestionsResponse, AppError> {
        let session = self.repository.get_session(device_id).await?.ok_or(AppError::SessionNotStarted)?;
        if let Some(result) = session.finished_result() {
            return Ok(QuestionsResponse::already_played(result));
        }

        let pools = pools
            .get_pools()
            .await
            .map_err(|e| AppError::upstream("Failed to load question pools", e))?;
        let quiz = build_quiz(&pools, session.checked_in, &mut rand::thread_rng())?;

        if !self.repository.store_quiz(device_id, &quiz).await? {
            let result = self.repository.get_result(device_id).await?.ok_or(AppError::SessionNotStarted)?;
            return Ok(QuestionsResponse::already_played(result));
        }

        Ok(QuestionsResponse::Quiz { quiz })
    }

    /// Scores the session once; later calls replay the stored outcome.
    pub async fn finish(&self, device_id: &str, score: i32, link: Option<String>) -> Result<GameResult, AppError> {
        let session = self.existing_session(device_id).await?;
        if let Some(result) = session.finished_result() {
            return Ok(result);
        }

        let checkin_link = self.late_link(link);
        let checked_in = session.checked_in || checkin_link.is_some();
        let completion = SessionCompletion {
            score,
            reward: Reward::for_score(score, checked_in),
            checkin_link,
        };

        match self.repository.finish_session(device_id, &completion).await? {
            Some(result) => {
                if let Some(reward) = result.reward {
                    info!(device_id = %device_id, score = score, reward = %reward, "session finished");
                }
                Ok(result)
            }
            None => self.repository.get_result(device_id).await?.ok_or(AppError::SessionNotFound),
        }
    }

    pub async fn result(&self, device_id: &str) -> Result<Option<GameResult>, AppError> {
        self.repository.get_result(device_id).await
    }
}

pub async fn donor_phones(source: &dyn QuestionSource) -> Result<Vec<String>, AppError> {
    let donors = source
        .load_donors()
        .await
        .map_err(|e| AppError::upstream("Failed to load donor phones", e))?;

    Ok(donors.into_iter().map(|donor| donor.phone).collect())
}
