use crate::database::session::SessionRepository;
use crate::error::app_error::AppError;
use crate::models::question::{Donor, Question, QuestionPools};
use crate::models::session::{GameResult, NewSession, Reward, Session, SessionCompletion};
use crate::service::question_source::QuestionSource;
use crate::service::sheets::SheetsError;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub fn sample_question(id: usize, prompt: &str) -> Question {
    Question {
        id,
        prompt: prompt.to_string(),
        options: ["a", "b", "c", "d"].map(String::from),
        correct: 0,
    }
}

pub fn sample_pools() -> QuestionPools {
    QuestionPools {
        a: vec![sample_question(1, "A1"), sample_question(2, "A2"), sample_question(3, "A3")],
        b: vec![sample_question(1, "B1"), sample_question(2, "B2")],
    }
}

pub fn sample_donors() -> Vec<Donor> {
    vec![
        Donor {
            id: 1,
            name: "Alice".to_string(),
            phone: "0901000001".to_string(),
        },
        Donor {
            id: 2,
            name: "Bob".to_string(),
            phone: "0901000002".to_string(),
        },
    ]
}

/// In-memory session table with the same conditional-update rules as Postgres.
#[derive(Default)]
pub struct MockRepository {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MockRepository {
    pub fn session(&self, device_id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(device_id).cloned()
    }
}

#[async_trait::async_trait]
impl SessionRepository for MockRepository {
    async fn get_session(&self, device_id: &str) -> Result<Option<Session>, AppError> {
        Ok(self.session(device_id))
    }

    async fn create_session(&self, session: &NewSession) -> Result<Option<Session>, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session.device_id) {
            return Ok(None);
        }

        let row = Session {
            device_id: session.device_id.clone(),
            ip: session.ip.clone(),
            user_agent: session.user_agent.clone(),
            started_at: Some(Utc::now()),
            end_time: Some(session.end_time),
            checked_in: session.checked_in,
            checkin_link: session.checkin_link.clone(),
            quiz: None,
            score: None,
            reward: None,
            finished_at: None,
        };
        sessions.insert(row.device_id.clone(), row.clone());
        Ok(Some(row))
    }

    async fn record_checkin(&self, device_id: &str, link: &str) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(device_id) {
            Some(row) if row.finished_at.is_none() => {
                row.checked_in = true;
                row.checkin_link = Some(link.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn store_quiz(&self, device_id: &str, quiz: &[Question]) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(device_id) {
            Some(row) if row.finished_at.is_none() => {
                row.quiz = Some(Json(quiz.to_vec()));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_session(&self, device_id: &str, completion: &SessionCompletion) -> Result<Option<GameResult>, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(device_id) {
            Some(row) if row.finished_at.is_none() => {
                if let Some(link) = &completion.checkin_link {
                    row.checked_in = true;
                    row.checkin_link = Some(link.clone());
                }
                row.score = Some(completion.score);
                row.reward = Some(if row.checked_in { Reward::GiftLarge } else { completion.reward });
                row.finished_at = Some(Utc::now());
                Ok(Some(GameResult {
                    score: row.score,
                    reward: row.reward,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn get_result(&self, device_id: &str) -> Result<Option<GameResult>, AppError> {
        Ok(self.session(device_id).map(|row| GameResult {
            score: row.score,
            reward: row.reward,
        }))
    }
}

/// Write performed by a competing request right before the next matching call.
pub enum Interleaved {
    /// Another request creates the row between our read and our insert.
    CreateBeforeInsert(NewSession),
    /// A late check-in lands between our read and our finalizing update.
    CheckinBeforeFinish(String),
    /// Another request finalizes the session first.
    FinishBeforeFinish(SessionCompletion),
}

/// `MockRepository` that injects one competing write into the next create or finish.
#[derive(Default)]
pub struct InterleavingRepository {
    pub inner: MockRepository,
    pending: Mutex<Option<Interleaved>>,
}

impl InterleavingRepository {
    pub fn interleave(&self, write: Interleaved) {
        *self.pending.lock().unwrap() = Some(write);
    }

    fn take_pending(&self) -> Option<Interleaved> {
        self.pending.lock().unwrap().take()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InterleavingRepository {
    async fn get_session(&self, device_id: &str) -> Result<Option<Session>, AppError> {
        self.inner.get_session(device_id).await
    }

    async fn create_session(&self, session: &NewSession) -> Result<Option<Session>, AppError> {
        if let Some(Interleaved::CreateBeforeInsert(competitor)) = self.take_pending() {
            self.inner.create_session(&competitor).await?;
        }
        self.inner.create_session(session).await
    }

    async fn record_checkin(&self, device_id: &str, link: &str) -> Result<bool, AppError> {
        self.inner.record_checkin(device_id, link).await
    }

    async fn store_quiz(&self, device_id: &str, quiz: &[Question]) -> Result<bool, AppError> {
        self.inner.store_quiz(device_id, quiz).await
    }

    async fn finish_session(&self, device_id: &str, completion: &SessionCompletion) -> Result<Option<GameResult>, AppError> {
        match self.take_pending() {
            Some(Interleaved::CheckinBeforeFinish(link)) => {
                self.inner.record_checkin(device_id, &link).await?;
            }
            Some(Interleaved::FinishBeforeFinish(competitor)) => {
                self.inner.finish_session(device_id, &competitor).await?;
            }
            _ => {}
        }
        self.inner.finish_session(device_id, completion).await
    }

    async fn get_result(&self, device_id: &str) -> Result<Option<GameResult>, AppError> {
        self.inner.get_result(device_id).await
    }
}

/// Fixed question source that counts upstream fetches and can be made to fail.
pub struct StaticSource {
    pools: QuestionPools,
    donors: Vec<Donor>,
    pool_fetches: AtomicUsize,
    failing: AtomicBool,
}

impl StaticSource {
    pub fn new(pools: QuestionPools) -> Self {
        Self {
            pools,
            donors: sample_donors(),
            pool_fetches: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn pool_fetches(&self) -> usize {
        self.pool_fetches.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), SheetsError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SheetsError::Status {
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionSource for StaticSource {
    async fn load_pools(&self) -> Result<QuestionPools, SheetsError> {
        self.pool_fetches.fetch_add(1, Ordering::SeqCst);
        // Suspend like a real network call so concurrent callers can interleave.
        tokio::task::yield_now().await;
        self.check_failing()?;
        Ok(self.pools.clone())
    }

    async fn load_donors(&self) -> Result<Vec<Donor>, SheetsError> {
        self.check_failing()?;
        Ok(self.donors.clone())
    }
}
