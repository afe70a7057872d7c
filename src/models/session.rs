use crate::models::question::Question;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use sqlx::types::Json;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reward {
    GiftLarge,
    GiftMedium,
    GiftSmall,
    NoGift,
}

impl Reward {
    /// A checked-in player always gets the top tier.
    pub fn for_score(score: i32, checked_in: bool) -> Self {
        if checked_in {
            return Reward::GiftLarge;
        }

        match score {
            s if s >= 3 => Reward::GiftLarge,
            2 => Reward::GiftMedium,
            1 => Reward::GiftSmall,
            _ => Reward::NoGift,
        }
    }
}

impl std::fmt::Display for Reward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reward::GiftLarge => write!(f, "GIFT_LARGE"),
            Reward::GiftMedium => write!(f, "GIFT_MEDIUM"),
            Reward::GiftSmall => write!(f, "GIFT_SMALL"),
            Reward::NoGift => write!(f, "NO_GIFT"),
        }
    }
}

/// One row of the `sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub device_id: String,
    pub ip: Option<String>,
    #[sqlx(rename = "ua")]
    pub user_agent: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub checked_in: bool,
    pub checkin_link: Option<String>,
    pub quiz: Option<Json<Vec<Question>>>,
    pub score: Option<i32>,
    pub reward: Option<Reward>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Stored outcome, only once the session is finished.
    pub fn finished_result(&self) -> Option<GameResult> {
        self.is_finished().then(|| GameResult {
            score: self.score,
            reward: self.reward,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub device_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub end_time: DateTime<Utc>,
    pub checked_in: bool,
    pub checkin_link: Option<String>,
}

/// Values written when a session is finalized.
#[derive(Debug, Clone)]
pub struct SessionCompletion {
    pub score: i32,
    pub reward: Reward,
    pub checkin_link: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, sqlx::FromRow)]
pub struct GameResult {
    pub score: Option<i32>,
    pub reward: Option<Reward>,
}
