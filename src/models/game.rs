use crate::error::app_error::AppError;
use crate::models::question::Question;
use crate::models::session::GameResult;
use chrono::{DateTime, Utc};
use rocket::FromForm;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::Value;

/// Identifiers and links are opaque: a non-empty string (or a number, as
/// loosely-typed clients send) is passed through unchanged.
fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn required_device_id(device_id: Option<&Value>, message: &str) -> Result<String, AppError> {
    text_value(device_id).ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// Truthiness of a loosely-typed flag: `true`, a non-empty string or a non-zero number.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

#[derive(Deserialize, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub device_id: Option<Value>,
    /// Check-in link; presence marks the session as checked in.
    pub link: Option<Value>,
    pub checked_in: Option<Value>,
}

impl StartRequest {
    pub fn device_id(&self) -> Result<String, AppError> {
        required_device_id(self.device_id.as_ref(), "deviceId required")
    }

    pub fn link(&self) -> Option<String> {
        text_value(self.link.as_ref())
    }

    pub fn checked_in(&self) -> bool {
        truthy(self.checked_in.as_ref())
    }
}

/// Fields stay untyped so a wrong-typed value is reported with the endpoint's
/// own message rather than a generic parse failure.
#[derive(Deserialize, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub device_id: Option<Value>,
    pub score: Option<Value>,
    pub link: Option<Value>,
}

impl FinishRequest {
    pub fn device_id(&self) -> Result<String, AppError> {
        required_device_id(self.device_id.as_ref(), "deviceId & score required")
    }

    pub fn score(&self) -> Result<i32, AppError> {
        self.score
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(|score| i32::try_from(score).ok())
            .ok_or_else(|| AppError::BadRequest("deviceId & score required".to_string()))
    }

    pub fn link(&self) -> Option<String> {
        text_value(self.link.as_ref())
    }
}

#[derive(FromForm, Deserialize, Debug, JsonSchema)]
pub struct DeviceQuery {
    #[field(name = "deviceId")]
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

impl DeviceQuery {
    pub fn device_id(&self) -> Result<String, AppError> {
        match self.device_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(AppError::BadRequest("deviceId required".to_string())),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum StartResponse {
    Started {
        ok: bool,
        #[serde(rename = "endTime")]
        end_time: Option<DateTime<Utc>>,
    },
    AlreadyPlayed {
        #[serde(rename = "alreadyPlayed")]
        already_played: bool,
        result: GameResult,
    },
}

impl StartResponse {
    pub fn started(end_time: Option<DateTime<Utc>>) -> Self {
        StartResponse::Started { ok: true, end_time }
    }

    pub fn already_played(result: GameResult) -> Self {
        StartResponse::AlreadyPlayed {
            already_played: true,
            result,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum QuestionsResponse {
    Quiz {
        quiz: Vec<Question>,
    },
    AlreadyPlayed {
        #[serde(rename = "alreadyPlayed")]
        already_played: bool,
        result: GameResult,
    },
}

impl QuestionsResponse {
    pub fn already_played(result: GameResult) -> Self {
        QuestionsResponse::AlreadyPlayed {
            already_played: true,
            result,
        }
    }
}
