use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// A quiz question as read from a pool sheet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct Question {
    /// 1-based row position within its pool.
    pub id: usize,
    #[serde(rename = "q")]
    pub prompt: String,
    pub options: [String; 4],
    /// Zero-based index into `options`.
    pub correct: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionPools {
    pub a: Vec<Question>,
    pub b: Vec<Question>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Donor {
    pub id: usize,
    pub name: String,
    pub phone: String,
}
