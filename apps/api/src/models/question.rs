use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Question kind. Closed set; the selector and graders branch on it, so a
/// stray string here would be a logic error, not data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Descriptive,
}

/// A stored interview question. Immutable once created; the interview core
/// only ever reads these; responses carry their own snapshot so later edits
/// to the bank never change what a candidate was graded against.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub question_type: QuestionType,
    /// Ordered option texts; populated for mcq questions only.
    pub options: Option<Vec<String>>,
    pub tag: String,
    pub created_at: DateTime<Utc>,
}
