use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::QuestionType;

/// One answered question within a session.
///
/// Question text, type, options, expected answer, and topic are snapshotted
/// verbatim at submission time so later edits to the question bank never
/// retroactively alter what the candidate was graded against. The evaluation
/// fields are written exactly once, by the evaluation engine at session
/// completion; rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResponseRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,

    // Snapshot of the question at answer time
    pub question_text: String,
    pub question_type: QuestionType,
    pub expected_answer: String,
    pub options: Option<Vec<String>>,
    pub topic: String,

    pub candidate_answer: String,
    pub selected_option: Option<String>,
    pub time_spent_seconds: Option<i32>,
    pub answered_at: DateTime<Utc>,

    // Evaluation fields, null until the session-level evaluation runs
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub ai_feedback: Option<String>,
    pub evaluation_notes: Option<String>,
}
