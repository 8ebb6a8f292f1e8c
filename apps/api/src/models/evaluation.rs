use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::session::PerformanceLevel;

/// Session-level evaluation record. Created once when a session completes and
/// immutable thereafter; re-evaluation is not modeled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub session_id: Uuid,

    pub total_questions: i32,
    /// Responses with a non-blank answer; skipped is the remainder.
    pub questions_answered: i32,
    pub questions_skipped: i32,
    pub mcq_questions: i32,
    pub descriptive_questions: i32,
    pub correct_answers: i32,

    pub overall_score: f64,
    pub performance_level: PerformanceLevel,
    pub mcq_score: Option<f64>,
    pub descriptive_score: Option<f64>,
    pub accuracy_rate: f64,
    /// topic tag -> mean score, as JSONB.
    pub topic_scores: Value,

    pub average_response_time: Option<f64>,
    pub consistency_score: Option<f64>,
    pub communication_quality: Option<f64>,

    pub performance_summary: String,
    pub detailed_analysis: String,
    pub recommendations: Vec<String>,

    /// Percentile against evaluations from the trailing 90 days; null when
    /// fewer than 5 comparison points exist.
    pub percentile_rank: Option<f64>,

    pub evaluated_at: DateTime<Utc>,
}
