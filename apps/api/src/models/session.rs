use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::completion::ChatTurn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InterviewStatus {
    Active,
    Completed,
    /// Reachable via administrative action only; no core operation drives it.
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Mixed,
}

/// Coarse performance bucket derived from the overall numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            PerformanceLevel::Excellent
        } else if score >= 70.0 {
            PerformanceLevel::Good
        } else if score >= 50.0 {
            PerformanceLevel::Average
        } else {
            PerformanceLevel::Poor
        }
    }
}

/// One candidate's end-to-end interview attempt.
///
/// `questions_asked` is fixed at creation and never mutated afterward, so
/// question order and content stay stable even if the bank changes mid
/// session. Invariant: `0 <= current_question_index <= questions_asked.len()`;
/// the session is complete exactly when the pointer reaches the length.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub topics: Vec<String>,
    pub total_questions: i32,
    pub difficulty_level: Difficulty,
    pub status: InterviewStatus,
    pub current_question_index: i32,
    pub questions_asked: Vec<Uuid>,
    /// Rolling log of [`ChatTurn`] values as JSONB. Lossy: capped
    /// at the most recent 20 entries, presentation context only; grading
    /// never reads it.
    pub conversation_history: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_minutes: Option<i32>,
    pub overall_score: Option<f64>,
    pub performance_level: Option<PerformanceLevel>,
}

impl SessionRow {
    pub fn is_complete(&self) -> bool {
        self.current_question_index as usize >= self.questions_asked.len()
    }

    /// Decodes the rolling conversation log. Malformed history (from older
    /// writes) degrades to an empty log rather than failing the operation.
    pub fn history(&self) -> Vec<ChatTurn> {
        serde_json::from_value(self.conversation_history.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_level_bands() {
        assert_eq!(PerformanceLevel::from_score(95.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_score(90.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_score(89.9), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_score(70.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_score(50.0), PerformanceLevel::Average);
        assert_eq!(PerformanceLevel::from_score(49.9), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::from_score(0.0), PerformanceLevel::Poor);
    }

    #[test]
    fn test_difficulty_deserializes_lowercase() {
        let d: Difficulty = serde_json::from_str("\"mixed\"").unwrap();
        assert_eq!(d, Difficulty::Mixed);
    }

    #[test]
    fn test_malformed_history_degrades_to_empty() {
        let session = sample_session(serde_json::json!({"not": "a list"}));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_pointer_at_length_means_complete() {
        let mut session = sample_session(serde_json::json!([]));
        session.questions_asked = vec![Uuid::new_v4(), Uuid::new_v4()];
        session.current_question_index = 1;
        assert!(!session.is_complete());
        session.current_question_index = 2;
        assert!(session.is_complete());
    }

    fn sample_session(history: Value) -> SessionRow {
        SessionRow {
            id: Uuid::new_v4(),
            candidate_name: "Ada".to_string(),
            candidate_email: None,
            topics: vec!["sql".to_string()],
            total_questions: 5,
            difficulty_level: Difficulty::Mixed,
            status: InterviewStatus::Active,
            current_question_index: 0,
            questions_asked: vec![],
            conversation_history: history,
            started_at: Utc::now(),
            completed_at: None,
            total_duration_minutes: None,
            overall_score: None,
            performance_level: None,
        }
    }
}
