//! Session lifecycle: creation, the question pointer, answer recording,
//! and completion.
//!
//! The pointer advance uses an optimistic guard so two concurrent submits
//! for the same session cannot both record an answer for one question slot.

use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::completion::CompletionService;
use crate::errors::AppError;
use crate::interview::{evaluation, selector};
use crate::models::question::QuestionRow;
use crate::models::response::ResponseRow;
use crate::models::session::{Difficulty, InterviewStatus, SessionRow};
use crate::questions;

pub const MIN_QUESTIONS: i32 = 5;
pub const MAX_QUESTIONS: i32 = 50;

#[derive(Debug)]
pub struct NewSession {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub topics: Vec<String>,
    pub total_questions: i32,
    pub difficulty_level: Difficulty,
}

/// Outcome of recording an answer: the stored response, what comes next, and
/// the session as it stands after the pointer advance.
#[derive(Debug)]
pub struct AnswerOutcome {
    pub response: ResponseRow,
    pub next_question: Option<QuestionRow>,
    pub is_complete: bool,
    pub session: SessionRow,
}

/// A freshly created session plus the selector's strategy descriptor.
#[derive(Debug)]
pub struct StartedSession {
    pub session: SessionRow,
    pub strategy: String,
}

/// Validates the request, selects the question set, and persists the session
/// with its frozen question order.
pub async fn start_interview(pool: &PgPool, new: NewSession) -> Result<StartedSession, AppError> {
    if new.candidate_name.trim().is_empty() {
        return Err(AppError::Validation(
            "Candidate name must not be blank".to_string(),
        ));
    }
    let topics: Vec<String> = new
        .topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if topics.is_empty() {
        return Err(AppError::Validation(
            "At least one topic is required".to_string(),
        ));
    }
    if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&new.total_questions) {
        return Err(AppError::Validation(format!(
            "Question count must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}, got {}",
            new.total_questions
        )));
    }

    let outcome =
        selector::select_questions(pool, &topics, new.total_questions as usize, new.difficulty_level)
            .await?;
    let question_ids: Vec<Uuid> = outcome.questions.iter().map(|q| q.id).collect();

    let session: SessionRow = sqlx::query_as(
        "INSERT INTO interview_sessions (
            candidate_name, candidate_email, topics, total_questions,
            difficulty_level, status, current_question_index, questions_asked,
            conversation_history
         ) VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8)
         RETURNING *",
    )
    .bind(new.candidate_name.trim())
    .bind(new.candidate_email.as_deref().map(str::trim))
    .bind(&topics)
    .bind(new.total_questions)
    .bind(new.difficulty_level)
    .bind(InterviewStatus::Active)
    .bind(&question_ids)
    .bind(json!([]))
    .fetch_one(pool)
    .await?;

    Ok(StartedSession {
        session,
        strategy: outcome.strategy,
    })
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<SessionRow, AppError> {
    sqlx::query_as("SELECT * FROM interview_sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))
}

pub async fn list_sessions(
    pool: &PgPool,
    status: Option<InterviewStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SessionRow>, AppError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as(
                "SELECT * FROM interview_sessions WHERE status = $1 \
                 ORDER BY started_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM interview_sessions ORDER BY started_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Resolves the question the pointer currently addresses. A session whose
/// pointer has run past its question list only answers with a conflict.
pub async fn current_question(
    pool: &PgPool,
    session: &SessionRow,
) -> Result<QuestionRow, AppError> {
    if session.is_complete() {
        return Err(AppError::InterviewComplete(
            "All questions have been answered for this session".to_string(),
        ));
    }
    let question_id = session.questions_asked[session.current_question_index as usize];
    questions::get_question(pool, question_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Question {question_id} referenced by session {} no longer exists",
                session.id
            ))
        })
}

/// Records an answer against the current question and advances the pointer.
///
/// The response insert and pointer advance happen in one transaction, with
/// the advance guarded on the pointer value the caller observed. A losing
/// concurrent submit rolls back and reports a conflict. When the last
/// question is answered, the session is finalized in the same transaction
/// and the post-commit evaluation is attempted; evaluation failure does not
/// undo completion.
pub async fn submit_answer(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
    answer: &str,
    selected_option: Option<&str>,
    time_spent_seconds: Option<i32>,
) -> Result<AnswerOutcome, AppError> {
    if session.status != InterviewStatus::Active {
        return Err(AppError::InterviewComplete(format!(
            "Session is {:?} and no longer accepts answers",
            session.status
        )));
    }
    let question = current_question(pool, session).await?;

    let mut tx = pool.begin().await?;

    let response: ResponseRow = sqlx::query_as(
        "INSERT INTO candidate_responses (
            session_id, question_id, question_text, question_type,
            expected_answer, options, topic, candidate_answer, selected_option,
            time_spent_seconds
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(session.id)
    .bind(question.id)
    .bind(&question.question)
    .bind(question.question_type)
    .bind(&question.answer)
    .bind(&question.options)
    .bind(&question.tag)
    .bind(answer)
    .bind(selected_option)
    .bind(time_spent_seconds)
    .fetch_one(&mut *tx)
    .await?;

    // Optimistic guard: only advance if nobody else already answered this slot.
    let advanced = sqlx::query(
        "UPDATE interview_sessions \
         SET current_question_index = current_question_index + 1 \
         WHERE id = $1 AND current_question_index = $2",
    )
    .bind(session.id)
    .bind(session.current_question_index)
    .execute(&mut *tx)
    .await?;
    if advanced.rows_affected() != 1 {
        tx.rollback().await?;
        return Err(AppError::InterviewComplete(
            "This question was already answered by a concurrent request".to_string(),
        ));
    }

    let new_index = session.current_question_index + 1;
    let is_complete = new_index >= session.total_questions;
    if is_complete {
        sqlx::query(
            "UPDATE interview_sessions \
             SET status = $1, completed_at = now(), \
                 total_duration_minutes = GREATEST(1, \
                     CEIL(EXTRACT(EPOCH FROM (now() - started_at)) / 60))::int \
             WHERE id = $2",
        )
        .bind(InterviewStatus::Completed)
        .bind(session.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let session = get_session(pool, session.id).await?;

    if is_complete {
        match fetch_responses(pool, session.id).await {
            Ok(responses) => {
                if let Err(e) =
                    evaluation::evaluate_interview(pool, completion, &session, &responses).await
                {
                    warn!(session_id = %session.id, "Post-completion evaluation failed: {e}");
                }
            }
            Err(e) => {
                warn!(session_id = %session.id, "Could not load responses for evaluation: {e}");
            }
        }
    }

    let next_question = if is_complete {
        None
    } else {
        Some(current_question(pool, &session).await?)
    };

    Ok(AnswerOutcome {
        response,
        next_question,
        is_complete,
        session,
    })
}

pub async fn fetch_responses(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<ResponseRow>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM candidate_responses WHERE session_id = $1 ORDER BY answered_at",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::StubCompletion;
    use chrono::Utc;

    // Lazy pool: no connection is attempted until a query runs, so guard
    // paths that reject before any I/O can be exercised without a database.
    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/unreachable").unwrap()
    }

    fn sample_session(status: InterviewStatus, index: i32, question_count: usize) -> SessionRow {
        SessionRow {
            id: Uuid::new_v4(),
            candidate_name: "Ada".to_string(),
            candidate_email: None,
            topics: vec!["sql".to_string()],
            total_questions: question_count as i32,
            difficulty_level: Difficulty::Mixed,
            status,
            current_question_index: index,
            questions_asked: (0..question_count).map(|_| Uuid::new_v4()).collect(),
            conversation_history: json!([]),
            started_at: Utc::now(),
            completed_at: None,
            total_duration_minutes: None,
            overall_score: None,
            performance_level: None,
        }
    }

    #[tokio::test]
    async fn test_submit_answer_rejects_completed_session() {
        let pool = lazy_pool();
        let completion = StubCompletion::replying("unused");
        let session = sample_session(InterviewStatus::Completed, 5, 5);

        let err = submit_answer(&pool, &completion, &session, "answer", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InterviewComplete(_)));
    }

    #[tokio::test]
    async fn test_submit_answer_rejects_exhausted_pointer() {
        let pool = lazy_pool();
        let completion = StubCompletion::replying("unused");
        // Still active, but the pointer has run past the question list.
        let session = sample_session(InterviewStatus::Active, 5, 5);

        let err = submit_answer(&pool, &completion, &session, "answer", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InterviewComplete(_)));
    }

    #[tokio::test]
    async fn test_current_question_rejects_exhausted_session() {
        let pool = lazy_pool();
        let session = sample_session(InterviewStatus::Active, 3, 3);

        let err = current_question(&pool, &session).await.unwrap_err();
        assert!(matches!(err, AppError::InterviewComplete(_)));
    }
}
