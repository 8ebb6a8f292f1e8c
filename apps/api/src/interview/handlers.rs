//! HTTP handlers for the interview endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::{conversation, selector, session};
use crate::models::evaluation::EvaluationRow;
use crate::models::question::{QuestionRow, QuestionType};
use crate::models::session::{Difficulty, InterviewStatus, PerformanceLevel, SessionRow};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub topics: Vec<String>,
    pub total_questions: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: Difficulty,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Mixed
}

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub session_id: Uuid,
    pub candidate_name: String,
    pub total_questions: i32,
    pub selection_strategy: String,
    pub first_question: QuestionPresentation,
}

#[derive(Debug, Serialize)]
pub struct QuestionPresentation {
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub topic: String,
    /// Conversational phrasing of the question, model-generated when the
    /// completion backend is reachable.
    pub context: String,
    pub question_number: i32,
    pub total_questions: i32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: String,
    pub selected_option: Option<String>,
    pub time_spent_seconds: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub success: bool,
    /// Acknowledgment for the recorded answer, or the closing message when
    /// the session just completed.
    pub message: String,
    pub next_question: Option<QuestionPresentation>,
    pub is_interview_complete: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<InterviewStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct SessionDescriptor {
    pub session_id: Uuid,
    pub candidate_name: String,
    pub topics: Vec<String>,
    pub status: InterviewStatus,
    pub progress: String,
    pub difficulty_level: Difficulty,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub overall_score: Option<f64>,
    pub performance_level: Option<PerformanceLevel>,
}

impl From<SessionRow> for SessionDescriptor {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: row.id,
            candidate_name: row.candidate_name,
            topics: row.topics,
            status: row.status,
            progress: format!("{}/{}", row.current_question_index, row.total_questions),
            difficulty_level: row.difficulty_level,
            started_at: row.started_at,
            completed_at: row.completed_at,
            overall_score: row.overall_score,
            performance_level: row.performance_level,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub session_id: Uuid,
    pub candidate_name: String,
    pub overall_score: f64,
    pub performance_level: PerformanceLevel,
    pub total_questions: i32,
    pub questions_answered: i32,
    pub questions_skipped: i32,
    pub correct_answers: i32,
    pub accuracy_rate: f64,
    pub mcq_score: Option<f64>,
    pub descriptive_score: Option<f64>,
    pub topic_scores: Value,
    pub average_response_time: Option<f64>,
    pub consistency_score: Option<f64>,
    pub communication_quality: Option<f64>,
    pub performance_summary: String,
    pub detailed_analysis: String,
    pub recommendations: Vec<String>,
    pub percentile_rank: Option<f64>,
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_sessions: i64,
    pub sessions_by_status: Vec<StatusCount>,
    pub average_score: Option<f64>,
    pub level_distribution: Vec<LevelCount>,
    pub popular_topics: Vec<TopicCount>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: InterviewStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct LevelCount {
    pub performance_level: PerformanceLevel,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub topics: Vec<String>,
    pub total_questions: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: Difficulty,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub pool: selector::PoolStatistics,
    pub selection_strategy: String,
    pub questions: Vec<PreviewQuestion>,
}

#[derive(Debug, Serialize)]
pub struct PreviewQuestion {
    pub question_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub topic: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

pub async fn handle_start_interview(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> Result<Json<StartInterviewResponse>, AppError> {
    let started = session::start_interview(
        &state.db,
        session::NewSession {
            candidate_name: req.candidate_name,
            candidate_email: req.candidate_email,
            topics: req.topics,
            total_questions: req.total_questions,
            difficulty_level: req.difficulty_level,
        },
    )
    .await?;

    let question = session::current_question(&state.db, &started.session).await?;
    let presentation = present(&state, &started.session, question).await;

    Ok(Json(StartInterviewResponse {
        session_id: started.session.id,
        candidate_name: started.session.candidate_name.clone(),
        total_questions: started.session.total_questions,
        selection_strategy: started.strategy,
        first_question: presentation,
    }))
}

pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionDescriptor>>, AppError> {
    if !(1..=500).contains(&query.limit) || query.offset < 0 {
        return Err(AppError::Validation(
            "limit must be between 1 and 500 and offset must not be negative".to_string(),
        ));
    }
    let sessions =
        session::list_sessions(&state.db, query.status, query.limit, query.offset).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

pub async fn handle_current_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<QuestionPresentation>, AppError> {
    let current = session::get_session(&state.db, session_id).await?;
    let question = session::current_question(&state.db, &current).await?;
    Ok(Json(present(&state, &current, question).await))
}

pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let current = session::get_session(&state.db, session_id).await?;
    let answered = session::current_question(&state.db, &current).await?;

    let outcome = session::submit_answer(
        &state.db,
        state.completion.as_ref(),
        &current,
        &req.answer,
        req.selected_option.as_deref(),
        req.time_spent_seconds,
    )
    .await?;

    let message = if outcome.is_complete {
        conversation::completion_message(&state.db, state.completion.as_ref(), &outcome.session)
            .await
            .text
    } else {
        conversation::acknowledge_answer(
            &state.db,
            state.completion.as_ref(),
            &outcome.session,
            &answered,
            &req.answer,
        )
        .await
        .text
    };

    let next_question = match outcome.next_question {
        Some(question) => Some(present(&state, &outcome.session, question).await),
        None => None,
    };

    Ok(Json(SubmitAnswerResponse {
        success: true,
        message,
        next_question,
        is_interview_complete: outcome.is_complete,
    }))
}

pub async fn handle_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation(
            "Message must not be blank".to_string(),
        ));
    }
    let current = session::get_session(&state.db, session_id).await?;
    let utterance = conversation::handle_clarification(
        &state.db,
        state.completion.as_ref(),
        &current,
        &req.message,
    )
    .await;
    Ok(Json(ConversationResponse {
        response: utterance.text,
    }))
}

pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<EvaluationResponse>, AppError> {
    let current = session::get_session(&state.db, session_id).await?;
    let evaluation: Option<EvaluationRow> =
        sqlx::query_as("SELECT * FROM interview_evaluations WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&state.db)
            .await?;
    let evaluation = evaluation.ok_or_else(|| {
        AppError::NotFound(format!(
            "No evaluation is available yet for session {session_id}"
        ))
    })?;

    Ok(Json(EvaluationResponse {
        session_id,
        candidate_name: current.candidate_name,
        overall_score: evaluation.overall_score,
        performance_level: evaluation.performance_level,
        total_questions: evaluation.total_questions,
        questions_answered: evaluation.questions_answered,
        questions_skipped: evaluation.questions_skipped,
        correct_answers: evaluation.correct_answers,
        accuracy_rate: evaluation.accuracy_rate,
        mcq_score: evaluation.mcq_score,
        descriptive_score: evaluation.descriptive_score,
        topic_scores: evaluation.topic_scores,
        average_response_time: evaluation.average_response_time,
        consistency_score: evaluation.consistency_score,
        communication_quality: evaluation.communication_quality,
        performance_summary: evaluation.performance_summary,
        detailed_analysis: evaluation.detailed_analysis,
        recommendations: evaluation.recommendations,
        percentile_rank: evaluation.percentile_rank,
        evaluated_at: evaluation.evaluated_at,
    }))
}

pub async fn handle_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let status_rows: Vec<(InterviewStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM interview_sessions GROUP BY status")
            .fetch_all(&state.db)
            .await?;
    let total_sessions = status_rows.iter().map(|(_, n)| n).sum();

    let (average_score,): (Option<f64>,) = sqlx::query_as(
        "SELECT AVG(overall_score) FROM interview_sessions WHERE overall_score IS NOT NULL",
    )
    .fetch_one(&state.db)
    .await?;

    let level_rows: Vec<(PerformanceLevel, i64)> = sqlx::query_as(
        "SELECT performance_level, COUNT(*) FROM interview_sessions \
         WHERE performance_level IS NOT NULL GROUP BY performance_level",
    )
    .fetch_all(&state.db)
    .await?;

    let topic_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT topic, COUNT(*) FROM interview_sessions, unnest(topics) AS topic \
         GROUP BY topic ORDER BY COUNT(*) DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(StatsResponse {
        total_sessions,
        sessions_by_status: status_rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        average_score,
        level_distribution: level_rows
            .into_iter()
            .map(|(performance_level, count)| LevelCount {
                performance_level,
                count,
            })
            .collect(),
        popular_topics: topic_rows
            .into_iter()
            .map(|(topic, count)| TopicCount { topic, count })
            .collect(),
    }))
}

/// Dry-run selection: reports the pool shape and a candidate question set
/// without creating a session.
pub async fn handle_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let topics: Vec<String> = req
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
    if !(session::MIN_QUESTIONS..=session::MAX_QUESTIONS).contains(&req.total_questions) {
        return Err(AppError::Validation(format!(
            "Question count must be between {} and {}, got {}",
            session::MIN_QUESTIONS,
            session::MAX_QUESTIONS,
            req.total_questions
        )));
    }

    let pool = selector::pool_statistics(&state.db, &topics).await?;
    let outcome = selector::select_questions(
        &state.db,
        &topics,
        req.total_questions as usize,
        req.difficulty_level,
    )
    .await?;

    Ok(Json(PreviewResponse {
        pool,
        selection_strategy: outcome.strategy,
        questions: outcome
            .questions
            .into_iter()
            .map(|q| PreviewQuestion {
                question_id: q.id,
                question_text: q.question,
                question_type: q.question_type,
                topic: q.tag,
            })
            .collect(),
    }))
}

async fn present(
    state: &AppState,
    current: &SessionRow,
    question: QuestionRow,
) -> QuestionPresentation {
    let utterance = conversation::present_question(
        &state.db,
        state.completion.as_ref(),
        current,
        &question,
    )
    .await;
    QuestionPresentation {
        question_id: question.id,
        question_text: question.question,
        question_type: question.question_type,
        options: question.options,
        topic: question.tag,
        context: utterance.text,
        question_number: current.current_question_index + 1,
        total_questions: current.total_questions,
    }
}
