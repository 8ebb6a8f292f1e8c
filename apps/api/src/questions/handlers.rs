use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::question::QuestionRow;
use crate::questions::generate::{generate_and_save, GenerationKind};
use crate::questions::{insert_questions, list_questions, NewQuestion};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuestionsQuery {
    pub tag: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<QuestionRow>,
    pub count: usize,
}

/// GET /api/v1/questions
pub async fn handle_list_questions(
    State(state): State<AppState>,
    Query(params): Query<ListQuestionsQuery>,
) -> Result<Json<QuestionListResponse>, AppError> {
    if !(1..=1000).contains(&params.limit) || params.offset < 0 {
        return Err(AppError::Validation(
            "limit must be 1-1000 and offset non-negative".to_string(),
        ));
    }
    let questions = list_questions(
        &state.db,
        params.tag.as_deref(),
        params.limit,
        params.offset,
    )
    .await?;
    let count = questions.len();
    Ok(Json(QuestionListResponse { questions, count }))
}

#[derive(Deserialize)]
pub struct CreateQuestionsRequest {
    pub questions: Vec<NewQuestion>,
}

#[derive(Serialize)]
pub struct CreateQuestionsResponse {
    pub inserted: usize,
}

/// POST /api/v1/questions
pub async fn handle_create_questions(
    State(state): State<AppState>,
    Json(req): Json<CreateQuestionsRequest>,
) -> Result<Json<CreateQuestionsResponse>, AppError> {
    let inserted = insert_questions(&state.db, &req.questions).await?;
    Ok(Json(CreateQuestionsResponse { inserted }))
}

#[derive(Deserialize)]
pub struct GenerateQuestionsRequest {
    pub topic: String,
    pub number: u32,
    pub question_type: GenerationKind,
}

#[derive(Serialize)]
pub struct GenerateQuestionsResponse {
    pub success: bool,
    pub message: String,
    pub questions_generated: usize,
}

/// POST /api/v1/questions/generate
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    Json(req): Json<GenerateQuestionsRequest>,
) -> Result<Json<GenerateQuestionsResponse>, AppError> {
    if req.topic.trim().is_empty() {
        return Err(AppError::Validation("Topic must not be empty".to_string()));
    }
    if !(1..=50).contains(&req.number) {
        return Err(AppError::Validation(
            "number must be between 1 and 50".to_string(),
        ));
    }

    let saved = generate_and_save(
        &state.db,
        state.completion.as_ref(),
        req.topic.trim(),
        req.number,
        req.question_type,
    )
    .await?;

    Ok(Json(GenerateQuestionsResponse {
        success: true,
        message: format!("Successfully generated {saved} questions for '{}'", req.topic.trim()),
        questions_generated: saved,
    }))
}
