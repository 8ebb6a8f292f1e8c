pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::interview::handlers as interview;
use crate::questions::handlers as questions;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handle_health))
        .route(
            "/api/v1/interviews",
            post(interview::handle_start_interview).get(interview::handle_list_sessions),
        )
        .route("/api/v1/interviews/stats", get(interview::handle_stats))
        .route(
            "/api/v1/interviews/:id/question",
            get(interview::handle_current_question),
        )
        .route(
            "/api/v1/interviews/:id/answer",
            post(interview::handle_submit_answer),
        )
        .route(
            "/api/v1/interviews/:id/conversation",
            post(interview::handle_conversation),
        )
        .route(
            "/api/v1/interviews/:id/evaluation",
            get(interview::handle_get_evaluation),
        )
        .route(
            "/api/v1/questions",
            get(questions::handle_list_questions).post(questions::handle_create_questions),
        )
        .route(
            "/api/v1/questions/generate",
            post(questions::handle_generate_questions),
        )
        .route("/api/v1/questions/preview", post(interview::handle_preview))
        .with_state(state)
}
