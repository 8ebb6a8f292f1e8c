//! Direct AI question generation: one completion call produces a JSON batch
//! of questions for a topic, which is validated and inserted.
//!
//! Unlike the interview path, a completion failure here is surfaced to the
//! caller: silently fabricating fallback questions would poison the pool.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::completion::{strip_json_fences, ChatTurn, CompletionService};
use crate::errors::AppError;
use crate::models::question::QuestionType;
use crate::questions::prompts::{
    GENERATION_PROMPT_TEMPLATE, GENERATION_SYSTEM, TYPE_DESCRIPTIVE, TYPE_MCQ, TYPE_MIXED,
};
use crate::questions::{insert_questions, NewQuestion};

/// Requested type mix for a generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Mcq,
    Descriptive,
    Mixed,
}

/// Shape the model is asked to return; the tag is ours, not the model's.
#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    question: String,
    answer: String,
    question_type: QuestionType,
    options: Option<Vec<String>>,
}

/// Generates `count` questions for `topic`, validates them, and inserts the
/// batch. Returns the number of questions saved.
pub async fn generate_and_save(
    pool: &PgPool,
    completion: &dyn CompletionService,
    topic: &str,
    count: u32,
    kind: GenerationKind,
) -> Result<usize, AppError> {
    let prompt = build_generation_prompt(topic, count, kind);
    let turns = vec![ChatTurn::user(prompt)];

    let raw = completion
        .complete(GENERATION_SYSTEM, &turns)
        .await
        .map_err(|e| AppError::Completion(format!("Question generation failed: {e}")))?;

    let questions = parse_generated(&raw, topic)?;
    let saved = insert_questions(pool, &questions).await?;

    info!("Generated and saved {saved} questions for topic '{topic}'");
    Ok(saved)
}

fn build_generation_prompt(topic: &str, count: u32, kind: GenerationKind) -> String {
    let type_instruction = match kind {
        GenerationKind::Mcq => TYPE_MCQ,
        GenerationKind::Descriptive => TYPE_DESCRIPTIVE,
        GenerationKind::Mixed => TYPE_MIXED,
    };
    GENERATION_PROMPT_TEMPLATE
        .replace("{topic}", topic)
        .replace("{count}", &count.to_string())
        .replace("{type_instruction}", type_instruction)
}

/// Parses the model's JSON array, stripping markdown fences if present.
/// A malformed payload is a completion error; there is no fallback content.
fn parse_generated(raw: &str, topic: &str) -> Result<Vec<NewQuestion>, AppError> {
    let text = strip_json_fences(raw);
    let generated: Vec<GeneratedQuestion> = serde_json::from_str(text)
        .map_err(|e| AppError::Completion(format!("Unparsable generation output: {e}")))?;

    if generated.is_empty() {
        return Err(AppError::Completion(
            "Model returned an empty question batch".to_string(),
        ));
    }

    Ok(generated
        .into_iter()
        .map(|g| NewQuestion {
            question: g.question,
            answer: g.answer,
            question_type: g.question_type,
            options: g.options,
            tag: topic.to_string(),
        })
        .collect())
}
