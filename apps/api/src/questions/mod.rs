//! Question repository: the stored pool the interview core selects from.
//!
//! Questions are write-once: the generation flow (or a bulk insert) creates
//! them and the interview side only reads. There is no update or delete
//! surface.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::question::{QuestionRow, QuestionType};

pub mod generate;
pub mod handlers;
pub mod prompts;

/// A question to be inserted: everything but the generated id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub tag: String,
}

/// Rejects structurally invalid questions before anything is persisted:
/// blank text fields, and mcq questions without at least two options.
pub fn validate_new_question(q: &NewQuestion) -> Result<(), AppError> {
    if q.question.trim().is_empty() {
        return Err(AppError::Validation("Question text must not be empty".to_string()));
    }
    if q.answer.trim().is_empty() {
        return Err(AppError::Validation("Answer must not be empty".to_string()));
    }
    if q.tag.trim().is_empty() {
        return Err(AppError::Validation("Tag must not be empty".to_string()));
    }
    match q.question_type {
        QuestionType::Mcq => {
            let option_count = q.options.as_ref().map(|o| o.len()).unwrap_or(0);
            if option_count < 2 {
                return Err(AppError::Validation(
                    "MCQ questions require at least two options".to_string(),
                ));
            }
        }
        QuestionType::Descriptive => {}
    }
    Ok(())
}

pub async fn get_question(pool: &PgPool, id: Uuid) -> Result<Option<QuestionRow>, AppError> {
    let question: Option<QuestionRow> = sqlx::query_as("SELECT * FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(question)
}

/// Fetches the union of questions across the given tags. Each question
/// carries exactly one tag, so the union is duplicate-free by construction;
/// the selector still deduplicates by id.
pub async fn fetch_by_tags(pool: &PgPool, tags: &[String]) -> Result<Vec<QuestionRow>, AppError> {
    let questions: Vec<QuestionRow> =
        sqlx::query_as("SELECT * FROM questions WHERE tag = ANY($1) ORDER BY tag")
            .bind(tags)
            .fetch_all(pool)
            .await?;
    Ok(questions)
}

/// Lists questions with optional tag filter and pagination, ordered by tag.
pub async fn list_questions(
    pool: &PgPool,
    tag: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<QuestionRow>, AppError> {
    let questions: Vec<QuestionRow> = match tag {
        Some(tag) => {
            sqlx::query_as(
                "SELECT * FROM questions WHERE tag = $1 ORDER BY tag, created_at LIMIT $2 OFFSET $3",
            )
            .bind(tag)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM questions ORDER BY tag, created_at LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(questions)
}

/// Validates and inserts a batch of questions. All-or-nothing: one invalid
/// question rejects the whole batch before any row is written.
pub async fn insert_questions(pool: &PgPool, questions: &[NewQuestion]) -> Result<usize, AppError> {
    if questions.is_empty() {
        return Err(AppError::Validation("No questions provided".to_string()));
    }
    for q in questions {
        validate_new_question(q)?;
    }

    let mut tx = pool.begin().await?;
    for q in questions {
        sqlx::query(
            r#"
            INSERT INTO questions (id, question, answer, question_type, options, tag)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&q.question)
        .bind(&q.answer)
        .bind(q.question_type)
        .bind(&q.options)
        .bind(&q.tag)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Inserted {} questions", questions.len());
    Ok(questions.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(options: Option<Vec<&str>>) -> NewQuestion {
        NewQuestion {
            question: "Which clause filters grouped rows?".to_string(),
            answer: "HAVING".to_string(),
            question_type: QuestionType::Mcq,
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            tag: "sql".to_string(),
        }
    }

    #[test]
    fn test_valid_mcq_passes() {
        assert!(validate_new_question(&mcq(Some(vec!["WHERE", "HAVING"]))).is_ok());
    }

    #[test]
    fn test_mcq_without_options_rejected() {
        assert!(matches!(
            validate_new_question(&mcq(None)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_mcq_with_single_option_rejected() {
        assert!(validate_new_question(&mcq(Some(vec!["HAVING"]))).is_err());
    }

    #[test]
    fn test_blank_question_text_rejected() {
        let mut q = mcq(Some(vec!["WHERE", "HAVING"]));
        q.question = "   ".to_string();
        assert!(validate_new_question(&q).is_err());
    }

    #[test]
    fn test_descriptive_needs_no_options() {
        let q = NewQuestion {
            question: "Explain normalization.".to_string(),
            answer: "Organizing data to reduce redundancy".to_string(),
            question_type: QuestionType::Descriptive,
            options: None,
            tag: "sql".to_string(),
        };
        assert!(validate_new_question(&q).is_ok());
    }
}
