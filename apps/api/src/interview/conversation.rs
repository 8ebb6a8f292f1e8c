//! Conversation driver: phrases questions, acknowledgments, clarifications,
//! and the closing message through the completion service.
//!
//! Phrasing is cosmetic, never authoritative: every method degrades to a
//! deterministic template on any completion failure, so a backend outage can
//! never block session progression. The model-facing half of each operation
//! is split from persistence so it can be exercised against a stub service.

use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::completion::{ChatTurn, CompletionService};
use crate::interview::prompts::{
    ACKNOWLEDGE_TEMPLATE, CLARIFY_TEMPLATE, COMPLETION_TEMPLATE, INTERVIEWER_SYSTEM_TEMPLATE,
    PRESENT_QUESTION_TEMPLATE,
};
use crate::models::question::{QuestionRow, QuestionType};
use crate::models::session::SessionRow;

/// The rolling log keeps this many most-recent entries; older ones are
/// evicted silently. Grading never reads this log.
pub const ROLLING_LOG_CAP: usize = 20;

/// How many trailing log entries are replayed as model context per call.
const CONTEXT_WINDOW: usize = 8;

/// A line spoken to the candidate, with provenance so callers and tests can
/// tell a model phrasing from a deterministic fallback.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub from_model: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Public driver operations
// ────────────────────────────────────────────────────────────────────────────

/// Phrases the question conversationally and appends the exchange to the
/// rolling log. Never fails: a completion error yields the templated
/// presentation instead.
pub async fn present_question(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
    question: &QuestionRow,
) -> Utterance {
    let (utterance, prompt) = phrase_question(completion, session, question).await;
    if utterance.from_model {
        record_exchange(pool, session, prompt, &utterance.text).await;
    }
    utterance
}

/// Acknowledges the answer without judging it. Fixed fallback string on
/// failure.
pub async fn acknowledge_answer(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
    question: &QuestionRow,
    answer: &str,
) -> Utterance {
    let (utterance, prompt) = phrase_acknowledgment(completion, session, question, answer).await;
    if utterance.from_model {
        record_exchange(pool, session, prompt, &utterance.text).await;
    }
    utterance
}

/// Free-form clarification; the question pointer is untouched.
pub async fn handle_clarification(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
    message: &str,
) -> Utterance {
    let (utterance, prompt) = phrase_clarification(completion, session, message).await;
    if utterance.from_model {
        record_exchange(pool, session, prompt, &utterance.text).await;
    }
    utterance
}

/// Closing message once the session is exhausted. The exchange still lands
/// in the rolling log so the persisted transcript ends with the farewell.
pub async fn completion_message(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
) -> Utterance {
    let (utterance, prompt) = phrase_completion(completion, session).await;
    if utterance.from_model {
        record_exchange(pool, session, prompt, &utterance.text).await;
    }
    utterance
}

// ────────────────────────────────────────────────────────────────────────────
// Model-facing halves (no persistence, testable with a stub service)
// ────────────────────────────────────────────────────────────────────────────

async fn phrase_question(
    completion: &dyn CompletionService,
    session: &SessionRow,
    question: &QuestionRow,
) -> (Utterance, String) {
    let question_number = session.current_question_index + 1;
    let question_json = serde_json::to_string_pretty(&json!({
        "question_text": question.question,
        "question_type": question.question_type,
        "options": question.options,
        "topic": question.tag,
        "question_number": question_number,
        "total_questions": session.total_questions,
    }))
    .unwrap_or_default();

    let prompt = PRESENT_QUESTION_TEMPLATE.replace("{question_json}", &question_json);
    let mut turns = build_context(session);
    turns.push(ChatTurn::user(prompt.clone()));

    match completion.complete(&system_prompt(session), &turns).await {
        Ok(text) => (
            Utterance {
                text,
                from_model: true,
            },
            prompt,
        ),
        Err(e) => {
            warn!("Question presentation failed, using fallback: {e}");
            (
                Utterance {
                    text: fallback_presentation(
                        question,
                        question_number,
                        session.total_questions,
                    ),
                    from_model: false,
                },
                prompt,
            )
        }
    }
}

async fn phrase_acknowledgment(
    completion: &dyn CompletionService,
    session: &SessionRow,
    question: &QuestionRow,
    answer: &str,
) -> (Utterance, String) {
    let prompt = ACKNOWLEDGE_TEMPLATE
        .replace("{question}", &question.question)
        .replace("{answer}", answer);
    let mut turns = build_context(session);
    turns.push(ChatTurn::user(prompt.clone()));

    match completion.complete(&system_prompt(session), &turns).await {
        Ok(text) => (
            Utterance {
                text,
                from_model: true,
            },
            prompt,
        ),
        Err(e) => {
            warn!("Answer acknowledgment failed, using fallback: {e}");
            (
                Utterance {
                    text: "Thank you for your answer. Let's continue with the next question."
                        .to_string(),
                    from_model: false,
                },
                prompt,
            )
        }
    }
}

async fn phrase_clarification(
    completion: &dyn CompletionService,
    session: &SessionRow,
    message: &str,
) -> (Utterance, String) {
    let prompt = CLARIFY_TEMPLATE.replace("{message}", message);
    let mut turns = build_context(session);
    turns.push(ChatTurn::user(prompt.clone()));

    match completion.complete(&system_prompt(session), &turns).await {
        Ok(text) => (
            Utterance {
                text,
                from_model: true,
            },
            prompt,
        ),
        Err(e) => {
            warn!("Clarification handling failed, using fallback: {e}");
            (
                Utterance {
                    text: "I understand you need clarification. Could you please rephrase \
                           your question?"
                        .to_string(),
                    from_model: false,
                },
                prompt,
            )
        }
    }
}

async fn phrase_completion(
    completion: &dyn CompletionService,
    session: &SessionRow,
) -> (Utterance, String) {
    let prompt = COMPLETION_TEMPLATE
        .replace("{candidate_name}", &session.candidate_name)
        .replace("{total_questions}", &session.total_questions.to_string());
    let turns = vec![ChatTurn::user(prompt.clone())];

    match completion.complete(&system_prompt(session), &turns).await {
        Ok(text) => (
            Utterance {
                text: text.trim_matches('"').to_string(),
                from_model: true,
            },
            prompt,
        ),
        Err(e) => {
            warn!("Completion message generation failed, using template: {e}");
            (
                Utterance {
                    text: format!(
                        "Congratulations {}! You've completed all {} questions. \
                         Your responses will be evaluated and you'll receive feedback soon. \
                         Thank you for your time!",
                        session.candidate_name, session.total_questions
                    ),
                    from_model: false,
                },
                prompt,
            )
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Context building and the rolling log
// ────────────────────────────────────────────────────────────────────────────

fn system_prompt(session: &SessionRow) -> String {
    let question_number = (session.current_question_index + 1).min(session.total_questions);
    INTERVIEWER_SYSTEM_TEMPLATE
        .replace("{candidate_name}", &session.candidate_name)
        .replace("{topics}", &session.topics.join(", "))
        .replace("{question_number}", &question_number.to_string())
        .replace("{total_questions}", &session.total_questions.to_string())
        .replace(
            "{difficulty}",
            &format!("{:?}", session.difficulty_level).to_lowercase(),
        )
}

/// Replays up to the last [`CONTEXT_WINDOW`] rolling-log entries.
fn build_context(session: &SessionRow) -> Vec<ChatTurn> {
    let history = session.history();
    let start = history.len().saturating_sub(CONTEXT_WINDOW);
    history[start..].to_vec()
}

/// Deterministic presentation used when the completion service is down:
/// question number, raw text, lettered options for mcq.
pub fn fallback_presentation(question: &QuestionRow, number: i32, total: i32) -> String {
    let mut presentation = format!(
        "Question {number} of {total}:\n\n{}",
        question.question
    );

    match (question.question_type, &question.options) {
        (QuestionType::Mcq, Some(options)) if !options.is_empty() => {
            presentation.push_str("\n\nOptions:\n");
            for (i, option) in options.iter().enumerate() {
                let letter = (b'A' + i as u8) as char;
                presentation.push_str(&format!("{letter}. {option}\n"));
            }
            presentation.push_str("\nPlease select the best answer.");
        }
        _ => {
            presentation.push_str(
                "\n\nPlease provide your answer with as much detail as you think is appropriate.",
            );
        }
    }

    presentation
}

/// Evicts the oldest entries beyond the cap. Append-then-trim keeps the
/// window anchored to the most recent exchanges.
pub fn trim_history(history: &mut Vec<ChatTurn>) {
    if history.len() > ROLLING_LOG_CAP {
        let excess = history.len() - ROLLING_LOG_CAP;
        history.drain(0..excess);
    }
}

/// Appends one prompt/reply pair to the session's rolling log, best-effort.
/// The log is presentation context, not authoritative state; persistence
/// failures are logged and never surface to the caller.
async fn record_exchange(pool: &PgPool, session: &SessionRow, prompt: String, reply: &str) {
    let mut history = session.history();
    history.push(ChatTurn::user(prompt));
    history.push(ChatTurn::assistant(reply));
    trim_history(&mut history);
    persist_history(pool, session.id, &history).await;
}

async fn persist_history(pool: &PgPool, session_id: Uuid, history: &[ChatTurn]) {
    let value = match serde_json::to_value(history) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to serialize conversation history for {session_id}: {e}");
            return;
        }
    };
    let result = sqlx::query("UPDATE interview_sessions SET conversation_history = $1 WHERE id = $2")
        .bind(value)
        .bind(session_id)
        .execute(pool)
        .await;
    if let Err(e) = result {
        warn!("Failed to persist conversation history for {session_id}: {e}");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::StubCompletion;
    use crate::models::session::{Difficulty, InterviewStatus};
    use chrono::Utc;

    fn make_session(history: Vec<ChatTurn>) -> SessionRow {
        SessionRow {
            id: Uuid::new_v4(),
            candidate_name: "Grace".to_string(),
            candidate_email: None,
            topics: vec!["sql".to_string(), "indexes".to_string()],
            total_questions: 5,
            difficulty_level: Difficulty::Mixed,
            status: InterviewStatus::Active,
            current_question_index: 1,
            questions_asked: vec![Uuid::new_v4(); 5],
            conversation_history: serde_json::to_value(history).unwrap(),
            started_at: Utc::now(),
            completed_at: None,
            total_duration_minutes: None,
            overall_score: None,
            performance_level: None,
        }
    }

    fn make_mcq() -> QuestionRow {
        QuestionRow {
            id: Uuid::new_v4(),
            question: "Which index type suits range scans?".to_string(),
            answer: "B-tree".to_string(),
            question_type: QuestionType::Mcq,
            options: Some(vec![
                "Hash".to_string(),
                "B-tree".to_string(),
                "Bitmap".to_string(),
            ]),
            tag: "indexes".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fallback_presentation_letters_mcq_options() {
        let text = fallback_presentation(&make_mcq(), 2, 5);
        assert!(text.starts_with("Question 2 of 5:"));
        assert!(text.contains("A. Hash"));
        assert!(text.contains("B. B-tree"));
        assert!(text.contains("C. Bitmap"));
        assert!(text.contains("Please select the best answer."));
    }

    #[test]
    fn test_fallback_presentation_descriptive_invites_detail() {
        let mut question = make_mcq();
        question.question_type = QuestionType::Descriptive;
        question.options = None;
        let text = fallback_presentation(&question, 1, 5);
        assert!(text.contains("as much detail"));
        assert!(!text.contains("Options:"));
    }

    #[test]
    fn test_trim_history_evicts_oldest_first() {
        let mut history: Vec<ChatTurn> = (0..25).map(|i| ChatTurn::user(format!("m{i}"))).collect();
        trim_history(&mut history);
        assert_eq!(history.len(), ROLLING_LOG_CAP);
        match &history[0] {
            ChatTurn::User { content } => assert_eq!(content, "m5"),
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn test_build_context_takes_last_eight() {
        let history: Vec<ChatTurn> = (0..12).map(|i| ChatTurn::user(format!("m{i}"))).collect();
        let session = make_session(history);
        let context = build_context(&session);
        assert_eq!(context.len(), 8);
        match &context[0] {
            ChatTurn::User { content } => assert_eq!(content, "m4"),
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn test_system_prompt_names_candidate_and_progress() {
        let session = make_session(vec![]);
        let prompt = system_prompt(&session);
        assert!(prompt.contains("Grace"));
        assert!(prompt.contains("sql, indexes"));
        assert!(prompt.contains("Question 2 of 5"));
        assert!(prompt.contains("mixed"));
    }

    #[tokio::test]
    async fn test_phrase_question_falls_back_on_failure() {
        let completion = StubCompletion::failing();
        let session = make_session(vec![]);
        let (utterance, _) = phrase_question(&completion, &session, &make_mcq()).await;
        assert!(!utterance.from_model);
        assert!(utterance.text.contains("Question 2 of 5"));
        assert!(utterance.text.contains("B. B-tree"));
    }

    #[tokio::test]
    async fn test_phrase_acknowledgment_passes_model_text_through() {
        let completion = StubCompletion::replying("Thanks, noted. On we go!");
        let session = make_session(vec![]);
        let (utterance, prompt) =
            phrase_acknowledgment(&completion, &session, &make_mcq(), "B-tree").await;
        assert!(utterance.from_model);
        assert_eq!(utterance.text, "Thanks, noted. On we go!");
        assert!(prompt.contains("B-tree"));
    }

    #[tokio::test]
    async fn test_phrase_clarification_falls_back_on_failure() {
        let completion = StubCompletion::failing();
        let session = make_session(vec![]);
        let (utterance, _) = phrase_clarification(&completion, &session, "what is an index?").await;
        assert!(!utterance.from_model);
        assert!(utterance.text.contains("rephrase"));
    }

    #[tokio::test]
    async fn test_phrase_completion_falls_back_with_name_and_count() {
        let completion = StubCompletion::failing();
        let session = make_session(vec![]);
        let (utterance, _) = phrase_completion(&completion, &session).await;
        assert!(!utterance.from_model);
        assert!(utterance.text.contains("Grace"));
        assert!(utterance.text.contains('5'));
    }

    #[tokio::test]
    async fn test_phrase_completion_returns_prompt_for_the_log() {
        let completion = StubCompletion::replying("\"Great work today, Grace!\"");
        let session = make_session(vec![]);
        let (utterance, prompt) = phrase_completion(&completion, &session).await;
        assert!(utterance.from_model);
        assert_eq!(utterance.text, "Great work today, Grace!");
        assert!(prompt.contains("Grace"));
    }
}
