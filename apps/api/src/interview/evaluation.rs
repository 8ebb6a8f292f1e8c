//! Evaluation engine: grades each recorded response, aggregates session
//! metrics, and persists the evaluation report.
//!
//! Model output is treated as untrusted text: grading and insight replies go
//! through line-oriented parsers, and every model-dependent step has a
//! deterministic fallback so an evaluation always produces a report.

use std::collections::BTreeMap;

use serde_json::json;
use sqlx::PgPool;
use tracing::warn;

use crate::completion::CompletionService;
use crate::errors::AppError;
use crate::interview::prompts::{GRADING_TEMPLATE, INSIGHTS_TEMPLATE};
use crate::models::evaluation::EvaluationRow;
use crate::models::question::QuestionType;
use crate::models::response::ResponseRow;
use crate::models::session::{PerformanceLevel, SessionRow};

/// At least this many prior evaluations are needed before a percentile rank
/// is reported.
const PERCENTILE_MIN_SAMPLE: i64 = 5;

/// Recommendations are capped at this many entries.
const MAX_RECOMMENDATIONS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Per-response grading
// ────────────────────────────────────────────────────────────────────────────

/// Grade for a single response, either model-produced or from the
/// deterministic fallback grader.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseGrade {
    pub score: f64,
    /// None when correctness is not a meaningful judgment (descriptive
    /// fallback grading, or a grading reply that declined to say).
    pub is_correct: Option<bool>,
    pub feedback: String,
    pub notes: String,
}

/// Grades one response through the completion service, falling back to the
/// deterministic grader when the service fails or replies unparseably.
pub async fn grade_response(
    completion: &dyn CompletionService,
    response: &ResponseRow,
) -> ResponseGrade {
    let answer = effective_answer(response);
    let prompt = GRADING_TEMPLATE
        .replace("{question}", &response.question_text)
        .replace("{expected_answer}", &response.expected_answer)
        .replace(
            "{question_type}",
            &format!("{:?}", response.question_type).to_lowercase(),
        )
        .replace("{answer}", answer);

    let system = "You are a strict but fair technical interview grader. \
                  Follow the requested output format exactly.";

    match completion
        .complete(system, &[crate::completion::ChatTurn::user(prompt)])
        .await
    {
        Ok(text) => match parse_grading(&text, response.question_type) {
            Some(grade) => grade,
            None => {
                warn!(
                    response_id = %response.id,
                    "Grading reply unparseable, using fallback grader"
                );
                fallback_grade(response.question_type, answer, &response.expected_answer)
            }
        },
        Err(e) => {
            warn!(response_id = %response.id, "Grading call failed, using fallback grader: {e}");
            fallback_grade(response.question_type, answer, &response.expected_answer)
        }
    }
}

/// Mcq answers arrive as a selected option; descriptive ones as free text.
fn effective_answer(response: &ResponseRow) -> &str {
    match (&response.selected_option, response.question_type) {
        (Some(option), QuestionType::Mcq) if !option.trim().is_empty() => option,
        _ => &response.candidate_answer,
    }
}

/// Parses the `Score:` / `Correct:` / `Feedback:` / `Notes:` line format.
/// Returns `None` when no recognizable line is present. A missing or
/// out-of-range score defaults to 50; a missing or non-boolean correctness
/// flag stays unknown.
pub fn parse_grading(text: &str, question_type: QuestionType) -> Option<ResponseGrade> {
    let mut score: Option<f64> = None;
    let mut is_correct: Option<bool> = None;
    let mut feedback: Option<String> = None;
    let mut notes: Option<String> = None;
    let mut recognized = false;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = strip_label(line, "Score:") {
            recognized = true;
            if let Ok(value) = rest.trim_end_matches(&['%', '.'][..]).trim().parse::<f64>() {
                if (0.0..=100.0).contains(&value) {
                    score = Some(value);
                }
            }
        } else if let Some(rest) = strip_label(line, "Correct:") {
            recognized = true;
            let lowered = rest.to_lowercase();
            if lowered.starts_with("yes") || lowered.starts_with("true") {
                is_correct = Some(true);
            } else if lowered.starts_with("no") || lowered.starts_with("false") {
                is_correct = Some(false);
            }
            // "null" and anything else stay unknown
        } else if let Some(rest) = strip_label(line, "Feedback:") {
            recognized = true;
            if !rest.is_empty() {
                feedback = Some(rest.to_string());
            }
        } else if let Some(rest) = strip_label(line, "Notes:") {
            recognized = true;
            if !rest.is_empty() {
                notes = Some(rest.to_string());
            }
        }
    }

    if !recognized {
        return None;
    }

    let score = score.unwrap_or(50.0);
    Some(ResponseGrade {
        score,
        is_correct,
        feedback: feedback.unwrap_or_else(|| "Response evaluated.".to_string()),
        notes: notes.unwrap_or_else(|| {
            format!(
                "AI evaluation completed for {} question.",
                format!("{question_type:?}").to_lowercase()
            )
        }),
    })
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    match line.get(..label.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(label) => Some(line[label.len()..].trim()),
        _ => None,
    }
}

/// Deterministic grader used when model grading is unavailable.
///
/// Mcq: bidirectional case-insensitive substring match against the expected
/// answer, all or nothing. Descriptive: coarse length bands, since without
/// the model only effort can be judged.
pub fn fallback_grade(
    question_type: QuestionType,
    candidate_answer: &str,
    expected_answer: &str,
) -> ResponseGrade {
    let candidate = candidate_answer.trim();
    match question_type {
        QuestionType::Mcq => {
            let given = candidate.to_lowercase();
            let expected = expected_answer.trim().to_lowercase();
            let matched =
                !given.is_empty() && (given.contains(&expected) || expected.contains(&given));
            if matched {
                ResponseGrade {
                    score: 100.0,
                    is_correct: Some(true),
                    feedback: "Correct answer.".to_string(),
                    notes: "Graded by answer matching.".to_string(),
                }
            } else {
                ResponseGrade {
                    score: 0.0,
                    is_correct: Some(false),
                    feedback: format!("Incorrect. The expected answer was: {expected_answer}"),
                    notes: "Graded by answer matching.".to_string(),
                }
            }
        }
        QuestionType::Descriptive => {
            let words = candidate.split_whitespace().count();
            let score = if candidate.is_empty() {
                0.0
            } else if words >= 30 {
                75.0
            } else if words >= 15 {
                60.0
            } else if words >= 5 {
                45.0
            } else {
                25.0
            };
            ResponseGrade {
                score,
                is_correct: None,
                feedback: if candidate.is_empty() {
                    "No answer was provided.".to_string()
                } else {
                    "Answer recorded. Detailed feedback is unavailable for this response."
                        .to_string()
                },
                notes: "Graded by answer length heuristic.".to_string(),
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregate metrics
// ────────────────────────────────────────────────────────────────────────────

/// Fraction of responses graded correct, in `0.0..=1.0`, rounded to two
/// decimal places. Descriptive responses with unknown correctness count
/// against the rate.
pub fn accuracy_rate(correct_answers: i32, total_responses: usize) -> f64 {
    (f64::from(correct_answers) / total_responses as f64 * 100.0).round() / 100.0
}

/// Consistency of scoring across the session: `max(0, 100 - cv * 100)` where
/// cv is the coefficient of variation. Needs at least two scores; an
/// all-zero session is reported as 0 rather than dividing by zero.
pub fn consistency_score(scores: &[f64]) -> Option<f64> {
    if scores.len() < 2 {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    if mean == 0.0 {
        return Some(0.0);
    }
    let variance = scores
        .iter()
        .map(|s| (s - mean).powi(2))
        .sum::<f64>()
        / (scores.len() - 1) as f64;
    let stdev = variance.sqrt();
    Some((100.0 - (stdev / mean) * 100.0).max(0.0))
}

/// Coarse writing-quality score averaged over descriptive answers. Each
/// answer lands in a band by word and sentence count; blank answers score 0.
/// `None` when the session had no descriptive questions.
pub fn communication_quality(answers: &[&str]) -> Option<f64> {
    if answers.is_empty() {
        return None;
    }
    let total: f64 = answers
        .iter()
        .map(|answer| {
            let answer = answer.trim();
            if answer.is_empty() {
                return 0.0;
            }
            let words = answer.split_whitespace().count();
            let sentences = answer
                .split(&['.', '!', '?'][..])
                .filter(|s| !s.trim().is_empty())
                .count();
            if words >= 50 && sentences >= 3 {
                90.0
            } else if words >= 30 && sentences >= 2 {
                75.0
            } else if words >= 15 {
                60.0
            } else {
                30.0
            }
        })
        .sum();
    Some(total / answers.len() as f64)
}

// ────────────────────────────────────────────────────────────────────────────
// Insights
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Insights {
    pub summary: String,
    pub analysis: String,
    pub recommendations: Vec<String>,
}

/// Section-sniffing parser for the insights reply. Short heading-like lines
/// naming a summary, analysis, or recommendations section switch the target;
/// other lines accumulate into the current section, with bulleted or
/// numbered recommendation lines becoming entries, capped at five. Returns
/// `None` when nothing usable was found.
pub fn parse_insights(text: &str) -> Option<Insights> {
    #[derive(PartialEq)]
    enum Section {
        None,
        Summary,
        Analysis,
        Recommendations,
    }

    fn sniff_heading(line: &str) -> Option<Section> {
        let cleaned = line
            .trim_start_matches(&['#', '*'][..])
            .trim()
            .trim_end_matches(':')
            .to_lowercase();
        // Headings are short; a keyword inside a prose sentence is not one.
        if cleaned.split_whitespace().count() > 4 {
            return None;
        }
        if cleaned.contains("summary") || cleaned.contains("overview") {
            Some(Section::Summary)
        } else if cleaned.contains("analysis")
            || cleaned.contains("strength")
            || cleaned.contains("areas")
        {
            Some(Section::Analysis)
        } else if cleaned.contains("recommendation") || cleaned.contains("suggestion") {
            Some(Section::Recommendations)
        } else {
            None
        }
    }

    let mut section = Section::None;
    let mut summary = Vec::new();
    let mut analysis = Vec::new();
    let mut recommendations = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(next) = sniff_heading(line) {
            section = next;
            continue;
        }
        match section {
            Section::Summary => summary.push(line),
            Section::Analysis => analysis.push(line),
            Section::Recommendations => {
                if recommendations.len() < MAX_RECOMMENDATIONS {
                    let item = line
                        .trim_start_matches(&['-', '*', '•'][..])
                        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                        .trim();
                    if !item.is_empty() {
                        recommendations.push(item.to_string());
                    }
                }
            }
            Section::None => {}
        }
    }

    if summary.is_empty() && analysis.is_empty() && recommendations.is_empty() {
        return None;
    }
    Some(Insights {
        summary: summary.join(" "),
        analysis: analysis.join(" "),
        recommendations,
    })
}

/// Canned insights keyed by the overall score band, used when the model is
/// unavailable or its reply is unusable.
pub fn fallback_insights(overall_score: f64) -> Insights {
    let (summary, analysis) = if overall_score >= 80.0 {
        (
            "Strong performance across the interview with consistently high scores.",
            "The candidate demonstrated solid command of the covered topics and answered \
             most questions accurately.",
        )
    } else if overall_score >= 60.0 {
        (
            "Solid performance with room for improvement in some areas.",
            "The candidate handled many questions well but showed gaps on some topics that \
             targeted review would address.",
        )
    } else {
        (
            "Performance indicates significant gaps in the covered topics.",
            "The candidate struggled with a substantial portion of the questions and would \
             benefit from focused study before reassessment.",
        )
    };
    Insights {
        summary: summary.to_string(),
        analysis: analysis.to_string(),
        recommendations: vec![
            "Review performance feedback".to_string(),
            "Focus on weaker areas".to_string(),
            "Continue practicing".to_string(),
        ],
    }
}

async fn generate_insights(
    completion: &dyn CompletionService,
    session: &SessionRow,
    overall_score: f64,
    topic_scores: &BTreeMap<String, f64>,
    grades: &[(QuestionType, ResponseGrade)],
) -> Insights {
    let context = json!({
        "candidate_name": session.candidate_name,
        "topics": session.topics,
        "overall_score": overall_score,
        "topic_scores": topic_scores,
        "questions": grades
            .iter()
            .map(|(qtype, grade)| json!({
                "type": format!("{qtype:?}").to_lowercase(),
                "score": grade.score,
                "correct": grade.is_correct,
                "feedback": grade.feedback,
            }))
            .collect::<Vec<_>>(),
    });
    let prompt = INSIGHTS_TEMPLATE.replace(
        "{context}",
        &serde_json::to_string_pretty(&context).unwrap_or_default(),
    );
    let system = "You are an experienced technical interviewer writing a candid but \
                  constructive performance report.";

    match completion
        .complete(system, &[crate::completion::ChatTurn::user(prompt)])
        .await
    {
        Ok(text) => parse_insights(&text).unwrap_or_else(|| {
            warn!(session_id = %session.id, "Insights reply unparseable, using canned insights");
            fallback_insights(overall_score)
        }),
        Err(e) => {
            warn!(session_id = %session.id, "Insights call failed, using canned insights: {e}");
            fallback_insights(overall_score)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Percentile
// ────────────────────────────────────────────────────────────────────────────

/// Fraction of prior scores at or below this one, as a percentage rounded to
/// one decimal. Requires [`PERCENTILE_MIN_SAMPLE`] prior scores.
pub fn percentile_of(score: f64, prior_scores: &[f64]) -> Option<f64> {
    if (prior_scores.len() as i64) < PERCENTILE_MIN_SAMPLE {
        return None;
    }
    let at_or_below = prior_scores.iter().filter(|s| **s <= score).count();
    let rank = at_or_below as f64 / prior_scores.len() as f64 * 100.0;
    Some((rank * 10.0).round() / 10.0)
}

async fn trailing_percentile(pool: &PgPool, score: f64) -> Option<f64> {
    let result: Result<Vec<(f64,)>, sqlx::Error> = sqlx::query_as(
        "SELECT overall_score FROM interview_evaluations \
         WHERE evaluated_at >= now() - interval '90 days'",
    )
    .fetch_all(pool)
    .await;

    match result {
        Ok(rows) => {
            let scores: Vec<f64> = rows.into_iter().map(|(s,)| s).collect();
            percentile_of(score, &scores)
        }
        Err(e) => {
            warn!("Percentile query failed, omitting percentile rank: {e}");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Full-session evaluation
// ────────────────────────────────────────────────────────────────────────────

/// Grades every response, computes the aggregate metrics, generates the
/// narrative report, and persists everything: the evaluation row, per-response
/// grades, and the session's final score and level.
pub async fn evaluate_interview(
    pool: &PgPool,
    completion: &dyn CompletionService,
    session: &SessionRow,
    responses: &[ResponseRow],
) -> Result<EvaluationRow, AppError> {
    if responses.is_empty() {
        return Err(AppError::Validation(
            "Cannot evaluate a session with no recorded responses".to_string(),
        ));
    }

    let mut grades: Vec<(QuestionType, ResponseGrade)> = Vec::with_capacity(responses.len());
    for response in responses {
        let grade = grade_response(completion, response).await;
        grades.push((response.question_type, grade));
    }

    let scores: Vec<f64> = grades.iter().map(|(_, g)| g.score).collect();
    let overall_score = scores.iter().sum::<f64>() / scores.len() as f64;
    let correct_answers = grades
        .iter()
        .filter(|(_, g)| g.is_correct == Some(true))
        .count() as i32;
    let accuracy_rate = accuracy_rate(correct_answers, responses.len());
    let questions_answered = responses
        .iter()
        .filter(|r| !effective_answer(r).trim().is_empty())
        .count() as i32;
    let questions_skipped = responses.len() as i32 - questions_answered;

    let mcq_scores: Vec<f64> = grades
        .iter()
        .filter(|(t, _)| *t == QuestionType::Mcq)
        .map(|(_, g)| g.score)
        .collect();
    let descriptive_scores: Vec<f64> = grades
        .iter()
        .filter(|(t, _)| *t == QuestionType::Descriptive)
        .map(|(_, g)| g.score)
        .collect();
    let mean = |xs: &[f64]| {
        if xs.is_empty() {
            None
        } else {
            Some(xs.iter().sum::<f64>() / xs.len() as f64)
        }
    };

    let mut topic_buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (response, (_, grade)) in responses.iter().zip(&grades) {
        topic_buckets
            .entry(response.topic.clone())
            .or_default()
            .push(grade.score);
    }
    let topic_scores: BTreeMap<String, f64> = topic_buckets
        .into_iter()
        .map(|(topic, scores)| {
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            (topic, avg)
        })
        .collect();

    let response_times: Vec<f64> = responses
        .iter()
        .filter_map(|r| r.time_spent_seconds.map(f64::from))
        .collect();
    let descriptive_answers: Vec<&str> = responses
        .iter()
        .filter(|r| r.question_type == QuestionType::Descriptive)
        .map(|r| r.candidate_answer.as_str())
        .collect();

    let insights =
        generate_insights(completion, session, overall_score, &topic_scores, &grades).await;
    let percentile_rank = trailing_percentile(pool, overall_score).await;
    let performance_level = PerformanceLevel::from_score(overall_score);

    let evaluation: EvaluationRow = sqlx::query_as(
        "INSERT INTO interview_evaluations (
            session_id, total_questions, questions_answered, questions_skipped,
            mcq_questions, descriptive_questions, correct_answers,
            overall_score, performance_level,
            mcq_score, descriptive_score, accuracy_rate, topic_scores,
            average_response_time, consistency_score, communication_quality,
            performance_summary, detailed_analysis, recommendations, percentile_rank
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                   $17, $18, $19, $20)
         RETURNING *",
    )
    .bind(session.id)
    .bind(responses.len() as i32)
    .bind(questions_answered)
    .bind(questions_skipped)
    .bind(mcq_scores.len() as i32)
    .bind(descriptive_scores.len() as i32)
    .bind(correct_answers)
    .bind(overall_score)
    .bind(performance_level)
    .bind(mean(&mcq_scores))
    .bind(mean(&descriptive_scores))
    .bind(accuracy_rate)
    .bind(serde_json::to_value(&topic_scores).unwrap_or_else(|_| json!({})))
    .bind(mean(&response_times))
    .bind(consistency_score(&scores))
    .bind(communication_quality(&descriptive_answers))
    .bind(&insights.summary)
    .bind(&insights.analysis)
    .bind(&insights.recommendations)
    .bind(percentile_rank)
    .fetch_one(pool)
    .await?;

    for (response, (_, grade)) in responses.iter().zip(&grades) {
        sqlx::query(
            "UPDATE candidate_responses \
             SET score = $1, is_correct = $2, ai_feedback = $3, evaluation_notes = $4 \
             WHERE id = $5",
        )
        .bind(grade.score)
        .bind(grade.is_correct)
        .bind(&grade.feedback)
        .bind(&grade.notes)
        .bind(response.id)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "UPDATE interview_sessions SET overall_score = $1, performance_level = $2 WHERE id = $3",
    )
    .bind(overall_score)
    .bind(performance_level)
    .bind(session.id)
    .execute(pool)
    .await?;

    Ok(evaluation)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::StubCompletion;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_response(question_type: QuestionType, answer: &str) -> ResponseRow {
        ResponseRow {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            question_text: "What is a B-tree index?".to_string(),
            question_type,
            expected_answer: "A balanced tree structure".to_string(),
            options: None,
            topic: "indexes".to_string(),
            candidate_answer: answer.to_string(),
            selected_option: None,
            time_spent_seconds: Some(30),
            answered_at: Utc::now(),
            score: None,
            is_correct: None,
            ai_feedback: None,
            evaluation_notes: None,
        }
    }

    #[test]
    fn test_parse_grading_full_reply() {
        let text = "Score: 85\nCorrect: Yes\nFeedback: Good coverage.\nNotes: Minor gaps.";
        let grade = parse_grading(text, QuestionType::Descriptive).unwrap();
        assert_eq!(grade.score, 85.0);
        assert_eq!(grade.is_correct, Some(true));
        assert_eq!(grade.feedback, "Good coverage.");
        assert_eq!(grade.notes, "Minor gaps.");
    }

    #[test]
    fn test_parse_grading_defaults_missing_score_to_fifty() {
        let grade = parse_grading("Feedback: thin answer", QuestionType::Mcq).unwrap();
        assert_eq!(grade.score, 50.0);
        assert_eq!(grade.is_correct, None);
        assert!(grade.notes.contains("mcq"));
    }

    #[test]
    fn test_parse_grading_rejects_out_of_range_score() {
        let grade = parse_grading("Score: 150\nCorrect: no", QuestionType::Mcq).unwrap();
        assert_eq!(grade.score, 50.0);
    }

    #[test]
    fn test_parse_grading_prose_is_none() {
        assert!(parse_grading("The answer seems fine to me.", QuestionType::Mcq).is_none());
    }

    #[test]
    fn test_fallback_grade_mcq_substring_match_both_directions() {
        let grade = fallback_grade(QuestionType::Mcq, "The answer is B-tree", "b-tree");
        assert_eq!(grade.score, 100.0);
        assert_eq!(grade.is_correct, Some(true));

        let grade = fallback_grade(QuestionType::Mcq, "tree", "A balanced B-tree");
        assert_eq!(grade.score, 0.0);

        let grade = fallback_grade(QuestionType::Mcq, "b", "The answer is B");
        assert_eq!(grade.score, 100.0);
    }

    #[test]
    fn test_fallback_grade_mcq_empty_answer_never_matches() {
        let grade = fallback_grade(QuestionType::Mcq, "   ", "anything");
        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.is_correct, Some(false));
    }

    #[test]
    fn test_fallback_grade_descriptive_length_bands() {
        let twenty_words = "word ".repeat(20);
        let grade = fallback_grade(QuestionType::Descriptive, &twenty_words, "");
        assert_eq!(grade.score, 60.0);
        assert_eq!(grade.is_correct, None);

        let grade = fallback_grade(QuestionType::Descriptive, "short answer here now", "");
        assert_eq!(grade.score, 25.0);

        let grade = fallback_grade(QuestionType::Descriptive, "", "");
        assert_eq!(grade.score, 0.0);
    }

    #[test]
    fn test_accuracy_rate_is_a_fraction() {
        assert_eq!(accuracy_rate(2, 4), 0.5);
        assert_eq!(accuracy_rate(0, 5), 0.0);
        assert_eq!(accuracy_rate(3, 3), 1.0);
    }

    #[test]
    fn test_accuracy_rate_rounds_to_two_decimals() {
        assert_eq!(accuracy_rate(1, 3), 0.33);
        assert_eq!(accuracy_rate(2, 3), 0.67);
    }

    #[test]
    fn test_consistency_identical_scores_is_perfect() {
        assert_eq!(consistency_score(&[80.0, 80.0, 80.0]), Some(100.0));
    }

    #[test]
    fn test_consistency_zero_mean_is_zero() {
        assert_eq!(consistency_score(&[0.0, 0.0]), Some(0.0));
    }

    #[test]
    fn test_consistency_needs_two_scores() {
        assert_eq!(consistency_score(&[70.0]), None);
        assert_eq!(consistency_score(&[]), None);
    }

    #[test]
    fn test_consistency_wild_spread_clamps_at_zero() {
        let value = consistency_score(&[0.0, 100.0]).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_communication_quality_bands() {
        let long = format!(
            "{}. {}. {}.",
            "word ".repeat(20).trim(),
            "word ".repeat(20).trim(),
            "word ".repeat(20).trim()
        );
        assert_eq!(communication_quality(&[&long]), Some(90.0));
        assert_eq!(communication_quality(&["short"]), Some(30.0));
        assert_eq!(communication_quality(&["   "]), Some(0.0));
        assert_eq!(communication_quality(&[]), None);
    }

    #[test]
    fn test_parse_insights_sections_and_rec_cap() {
        let text = "## Summary\nStrong showing.\n## Analysis\nGood depth overall.\n\
                    ## Recommendations\n1. One\n2. Two\n3. Three\n4. Four\n5. Five\n6. Six";
        let insights = parse_insights(text).unwrap();
        assert_eq!(insights.summary, "Strong showing.");
        assert_eq!(insights.analysis, "Good depth overall.");
        assert_eq!(insights.recommendations.len(), 5);
        assert_eq!(insights.recommendations[0], "One");
    }

    #[test]
    fn test_parse_insights_accepts_heading_synonyms() {
        let text = "Overview:\nSolid session.\nStrengths and areas:\nStrong on joins.\n\
                    Suggestions:\n- Practice window functions";
        let insights = parse_insights(text).unwrap();
        assert_eq!(insights.summary, "Solid session.");
        assert_eq!(insights.analysis, "Strong on joins.");
        assert_eq!(insights.recommendations, vec!["Practice window functions"]);
    }

    #[test]
    fn test_parse_insights_empty_is_none() {
        assert!(parse_insights("no headings here at all").is_none());
        assert!(parse_insights("").is_none());
    }

    #[test]
    fn test_fallback_insights_bands() {
        assert!(fallback_insights(85.0).summary.contains("Strong"));
        assert!(fallback_insights(65.0).summary.contains("Solid"));
        assert!(fallback_insights(40.0).summary.contains("gaps"));
        assert_eq!(fallback_insights(85.0).recommendations.len(), 3);
    }

    #[test]
    fn test_percentile_needs_five_prior_scores() {
        assert_eq!(percentile_of(70.0, &[60.0, 65.0, 70.0, 75.0]), None);
        let prior = [50.0, 60.0, 70.0, 80.0, 90.0];
        assert_eq!(percentile_of(70.0, &prior), Some(60.0));
        assert_eq!(percentile_of(95.0, &prior), Some(100.0));
        assert_eq!(percentile_of(40.0, &prior), Some(0.0));
    }

    #[tokio::test]
    async fn test_grade_response_parses_model_reply() {
        let completion =
            StubCompletion::replying("Score: 92\nCorrect: Yes\nFeedback: Excellent.\nNotes: n/a");
        let response = make_response(QuestionType::Descriptive, "a thorough answer");
        let grade = grade_response(&completion, &response).await;
        assert_eq!(grade.score, 92.0);
        assert_eq!(grade.is_correct, Some(true));
    }

    #[tokio::test]
    async fn test_grade_response_falls_back_on_failure() {
        let completion = StubCompletion::failing();
        let mut response = make_response(QuestionType::Mcq, "");
        response.selected_option = Some("A balanced tree structure".to_string());
        let grade = grade_response(&completion, &response).await;
        assert_eq!(grade.score, 100.0);
        assert!(grade.notes.contains("answer matching"));
    }
}
