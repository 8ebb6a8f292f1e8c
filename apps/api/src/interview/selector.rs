//! Question selector: picks a balanced subset of the pool for a session.
//!
//! Pure read + compute: the repository is never mutated, and the selection
//! policy lives in free functions over an injected RNG so the math is
//! testable without a database. Returned order is shuffled and carries no
//! difficulty signal.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::question::{QuestionRow, QuestionType};
use crate::models::session::Difficulty;
use crate::questions::fetch_by_tags;

/// Share of mcq questions targeted by mixed/medium selection.
const MCQ_SHARE: f64 = 0.6;

/// Result of a selection run: the chosen questions plus a human-readable
/// descriptor of the strategy used (persisted nowhere, returned to callers
/// for transparency).
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub questions: Vec<QuestionRow>,
    pub strategy: String,
}

/// Per-topic and per-type counts for the pool behind a topic set.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatistics {
    pub total_questions: usize,
    pub mcq_questions: usize,
    pub descriptive_questions: usize,
    pub by_topic: HashMap<String, TopicCounts>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicCounts {
    pub mcq: usize,
    pub descriptive: usize,
}

/// Selects `count` questions for the given topics and difficulty.
///
/// Fails with `InsufficientPool` before anything is persisted when the
/// deduplicated union across topics is smaller than `count`.
pub async fn select_questions(
    pool: &PgPool,
    topics: &[String],
    count: usize,
    difficulty: Difficulty,
) -> Result<SelectionOutcome, AppError> {
    let available = dedup_by_id(fetch_by_tags(pool, topics).await?);
    let mut rng = rand::thread_rng();
    let questions = choose(available, count, difficulty, &mut rng)?;

    let strategy = match difficulty {
        Difficulty::Mixed => "Mixed difficulty with balanced type coverage".to_string(),
        other => format!(
            "Fixed difficulty level: {}",
            format!("{other:?}").to_lowercase()
        ),
    };

    info!(
        "Selected {} questions for topics {:?} using strategy: {strategy}",
        questions.len(),
        topics
    );
    Ok(SelectionOutcome { questions, strategy })
}

/// Counts the pool behind a topic set without selecting anything.
pub async fn pool_statistics(pool: &PgPool, topics: &[String]) -> Result<PoolStatistics, AppError> {
    let questions = dedup_by_id(fetch_by_tags(pool, topics).await?);

    let mut by_topic: HashMap<String, TopicCounts> = HashMap::new();
    let mut mcq = 0usize;
    let mut descriptive = 0usize;
    for q in &questions {
        let counts = by_topic.entry(q.tag.clone()).or_default();
        match q.question_type {
            QuestionType::Mcq => {
                counts.mcq += 1;
                mcq += 1;
            }
            QuestionType::Descriptive => {
                counts.descriptive += 1;
                descriptive += 1;
            }
        }
    }

    Ok(PoolStatistics {
        total_questions: questions.len(),
        mcq_questions: mcq,
        descriptive_questions: descriptive,
        by_topic,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Selection policy (pure)
// ────────────────────────────────────────────────────────────────────────────

/// Core selection policy. Fails when the pool is undersized; otherwise
/// returns exactly `count` questions, duplicate-free, shuffled.
fn choose<R: Rng>(
    available: Vec<QuestionRow>,
    count: usize,
    difficulty: Difficulty,
    rng: &mut R,
) -> Result<Vec<QuestionRow>, AppError> {
    if count == 0 {
        return Err(AppError::Validation("Question count must be positive".to_string()));
    }
    if available.len() < count {
        return Err(AppError::InsufficientPool(format!(
            "Not enough questions available. Found {}, need {count}",
            available.len()
        )));
    }

    let (mcq, descriptive): (Vec<_>, Vec<_>) = available
        .into_iter()
        .partition(|q| q.question_type == QuestionType::Mcq);

    let mut selected = match difficulty {
        Difficulty::Mixed | Difficulty::Medium => pick_mixed(mcq, descriptive, count, rng),
        // No explicit difficulty ratings exist on questions; type stands in:
        // mcq reads as easier, descriptive as harder.
        Difficulty::Easy => pick_preferring(mcq, descriptive, count, rng),
        Difficulty::Hard => pick_preferring(descriptive, mcq, count, rng),
    };

    selected.truncate(count);
    selected.shuffle(rng);
    Ok(selected)
}

/// Targets a 60/40 mcq/descriptive split; whichever side is scarce has its
/// shortfall filled from the other side up to availability.
fn pick_mixed<R: Rng>(
    mcq: Vec<QuestionRow>,
    descriptive: Vec<QuestionRow>,
    count: usize,
    rng: &mut R,
) -> Vec<QuestionRow> {
    let target_mcq = (count as f64 * MCQ_SHARE) as usize;
    let target_desc = count - target_mcq;

    let mut take_mcq = target_mcq.min(mcq.len());
    let mut take_desc = target_desc.min(descriptive.len());

    if take_mcq + take_desc < count {
        let shortfall = count - take_mcq - take_desc;
        if mcq.len() > take_mcq {
            take_mcq = mcq.len().min(take_mcq + shortfall);
        } else if descriptive.len() > take_desc {
            take_desc = descriptive.len().min(take_desc + shortfall);
        }
    }

    let mut selected = sample(mcq, take_mcq, rng);
    selected.extend(sample(descriptive, take_desc, rng));
    selected
}

/// Takes as many questions as possible from the preferred bucket, padding
/// from the other bucket only when the preferred side runs out.
fn pick_preferring<R: Rng>(
    preferred: Vec<QuestionRow>,
    other: Vec<QuestionRow>,
    count: usize,
    rng: &mut R,
) -> Vec<QuestionRow> {
    if preferred.len() >= count {
        return sample(preferred, count, rng);
    }
    let shortfall = count - preferred.len();
    let mut selected = preferred;
    selected.extend(sample(other, shortfall, rng));
    selected
}

/// Uniform sampling without replacement.
fn sample<R: Rng>(bucket: Vec<QuestionRow>, n: usize, rng: &mut R) -> Vec<QuestionRow> {
    bucket
        .choose_multiple(rng, n.min(bucket.len()))
        .cloned()
        .collect()
}

fn dedup_by_id(questions: Vec<QuestionRow>) -> Vec<QuestionRow> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| seen.insert(q.id))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn make_question(question_type: QuestionType, tag: &str) -> QuestionRow {
        QuestionRow {
            id: Uuid::new_v4(),
            question: "What does ACID stand for?".to_string(),
            answer: "Atomicity, Consistency, Isolation, Durability".to_string(),
            question_type,
            options: match question_type {
                QuestionType::Mcq => Some(vec!["A".to_string(), "B".to_string()]),
                QuestionType::Descriptive => None,
            },
            tag: tag.to_string(),
            created_at: Utc::now(),
        }
    }

    fn pool_of(mcq: usize, descriptive: usize) -> Vec<QuestionRow> {
        let mut pool: Vec<_> = (0..mcq)
            .map(|_| make_question(QuestionType::Mcq, "sql"))
            .collect();
        pool.extend((0..descriptive).map(|_| make_question(QuestionType::Descriptive, "sql")));
        pool
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_undersized_pool_fails_before_selection() {
        let result = choose(pool_of(3, 0), 5, Difficulty::Mixed, &mut rng());
        assert!(matches!(result, Err(AppError::InsufficientPool(_))));
    }

    #[test]
    fn test_returns_exactly_requested_count() {
        let selected = choose(pool_of(20, 20), 10, Difficulty::Mixed, &mut rng()).unwrap();
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_no_duplicate_ids() {
        let selected = choose(pool_of(30, 30), 25, Difficulty::Mixed, &mut rng()).unwrap();
        let ids: HashSet<_> = selected.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), selected.len());
    }

    #[test]
    fn test_mixed_targets_60_40_split_on_ample_pool() {
        let selected = choose(pool_of(50, 50), 10, Difficulty::Mixed, &mut rng()).unwrap();
        let mcq_count = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::Mcq)
            .count();
        assert_eq!(mcq_count, 6);
    }

    #[test]
    fn test_mixed_degrades_to_all_mcq_when_no_descriptive() {
        // 100 mcq, 0 descriptive, requesting 10 → exactly 10 mcq
        let selected = choose(pool_of(100, 0), 10, Difficulty::Mixed, &mut rng()).unwrap();
        assert_eq!(selected.len(), 10);
        assert!(selected
            .iter()
            .all(|q| q.question_type == QuestionType::Mcq));
    }

    #[test]
    fn test_mixed_fills_mcq_shortfall_from_descriptive() {
        let selected = choose(pool_of(2, 50), 10, Difficulty::Mixed, &mut rng()).unwrap();
        let mcq_count = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::Mcq)
            .count();
        assert_eq!(mcq_count, 2);
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_easy_prefers_mcq() {
        let selected = choose(pool_of(20, 20), 10, Difficulty::Easy, &mut rng()).unwrap();
        assert!(selected
            .iter()
            .all(|q| q.question_type == QuestionType::Mcq));
    }

    #[test]
    fn test_easy_pads_with_descriptive_when_mcq_scarce() {
        let selected = choose(pool_of(4, 20), 10, Difficulty::Easy, &mut rng()).unwrap();
        let mcq_count = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::Mcq)
            .count();
        assert_eq!(mcq_count, 4);
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_hard_prefers_descriptive() {
        let selected = choose(pool_of(20, 20), 10, Difficulty::Hard, &mut rng()).unwrap();
        assert!(selected
            .iter()
            .all(|q| q.question_type == QuestionType::Descriptive));
    }

    #[test]
    fn test_medium_behaves_like_mixed() {
        let selected = choose(pool_of(50, 50), 10, Difficulty::Medium, &mut rng()).unwrap();
        let mcq_count = selected
            .iter()
            .filter(|q| q.question_type == QuestionType::Mcq)
            .count();
        assert_eq!(mcq_count, 6);
    }

    #[test]
    fn test_dedup_by_id_drops_repeats() {
        let q = make_question(QuestionType::Mcq, "sql");
        let deduped = dedup_by_id(vec![q.clone(), q.clone(), q]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn test_zero_count_rejected() {
        let result = choose(pool_of(5, 5), 0, Difficulty::Mixed, &mut rng());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
