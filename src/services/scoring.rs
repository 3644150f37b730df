use std::collections::HashSet;

use uuid::Uuid;

use crate::database::models::{TestAnswer, TestQuestion};
use crate::types::AnswersType;

/// Points for one question: full marks when the selection equals the set of
/// correct answers exactly, otherwise zero. No partial credit.
pub fn score_question(question: &TestQuestion, answers: &[TestAnswer], selected: &[Uuid]) -> f64 {
    let correct: HashSet<Uuid> = answers.iter().filter(|a| a.is_correct).map(|a| a.id).collect();
    let chosen: HashSet<Uuid> = selected.iter().copied().collect();

    if !chosen.is_empty() && chosen == correct {
        question.max_points
    } else {
        0.0
    }
}

/// Check a selection against the question it answers. Returns the reason on failure.
pub fn validate_selection(
    question: &TestQuestion,
    answers: &[TestAnswer],
    selected: &[Uuid],
) -> Result<(), String> {
    if selected.len() > answers.len() {
        return Err(format!(
            "Question {} has {} answers but {} were selected",
            question.id,
            answers.len(),
            selected.len()
        ));
    }
    if question.answers_type == AnswersType::Single && selected.len() > 1 {
        return Err(format!("Question {} accepts a single answer", question.id));
    }

    let known: HashSet<Uuid> = answers.iter().map(|a| a.id).collect();
    let mut seen = HashSet::with_capacity(selected.len());
    for id in selected {
        if !known.contains(id) {
            return Err(format!("Answer {} does not belong to question {}", id, question.id));
        }
        if !seen.insert(*id) {
            return Err(format!("Answer {} selected twice", id));
        }
    }
    Ok(())
}
