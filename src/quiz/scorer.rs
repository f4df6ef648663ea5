use std::collections::BTreeMap;

use serde::Serialize;

use super::model::Question;

/// How one question was answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionOutcome {
    pub chosen: Option<String>,
    pub is_correct: bool,
}

/// Derived score for a set of questions and answers. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub total: usize,
    pub breakdown: Vec<QuestionOutcome>,
}

impl ScoreReport {
    /// Score `questions` against `answers` keyed by question index.
    ///
    /// Unanswered questions count as incorrect.
    pub fn compute(questions: &[Question], answers: &BTreeMap<usize, String>) -> Self {
        let breakdown: Vec<QuestionOutcome> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let chosen = answers.get(&i).cloned();
                let is_correct = chosen.as_deref() == Some(q.correct_answer_label.as_str());
                QuestionOutcome { chosen, is_correct }
            })
            .collect();

        let correct_count = breakdown.iter().filter(|o| o.is_correct).count();
        let total = breakdown.len();
        Self {
            correct_count,
            incorrect_count: total - correct_count,
            total,
            breakdown,
        }
    }

    /// Share of correct answers, 0.0..=100.0; 0 when there are no questions.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct_count as f64 * 100.0 / self.total as f64
    }

    /// Percentage rounded to a whole number for display.
    pub fn rounded_percentage(&self) -> u32 {
        self.percentage().round() as u32
    }
}
