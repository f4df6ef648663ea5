use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::model::{Question, QuestionBatch, SessionId};

/// One quiz-taking attempt.
///
/// `questions` only grows by appending; `cursor` never moves backwards. A
/// restart replaces the whole `Session` rather than rewinding it.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    questions: Vec<Question>,
    answers: BTreeMap<usize, String>,
    cursor: usize,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, initial: QuestionBatch) -> Self {
        Self {
            id,
            questions: initial.questions,
            answers: BTreeMap::new(),
            cursor: 0,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    /// Prompts of every question presented so far, in order.
    pub fn asked_prompts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.prompt.clone()).collect()
    }

    pub fn is_last_of_batch(&self) -> bool {
        self.cursor + 1 >= self.questions.len()
    }

    /// Record the chosen label for the question under the cursor.
    ///
    /// Returns `false` without recording when the cursor is past the end, the
    /// question is broken, or the label is not one of its options.
    pub(crate) fn record_answer(&mut self, label: &str) -> bool {
        let Some(question) = self.questions.get(self.cursor) else {
            return false;
        };
        if !question.options.contains(label) {
            debug!(cursor = self.cursor, label, "Ignoring selection of unknown option");
            return false;
        }
        self.answers.insert(self.cursor, label.to_string());
        true
    }

    /// Move to the next question if one is already loaded.
    pub(crate) fn step_forward(&mut self) -> bool {
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Append a fetched batch and move onto its first question.
    pub(crate) fn append_and_advance(&mut self, batch: QuestionBatch) {
        let before = self.questions.len();
        self.questions.extend(batch);
        if self.questions.len() > before {
            self.cursor = before;
        }
    }
}
