//! Quiz navigation as an explicit state machine.
//!
//! ```text
//! Answering(cursor) --select--> Answering(cursor)
//! Answering(cursor) --advance, next loaded--> Answering(cursor + 1)
//! Answering(cursor) --advance, end of batch--> FetchingMore
//! FetchingMore --batch--> Answering(cursor + 1)
//! FetchingMore --empty / failed--> Finished
//! any --finish--> Finished
//! any --restart--> Answering(0), no session
//! ```
//!
//! Fetches are split in two halves ([`Navigator::advance`] hands out a
//! [`FetchRequest`], [`Navigator::apply_fetch`] consumes the outcome) so the
//! caller owns the network call. Every request carries a [`FetchTicket`]; an
//! outcome whose ticket is no longer the pending one is dropped.

use tracing::{debug, info, warn};

use crate::config::DEFAULT_FETCH_RETRIES;
use crate::error::QuizError;

use super::fetcher::FetchOutcome;
use super::model::{Question, SessionId, StartedQuiz};
use super::scorer::ScoreReport;
use super::session::Session;

/// Identifies one pending fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    session_id: SessionId,
    epoch: u64,
}

/// Everything needed to perform the network half of an advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub session_id: SessionId,
    pub asked: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The backend returned an empty batch.
    Exhausted,
    /// The user chose to finish.
    Requested,
    /// Fetching more questions kept failing.
    BackendFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizState {
    Answering {
        cursor: usize,
        /// Option highlighted on the current question, cleared on every move.
        highlighted: Option<String>,
    },
    FetchingMore {
        ticket: FetchTicket,
        retries_left: usize,
    },
    Finished {
        reason: FinishReason,
    },
}

/// What an advance did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Moved { cursor: usize },
    Fetch(FetchRequest),
    /// Not actionable in the current state.
    Blocked,
}

/// What applying a fetch outcome did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchApplied {
    Appended { cursor: usize, added: usize },
    Finished(FinishReason),
    /// The fetch failed but may be tried again with this request.
    Retry(FetchRequest),
    /// The outcome belongs to a fetch that is no longer pending.
    Stale,
}

#[derive(Debug)]
pub struct Navigator {
    session: Option<Session>,
    state: QuizState,
    epoch: u64,
    fetch_retries: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            session: None,
            state: QuizState::Answering {
                cursor: 0,
                highlighted: None,
            },
            epoch: 0,
            fetch_retries: DEFAULT_FETCH_RETRIES,
        }
    }

    /// How many times a failed fetch is retried before finishing.
    #[must_use]
    pub fn with_fetch_retries(mut self, retries: usize) -> Self {
        self.fetch_retries = retries;
        self
    }

    /// Seed a fresh session from a successful upload.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyQuiz` when the backend produced no questions;
    /// the navigator is left untouched in that case.
    pub fn start(&mut self, started: StartedQuiz) -> Result<(), QuizError> {
        if started.quiz.is_empty() {
            warn!(session_id = %started.session_id, "Backend returned an empty quiz");
            return Err(QuizError::EmptyQuiz);
        }
        info!(session_id = %started.session_id, questions = started.quiz.len(), "Starting quiz session");
        self.epoch += 1;
        self.session = Some(Session::new(started.session_id, started.quiz));
        self.state = QuizState::Answering {
            cursor: 0,
            highlighted: None,
        };
        Ok(())
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, QuizState::Finished { .. })
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self.state, QuizState::FetchingMore { .. })
    }

    pub fn highlighted(&self) -> Option<&str> {
        match &self.state {
            QuizState::Answering { highlighted, .. } => highlighted.as_deref(),
            _ => None,
        }
    }

    /// The question on screen, if the navigator is answering one.
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            QuizState::Answering { .. } => self.session.as_ref()?.current(),
            _ => None,
        }
    }

    /// Choose an option for the current question.
    ///
    /// Returns `false` when nothing was recorded.
    pub fn select(&mut self, label: &str) -> bool {
        let QuizState::Answering { highlighted, .. } = &mut self.state else {
            return false;
        };
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.record_answer(label) {
            return false;
        }
        *highlighted = Some(label.to_string());
        true
    }

    /// Whether the advance control is enabled.
    ///
    /// An option must be highlighted, except on a question with unusable
    /// options, which can always be skipped.
    pub fn can_advance(&self) -> bool {
        let QuizState::Answering { highlighted, .. } = &self.state else {
            return false;
        };
        match self.session.as_ref().and_then(Session::current) {
            Some(question) => highlighted.is_some() || question.is_broken(),
            None => false,
        }
    }

    /// Label for the advance control in the current state.
    pub fn advance_label(&self) -> &'static str {
        match &self.state {
            QuizState::FetchingMore { .. } => "Loading...",
            QuizState::Finished { .. } => "Finished",
            QuizState::Answering { .. } => {
                let Some(session) = self.session.as_ref() else {
                    return "Next Question";
                };
                if session.is_last_of_batch() {
                    "Get More Questions"
                } else if session.current().is_some_and(Question::is_broken) {
                    "Skip Question"
                } else {
                    "Next Question"
                }
            }
        }
    }

    /// Move past the current question, or ask the caller to fetch more.
    pub fn advance(&mut self) -> Advance {
        if !self.can_advance() {
            return Advance::Blocked;
        }
        let Some(session) = self.session.as_mut() else {
            return Advance::Blocked;
        };

        if session.step_forward() {
            let cursor = session.cursor();
            self.state = QuizState::Answering {
                cursor,
                highlighted: None,
            };
            debug!(cursor, "Advanced to next loaded question");
            return Advance::Moved { cursor };
        }

        self.epoch += 1;
        let ticket = FetchTicket {
            session_id: session.id().clone(),
            epoch: self.epoch,
        };
        let request = FetchRequest {
            ticket: ticket.clone(),
            session_id: session.id().clone(),
            asked: session.asked_prompts(),
        };
        info!(session_id = %session.id(), asked = request.asked.len(), "End of batch, fetching more questions");
        self.state = QuizState::FetchingMore {
            ticket,
            retries_left: self.fetch_retries,
        };
        Advance::Fetch(request)
    }

    /// Apply the outcome of the fetch identified by `ticket`.
    pub fn apply_fetch(&mut self, ticket: &FetchTicket, outcome: FetchOutcome) -> FetchApplied {
        let retries_left = match &self.state {
            QuizState::FetchingMore {
                ticket: pending,
                retries_left,
            } if pending == ticket => *retries_left,
            _ => {
                debug!(session_id = %ticket.session_id, epoch = ticket.epoch, "Discarding stale fetch outcome");
                return FetchApplied::Stale;
            }
        };
        let Some(session) = self.session.as_mut() else {
            return FetchApplied::Stale;
        };
        if session.id() != &ticket.session_id {
            return FetchApplied::Stale;
        }

        match outcome {
            FetchOutcome::Batch(batch) if batch.is_empty() => {
                self.finish_with(FinishReason::Exhausted)
            }
            FetchOutcome::Batch(batch) => {
                let added = batch.len();
                session.append_and_advance(batch);
                let cursor = session.cursor();
                self.state = QuizState::Answering {
                    cursor,
                    highlighted: None,
                };
                FetchApplied::Appended { cursor, added }
            }
            FetchOutcome::Exhausted => self.finish_with(FinishReason::Exhausted),
            FetchOutcome::TransientError(e) if retries_left > 0 => {
                warn!(error = %e, retries_left, "Retrying failed fetch");
                self.state = QuizState::FetchingMore {
                    ticket: ticket.clone(),
                    retries_left: retries_left - 1,
                };
                FetchApplied::Retry(FetchRequest {
                    ticket: ticket.clone(),
                    session_id: session.id().clone(),
                    asked: session.asked_prompts(),
                })
            }
            FetchOutcome::TransientError(e) => {
                warn!(error = %e, "Giving up on fetching more questions; finishing quiz");
                self.finish_with(FinishReason::BackendFailure)
            }
        }
    }

    /// Finish immediately, abandoning any pending fetch.
    pub fn finish(&mut self) {
        if !self.is_finished() {
            self.finish_with(FinishReason::Requested);
        }
    }

    fn finish_with(&mut self, reason: FinishReason) -> FetchApplied {
        // Invalidate whatever ticket is outstanding.
        self.epoch += 1;
        info!(?reason, "Quiz finished");
        self.state = QuizState::Finished { reason };
        FetchApplied::Finished(reason)
    }

    /// Discard the session entirely. A new upload is needed before answering again.
    pub fn restart(&mut self) {
        self.epoch += 1;
        self.session = None;
        self.state = QuizState::Answering {
            cursor: 0,
            highlighted: None,
        };
        info!("Quiz session discarded");
    }

    /// Score of the current session so far.
    pub fn report(&self) -> Option<ScoreReport> {
        let session = self.session.as_ref()?;
        Some(ScoreReport::compute(session.questions(), session.answers()))
    }
}
