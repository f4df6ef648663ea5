use tracing::{info, instrument, warn};

use crate::core::QuizBackend;
use crate::error::BackendError;

use super::model::{QuestionBatch, SessionId};

/// Result of asking the backend for one more batch.
///
/// Exhaustion and failure are kept apart so the navigator can retry the latter.
#[derive(Debug)]
pub enum FetchOutcome {
    Batch(QuestionBatch),
    Exhausted,
    TransientError(BackendError),
}

impl FetchOutcome {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchOutcome::TransientError(_))
    }
}

/// Requests additional question batches for a session.
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    backend: Box<dyn QuizBackend>,
}

impl BatchFetcher {
    pub fn new(backend: Box<dyn QuizBackend>) -> Self {
        Self { backend }
    }

    /// Issue one request. Errors never propagate; they come back as `TransientError`.
    #[instrument(target = "questionmate::fetcher", skip(self, asked), fields(session_id = %session_id, asked = asked.len()))]
    pub async fn fetch(&self, session_id: &SessionId, asked: &[String]) -> FetchOutcome {
        match self.backend.next_questions(session_id, asked).await {
            Ok(batch) if batch.is_empty() => {
                info!("Backend has no more questions for this session");
                FetchOutcome::Exhausted
            }
            Ok(batch) => {
                info!(received = batch.len(), "Fetched more questions");
                FetchOutcome::Batch(batch)
            }
            Err(e) => {
                warn!(error = %e, "Fetching more questions failed");
                FetchOutcome::TransientError(e)
            }
        }
    }
}
