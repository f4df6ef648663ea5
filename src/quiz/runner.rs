use tracing::{info, instrument};

use crate::core::{QuizBackend, Upload};
use crate::error::QuizError;

use super::fetcher::BatchFetcher;
use super::navigator::{Advance, FetchApplied, FetchRequest, Navigator};

/// Outcome of one awaited advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved { cursor: usize },
    Fetched(FetchApplied),
    Blocked,
}

/// Drives a [`Navigator`] against a backend, awaiting fetches inline.
#[derive(Debug)]
pub struct QuizRunner {
    backend: Box<dyn QuizBackend>,
    fetcher: BatchFetcher,
    navigator: Navigator,
}

impl QuizRunner {
    pub fn new(backend: Box<dyn QuizBackend>, fetch_retries: usize) -> Self {
        Self {
            fetcher: BatchFetcher::new(backend.clone()),
            backend,
            navigator: Navigator::new().with_fetch_retries(fetch_retries),
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    pub fn fetcher(&self) -> &BatchFetcher {
        &self.fetcher
    }

    /// Upload a study document and seed a new session from the first batch.
    ///
    /// # Errors
    ///
    /// Backend failures carry the server's message; an empty first batch is
    /// `QuizError::EmptyQuiz`.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    pub async fn start(&mut self, upload: Upload) -> Result<(), QuizError> {
        let started = self.backend.start_session(upload).await?;
        self.navigator.start(started)
    }

    /// Advance, performing any needed fetch (with retries) before returning.
    pub async fn advance(&mut self) -> Step {
        match self.navigator.advance() {
            Advance::Moved { cursor } => Step::Moved { cursor },
            Advance::Blocked => Step::Blocked,
            Advance::Fetch(request) => Step::Fetched(self.complete_fetch(request).await),
        }
    }

    /// Run `request` to completion, following retries the navigator asks for.
    pub async fn complete_fetch(&mut self, mut request: FetchRequest) -> FetchApplied {
        loop {
            let outcome = self.fetcher.fetch(&request.session_id, &request.asked).await;
            match self.navigator.apply_fetch(&request.ticket, outcome) {
                FetchApplied::Retry(next) => {
                    info!(session_id = %next.session_id, "Retrying question fetch");
                    request = next;
                }
                applied => return applied,
            }
        }
    }
}
