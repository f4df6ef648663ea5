use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::{Credentials, QuizBackend, Upload};
use crate::error::BackendError;
use crate::quiz::model::{Question, QuestionBatch, SessionId, StartedQuiz};

/// A scripted reply, consumed in order by whichever call comes next.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Token(String),
    SignedUp,
    Started { session_id: String, questions: Vec<Question> },
    Batch(Vec<Question>),
    Pdf(Vec<u8>),
    Error { status: u16, detail: String },
    Transport(String),
    /// Wait before producing the next queued reply.
    Delay(Duration),
}

/// A request the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Login { username: String },
    Signup { username: String },
    StartSession { file_name: String },
    NextQuestions { session_id: String, asked: Vec<String> },
    ExportPdf { questions: usize },
}

/// Shared control over a [`MockBackend`]: enqueue replies, inspect calls.
#[derive(Debug, Default)]
pub struct MockHandle {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockHandle {
    pub fn push(&self, response: MockResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or_default()
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn pop(&self) -> Option<MockResponse> {
        self.responses.lock().ok().and_then(|mut q| q.pop_front())
    }
}

/// In-memory quiz backend for tests and offline runs
#[derive(Debug, Clone)]
pub struct MockBackend {
    handle: Arc<MockHandle>,
}

impl MockBackend {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (backend, handle) = Self::new();
        for r in responses {
            handle.push(r);
        }
        (backend, handle)
    }

    /// Next non-delay reply, sleeping through any `Delay` entries first.
    async fn next_reply(&self) -> Option<MockResponse> {
        loop {
            match self.handle.pop()? {
                MockResponse::Delay(d) => tokio::time::sleep(d).await,
                other => return Some(other),
            }
        }
    }
}

fn failure(response: MockResponse) -> BackendError {
    match response {
        MockResponse::Error { status, detail } => BackendError::Api { status, detail },
        MockResponse::Transport(msg) => BackendError::Http(msg),
        other => BackendError::Decode(format!("unexpected mock response: {:?}", other)),
    }
}

fn nothing_queued() -> BackendError {
    BackendError::Http("no mock response queued".to_string())
}

#[async_trait]
impl QuizBackend for MockBackend {
    async fn login(&self, credentials: &Credentials) -> Result<String, BackendError> {
        self.handle.record(MockCall::Login {
            username: credentials.username.clone(),
        });
        match self.next_reply().await.ok_or_else(nothing_queued)? {
            MockResponse::Token(token) => Ok(token),
            other => Err(failure(other)),
        }
    }

    async fn signup(&self, credentials: &Credentials) -> Result<(), BackendError> {
        self.handle.record(MockCall::Signup {
            username: credentials.username.clone(),
        });
        match self.next_reply().await.ok_or_else(nothing_queued)? {
            MockResponse::SignedUp => Ok(()),
            other => Err(failure(other)),
        }
    }

    async fn start_session(&self, upload: Upload) -> Result<StartedQuiz, BackendError> {
        self.handle.record(MockCall::StartSession {
            file_name: upload.file_name,
        });
        match self.next_reply().await.ok_or_else(nothing_queued)? {
            MockResponse::Started { session_id, questions } => Ok(StartedQuiz {
                session_id: SessionId::new(session_id),
                quiz: QuestionBatch::new(questions),
            }),
            other => Err(failure(other)),
        }
    }

    async fn next_questions(
        &self,
        session_id: &SessionId,
        asked_questions: &[String],
    ) -> Result<QuestionBatch, BackendError> {
        self.handle.record(MockCall::NextQuestions {
            session_id: session_id.to_string(),
            asked: asked_questions.to_vec(),
        });
        // An empty queue behaves like an exhausted generator.
        match self.next_reply().await {
            None => Ok(QuestionBatch::default()),
            Some(MockResponse::Batch(questions)) => Ok(QuestionBatch::new(questions)),
            Some(other) => Err(failure(other)),
        }
    }

    async fn export_pdf(&self, questions: &[Question]) -> Result<Bytes, BackendError> {
        self.handle.record(MockCall::ExportPdf {
            questions: questions.len(),
        });
        match self.next_reply().await.ok_or_else(nothing_queued)? {
            MockResponse::Pdf(bytes) => Ok(Bytes::from(bytes)),
            other => Err(failure(other)),
        }
    }

    fn clone_box(&self) -> Box<dyn QuizBackend> {
        Box::new(self.clone())
    }
}
