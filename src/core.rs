//! Backend seam: everything the client needs from the quiz service.
//!
//! Generation, grading data, PDF rendering and user accounts all live on the
//! server. `QuizBackend` is the one place the rest of the crate talks to it,
//! so the navigator, fetcher and exporter can be driven by the HTTP client or
//! by the scripted mock in tests.

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{BackendError, QuizError};
use crate::quiz::model::{Question, QuestionBatch, SessionId, StartedQuiz};

/// File types the backend can extract text from.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "png", "jpg", "jpeg"];

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A study document ready to be sent as the multipart `file` field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Bytes,
}

impl Upload {
    /// Build an upload from in-memory contents, validating the extension.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self, QuizError> {
        let file_name = file_name.into();
        let mime =
            mime_for(&file_name).ok_or_else(|| QuizError::UnsupportedFile(file_name.clone()))?;
        Ok(Self {
            file_name,
            mime,
            bytes: bytes.into(),
        })
    }

    /// Read a document from disk. The extension is checked before the file is read.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if mime_for(&file_name).is_none() {
            return Err(QuizError::UnsupportedFile(file_name));
        }
        let bytes = tokio::fs::read(path).await?;
        debug!(file_name = %file_name, size = bytes.len(), "Read study document");
        Self::new(file_name, bytes)
    }
}

fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Quiz service abstraction.
///
/// Each method is a single request/response; there is no retry or backoff at
/// this level. Callers decide how to treat failures.
#[async_trait]
pub trait QuizBackend: Send + Sync + Debug {
    /// Exchange credentials for a bearer token.
    async fn login(&self, credentials: &Credentials) -> Result<String, BackendError>;

    async fn signup(&self, credentials: &Credentials) -> Result<(), BackendError>;

    /// Upload a document and receive the first batch plus a session id.
    async fn start_session(&self, upload: Upload) -> Result<StartedQuiz, BackendError>;

    /// Ask for one more batch, excluding prompts already asked.
    async fn next_questions(
        &self,
        session_id: &SessionId,
        asked_questions: &[String],
    ) -> Result<QuestionBatch, BackendError>;

    /// Render the given questions as a PDF document.
    async fn export_pdf(&self, questions: &[Question]) -> Result<Bytes, BackendError>;

    /// Clone this backend into a boxed trait object
    fn clone_box(&self) -> Box<dyn QuizBackend>;
}

impl Clone for Box<dyn QuizBackend> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl QuizBackend for Box<dyn QuizBackend> {
    async fn login(&self, credentials: &Credentials) -> Result<String, BackendError> {
        self.as_ref().login(credentials).await
    }

    async fn signup(&self, credentials: &Credentials) -> Result<(), BackendError> {
        self.as_ref().signup(credentials).await
    }

    async fn start_session(&self, upload: Upload) -> Result<StartedQuiz, BackendError> {
        self.as_ref().start_session(upload).await
    }

    async fn next_questions(
        &self,
        session_id: &SessionId,
        asked_questions: &[String],
    ) -> Result<QuestionBatch, BackendError> {
        self.as_ref().next_questions(session_id, asked_questions).await
    }

    async fn export_pdf(&self, questions: &[Question]) -> Result<Bytes, BackendError> {
        self.as_ref().export_pdf(questions).await
    }

    fn clone_box(&self) -> Box<dyn QuizBackend> {
        self.as_ref().clone_box()
    }
}
