use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("{detail}")]
    Api { status: u16, detail: String },
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Request timed out")]
    Timeout,
}

impl BackendError {
    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token has no subject claim")]
    MissingSubject,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No data directory available for token storage")]
    NoDataDir,
}

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Unsupported file type: {0}. Supported: pdf, docx, png, jpg, jpeg")]
    UnsupportedFile(String),
    #[error("{}", .0.user_message())]
    Backend(#[from] BackendError),
    #[error("The AI could not generate a quiz. Please try another file.")]
    EmptyQuiz,
    #[error("Please log in or sign up to start generating quizzes.")]
    NotLoggedIn,
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF generation failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Could not write PDF: {0}")]
    Io(#[from] std::io::Error),
}
