use crate::config::ClientConfig;
use crate::core::{Credentials, QuizBackend, Upload};
use crate::error::BackendError;
use crate::quiz::model::{Question, QuestionBatch, SessionId, StartedQuiz};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct NextQuestionsRequest<'a> {
    asked_questions: &'a [String],
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    questions: &'a [Question],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Pull the backend's `detail` message out of an error body.
///
/// Validation errors carry a structured `detail`; those are passed through as JSON text.
pub(crate) fn error_detail(body: &str, fallback: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body).ok().and_then(|b| b.detail) {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

/// reqwest-backed client for the quiz service.
#[derive(Clone)]
pub struct HttpBackend {
    config: ClientConfig,
    client: Client,
    bearer: Option<String>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.bearer.is_some())
            .finish()
    }
}

impl HttpBackend {
    /// Create a new backend client from configuration
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        info!(base_url = %config.base_url, timeout_secs = config.request_timeout.as_secs(), "Creating quiz backend client");
        Ok(Self {
            config,
            client,
            bearer: None,
        })
    }

    /// Attach a bearer token to every subsequent request.
    ///
    /// The token is forwarded as-is; authorization is decided by the server.
    #[must_use]
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let builder = self.client.post(self.config.endpoint(path));
        match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|e| {
            error!(error = %e, "HTTP request failed");
            BackendError::from(e)
        })?;

        let status = response.status();
        debug!(status = %status, "Received response from quiz backend");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body, fallback);
        if status == StatusCode::UNAUTHORIZED {
            warn!(detail = %detail, "Quiz backend rejected credentials");
        } else {
            error!(status = %status, detail = %detail, "Quiz backend error");
        }
        Err(BackendError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl QuizBackend for HttpBackend {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<String, BackendError> {
        let request = self.post("/users/login").form(&[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        let response = self.send(request, "An error occurred.").await?;
        let body: LoginResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse login response JSON");
            BackendError::Decode(e.to_string())
        })?;
        info!("Login succeeded");
        Ok(body.access_token)
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn signup(&self, credentials: &Credentials) -> Result<(), BackendError> {
        let request = self.post("/users/signup").json(credentials);
        self.send(request, "An error occurred.").await?;
        info!("Signup succeeded");
        Ok(())
    }

    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn start_session(&self, upload: Upload) -> Result<StartedQuiz, BackendError> {
        let part = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name)
            .mime_str(upload.mime)
            .map_err(|e| BackendError::Http(e.to_string()))?;
        let request = self.post("/start-quiz-session/").multipart(Form::new().part("file", part));

        let response = self.send(request, "Something went wrong").await?;
        let started: StartedQuiz = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse quiz session response JSON");
            BackendError::Decode(e.to_string())
        })?;
        info!(session_id = %started.session_id, questions = started.quiz.len(), "Quiz session started");
        Ok(started)
    }

    #[instrument(skip(self, asked_questions), fields(session_id = %session_id, asked = asked_questions.len()))]
    async fn next_questions(
        &self,
        session_id: &SessionId,
        asked_questions: &[String],
    ) -> Result<QuestionBatch, BackendError> {
        let path = format!("/quiz-session/{}/next-questions", session_id);
        let request = self.post(&path).json(&NextQuestionsRequest { asked_questions });
        let response = self.send(request, "Failed to fetch more questions.").await?;
        let batch: QuestionBatch = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse next-questions response JSON");
            BackendError::Decode(e.to_string())
        })?;
        debug!(received = batch.len(), "Parsed next-questions response");
        Ok(batch)
    }

    #[instrument(skip(self, questions), fields(questions = questions.len()))]
    async fn export_pdf(&self, questions: &[Question]) -> Result<Bytes, BackendError> {
        let request = self.post("/export-quiz-pdf/").json(&ExportRequest { questions });
        let response = self.send(request, "PDF generation failed.").await?;
        let pdf = response.bytes().await.map_err(BackendError::from)?;
        info!(size = pdf.len(), "Received PDF export");
        Ok(pdf)
    }

    fn clone_box(&self) -> Box<dyn QuizBackend> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_used_verbatim() {
        assert_eq!(
            error_detail(r#"{"detail":"Username already registered"}"#, "fallback"),
            "Username already registered"
        );
    }

    #[test]
    fn missing_or_unparseable_detail_falls_back() {
        assert_eq!(error_detail("{}", "An error occurred."), "An error occurred.");
        assert_eq!(
            error_detail("<html>502</html>", "Something went wrong"),
            "Something went wrong"
        );
        assert_eq!(error_detail(r#"{"detail":""}"#, "fb"), "fb");
    }

    #[test]
    fn structured_detail_is_passed_through_as_json() {
        let detail = error_detail(r#"{"detail":[{"msg":"field required"}]}"#, "fb");
        assert!(detail.contains("field required"));
    }

    #[test]
    fn bearer_is_not_leaked_in_debug_output() {
        let backend = HttpBackend::new(ClientConfig::default())
            .unwrap()
            .with_bearer(Some("secret.token.value".into()));
        let shown = format!("{:?}", backend);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("authenticated: true"));
    }
}
