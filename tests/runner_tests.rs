mod test_utils;

use std::time::Duration;

use questionmate::clients::{MockCall, MockResponse};
use questionmate::core::{Credentials, QuizBackend, Upload};
use questionmate::error::{BackendError, ExportError, QuizError};
use questionmate::export::PdfExporter;
use questionmate::quiz::{
    Advance, BatchFetcher, FetchApplied, FetchOutcome, FinishReason, QuizRunner, SessionId, Step,
};
use questionmate::AuthContext;
use questionmate::auth::MemoryTokenStorage;
use test_utils::{mock_backend, question, questions, scratch_dir, token_for};

fn upload() -> Upload {
    Upload::new("notes.pdf", b"%PDF-1.4".to_vec()).unwrap()
}

fn started_response(session_id: &str, prompts: &[&str]) -> MockResponse {
    MockResponse::Started {
        session_id: session_id.to_string(),
        questions: questions(prompts),
    }
}

#[tokio::test]
async fn full_quiz_walks_batches_until_exhausted() {
    let (backend, handle) = mock_backend(vec![
        started_response("s-1", &["q1", "q2"]),
        MockResponse::Batch(questions(&["q3"])),
        MockResponse::Batch(Vec::new()),
    ]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);
    runner.start(upload()).await.unwrap();

    runner.navigator_mut().select("A");
    assert_eq!(runner.advance().await, Step::Moved { cursor: 1 });

    runner.navigator_mut().select("B");
    assert_eq!(
        runner.advance().await,
        Step::Fetched(FetchApplied::Appended { cursor: 2, added: 1 })
    );

    runner.navigator_mut().select("A");
    assert_eq!(
        runner.advance().await,
        Step::Fetched(FetchApplied::Finished(FinishReason::Exhausted))
    );

    let report = runner.navigator().report().unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.correct_count, 2);

    let calls = handle.calls();
    assert_eq!(calls[0], MockCall::StartSession { file_name: "notes.pdf".into() });
    assert_eq!(
        calls[1],
        MockCall::NextQuestions {
            session_id: "s-1".into(),
            asked: vec!["q1".into(), "q2".into()],
        }
    );
    assert_eq!(
        calls[2],
        MockCall::NextQuestions {
            session_id: "s-1".into(),
            asked: vec!["q1".into(), "q2".into(), "q3".into()],
        }
    );
}

#[tokio::test]
async fn transient_failure_is_retried_once_then_recovers() {
    let (backend, handle) = mock_backend(vec![
        started_response("s-1", &["q1"]),
        MockResponse::Error { status: 500, detail: "ollama down".into() },
        MockResponse::Batch(questions(&["q2"])),
    ]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);
    runner.start(upload()).await.unwrap();
    runner.navigator_mut().select("A");

    assert_eq!(
        runner.advance().await,
        Step::Fetched(FetchApplied::Appended { cursor: 1, added: 1 })
    );
    assert_eq!(handle.calls().len(), 3);
}

#[tokio::test]
async fn persistent_failure_finishes_as_backend_failure() {
    let (backend, handle) = mock_backend(vec![
        started_response("s-1", &["q1"]),
        MockResponse::Transport("connection reset".into()),
        MockResponse::Transport("connection reset".into()),
    ]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);
    runner.start(upload()).await.unwrap();
    runner.navigator_mut().select("A");

    assert_eq!(
        runner.advance().await,
        Step::Fetched(FetchApplied::Finished(FinishReason::BackendFailure))
    );
    assert_eq!(runner.navigator().session().unwrap().len(), 1);
    assert_eq!(handle.pending(), 0);
}

#[tokio::test]
async fn empty_first_batch_does_not_start_a_quiz() {
    let (backend, _handle) = mock_backend(vec![started_response("s-1", &[])]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);

    let result = runner.start(upload()).await;
    assert!(matches!(result, Err(QuizError::EmptyQuiz)));
    assert!(runner.navigator().session().is_none());
}

#[tokio::test]
async fn upload_error_surfaces_backend_detail() {
    let (backend, _handle) = mock_backend(vec![MockResponse::Error {
        status: 400,
        detail: "Could not extract text.".into(),
    }]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);

    let err = runner.start(upload()).await.unwrap_err();
    assert_eq!(err.to_string(), "Could not extract text.");
}

#[tokio::test]
async fn blocked_advance_makes_no_request() {
    let (backend, handle) = mock_backend(vec![started_response("s-1", &["q1"])]);
    let mut runner = QuizRunner::new(Box::new(backend), 1);
    runner.start(upload()).await.unwrap();

    assert_eq!(runner.advance().await, Step::Blocked);
    assert_eq!(handle.calls().len(), 1);
}

#[tokio::test]
async fn late_response_after_finish_is_ignored() {
    let (backend, _handle) = mock_backend(vec![
        started_response("s-1", &["q1"]),
        MockResponse::Delay(Duration::from_millis(50)),
        MockResponse::Batch(questions(&["late"])),
    ]);
    let mut runner = QuizRunner::new(Box::new(backend), 0);
    runner.start(upload()).await.unwrap();
    runner.navigator_mut().select("A");

    let request = match runner.navigator_mut().advance() {
        Advance::Fetch(request) => request,
        other => panic!("expected fetch, got {:?}", other),
    };
    let fetcher = runner.fetcher().clone();
    let pending = request.clone();
    let task =
        tokio::spawn(async move { fetcher.fetch(&pending.session_id, &pending.asked).await });

    runner.navigator_mut().finish();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Batch(_)));

    assert_eq!(runner.navigator_mut().apply_fetch(&request.ticket, outcome), FetchApplied::Stale);
    assert!(runner.navigator().is_finished());
    assert_eq!(runner.navigator().session().unwrap().len(), 1);
}

#[tokio::test]
async fn fetcher_separates_exhaustion_from_failure() {
    let (backend, _handle) = mock_backend(vec![
        MockResponse::Batch(Vec::new()),
        MockResponse::Error { status: 500, detail: "boom".into() },
        MockResponse::Batch(vec![question("q", "A")]),
    ]);
    let fetcher = BatchFetcher::new(Box::new(backend));
    let id = SessionId::new("s");

    assert!(matches!(fetcher.fetch(&id, &[]).await, FetchOutcome::Exhausted));
    assert!(matches!(
        fetcher.fetch(&id, &[]).await,
        FetchOutcome::TransientError(BackendError::Api { status: 500, .. })
    ));
    assert!(matches!(fetcher.fetch(&id, &[]).await, FetchOutcome::Batch(b) if b.len() == 1));
}

#[tokio::test]
async fn login_token_feeds_auth_context() {
    let (backend, handle) = mock_backend(vec![MockResponse::Token(token_for("ana"))]);
    let mut auth = AuthContext::new(Box::new(MemoryTokenStorage::new()));

    let token = backend.login(&Credentials::new("ana", "pw")).await.unwrap();
    assert!(auth.set(&token));
    assert_eq!(auth.username(), Some("ana"));
    assert_eq!(handle.calls(), vec![MockCall::Login { username: "ana".into() }]);
}

#[tokio::test]
async fn rejected_login_keeps_backend_detail() {
    let (backend, _handle) = mock_backend(vec![MockResponse::Error {
        status: 401,
        detail: "Incorrect username or password".into(),
    }]);
    let err = backend.login(&Credentials::new("ana", "wrong")).await.unwrap_err();
    assert!(matches!(err, BackendError::Api { status: 401, .. }));
    assert_eq!(err.user_message(), "Incorrect username or password");
}

#[tokio::test]
async fn signup_error_detail_is_verbatim() {
    let (backend, _handle) = mock_backend(vec![MockResponse::Error {
        status: 400,
        detail: "Username already registered".into(),
    }]);
    let err = backend.signup(&Credentials::new("ana", "pw")).await.unwrap_err();
    assert_eq!(err.user_message(), "Username already registered");
}

#[tokio::test]
async fn export_writes_quiz_pdf() {
    let (backend, handle) = mock_backend(vec![MockResponse::Pdf(b"%PDF-1.7 fake".to_vec())]);
    let dir = scratch_dir("export");
    let exporter = PdfExporter::new(Box::new(backend), dir.clone());

    let path = exporter.export(&questions(&["q1", "q2"])).await.unwrap();
    assert_eq!(path, dir.join("quiz.pdf"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.7 fake".to_vec());
    assert_eq!(handle.calls(), vec![MockCall::ExportPdf { questions: 2 }]);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn export_failure_is_reported() {
    let (backend, _handle) = mock_backend(vec![MockResponse::Error {
        status: 500,
        detail: "Failed to generate PDF".into(),
    }]);
    let dir = scratch_dir("export-fail");
    let exporter = PdfExporter::new(Box::new(backend), dir.clone());

    let result = exporter.export(&questions(&["q1"])).await;
    assert!(matches!(result, Err(ExportError::Backend(_))));
    assert!(!dir.join("quiz.pdf").exists());
    let _ = std::fs::remove_dir_all(dir);
}
