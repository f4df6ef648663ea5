#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use questionmate::clients::{MockBackend, MockHandle, MockResponse};
use questionmate::config::ClientConfig;
use questionmate::quiz::{Options, Question, QuestionBatch, SessionId, StartedQuiz};

/// A well-formed A/B question.
pub fn question(prompt: &str, correct: &str) -> Question {
    Question::new(
        prompt,
        Options::from_pairs([("A", format!("{} a", prompt)), ("B", format!("{} b", prompt))]),
        correct,
        format!("ref for {}", prompt),
    )
}

/// A question whose options could not be parsed.
pub fn broken_question(prompt: &str) -> Question {
    Question::new(prompt, Options::Broken, "A", "")
}

pub fn questions(prompts: &[&str]) -> Vec<Question> {
    prompts.iter().map(|p| question(p, "A")).collect()
}

pub fn started(session_id: &str, qs: Vec<Question>) -> StartedQuiz {
    StartedQuiz {
        session_id: SessionId::new(session_id),
        quiz: QuestionBatch::new(qs),
    }
}

/// Unsigned JWT-shaped token carrying `payload` as claims.
pub fn token_with_claims(payload: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.as_bytes());
    format!("{}.{}.signature", header, body)
}

pub fn token_for(username: &str) -> String {
    token_with_claims(&format!(r#"{{"sub":"{}","exp":4102444800}}"#, username))
}

pub fn mock_backend(responses: Vec<MockResponse>) -> (MockBackend, Arc<MockHandle>) {
    MockBackend::with_responses(responses)
}

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh directory under the system temp dir, unique per call.
pub fn scratch_dir(name: &str) -> PathBuf {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "questionmate-{}-{}-{}-{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        n
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// One HTTP request as seen on the wire.
#[derive(Debug)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn dechunk(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = raw;
    while let Some(line_end) = find(rest, b"\r\n") {
        let size_text = String::from_utf8_lossy(&rest[..line_end]).trim().to_string();
        let size = usize::from_str_radix(&size_text, 16).unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&rest[start..start + size]);
        rest = &rest[start + size + 2..];
    }
    out
}

async fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "connection closed before the request headers ended");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok());
    let chunked = headers
        .iter()
        .any(|(k, v)| k == "transfer-encoding" && v.contains("chunked"));

    let mut body = buf[header_end..].to_vec();
    loop {
        let complete = match length {
            Some(len) => body.len() >= len,
            None if chunked => body.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
        let n = stream.read(&mut chunk).await.expect("read request body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    if chunked {
        body = dechunk(&body);
    }

    RecordedRequest {
        request_line,
        headers,
        body,
    }
}

/// Serve exactly one HTTP request on a loopback port with a canned reply.
///
/// Returns a config pointing at the server and a handle yielding the request
/// it received.
pub async fn serve_once(
    status: u16,
    content_type: &str,
    body: impl Into<Vec<u8>>,
) -> (ClientConfig, JoinHandle<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    let content_type = content_type.to_string();
    let body = body.into();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut stream).await;
        let head = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        stream.write_all(head.as_bytes()).await.expect("write head");
        stream.write_all(&body).await.expect("write body");
        stream.flush().await.expect("flush");
        let _ = stream.shutdown().await;
        request
    });

    let config = ClientConfig::default().with_base_url(format!("http://{}", addr));
    (config, handle)
}
