//! Reference backend: a small JSON/HTTP server speaking the same endpoints
//! [`HttpBackend`](crate::backend::HttpBackend) calls, with rule-based
//! feedback and chat routing. Useful for local development and tests; it is
//! not a feedback or scoring engine.

use std::sync::{Arc, Mutex};

use colored::*;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::backend::{Answers, ChatRequest, EvaluationRequest, SeedRequest, StatusResponse};
use crate::panel::ChatMessage;
use crate::router::{ChatReply, RawTargets};

/// Shared in-memory answer storage.
pub type AnswerStore = Arc<Mutex<Answers>>;

pub const SAVED_MESSAGE: &str = "All answers saved successfully!";
pub const EMPTY_ANSWER_FEEDBACK: &str = "Please provide an answer before getting feedback.";
pub const SHORT_ANSWER_FEEDBACK: &str = "Try to elaborate more on your response.";
pub const GOOD_ANSWER_FEEDBACK: &str = "Great response! You provided a well-thought-out answer.";

const MAX_REQUEST_BYTES: usize = 1024 * 1024;
const MAX_HEADERS: usize = 32;

pub fn new_answer_store() -> AnswerStore {
    Arc::new(Mutex::new(Answers::new()))
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        HttpResponse {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        HttpResponse::json(status, &serde_json::json!({ "error": message }))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let reason = match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        };
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
            self.status,
            reason,
            self.content_type,
            self.body.len(),
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

// ---------------------------------------------------------------------------
// Rule-based replies
// ---------------------------------------------------------------------------

/// Text up to and including the first sentence terminator, trimmed.
pub fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find(['.', '!', '?']) {
        Some(end) => trimmed[..=end].trim(),
        None => trimmed,
    }
}

/// Feedback reply for one answer, shaped `{qid: [..], qid_extracts: [..]}`.
pub fn feedback_for(question_id: &str, answer: &str) -> serde_json::Value {
    let words = answer.split_whitespace().count();
    let (message, extracts): (&str, Vec<&str>) = if words == 0 {
        (EMPTY_ANSWER_FEEDBACK, Vec::new())
    } else if words < 10 {
        (SHORT_ANSWER_FEEDBACK, vec![answer.trim()])
    } else {
        (GOOD_ANSWER_FEEDBACK, vec![first_sentence(answer)])
    };
    let mut body = serde_json::Map::new();
    body.insert(question_id.to_string(), serde_json::json!([message]));
    body.insert(format!("{question_id}_extracts"), serde_json::json!(extracts));
    serde_json::Value::Object(body)
}

/// Word-count completeness heuristic.
pub fn score_for(answer: &str) -> f64 {
    (answer.split_whitespace().count() as f64 / 50.0).min(1.0)
}

pub fn conversation_for(request: &SeedRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(
            "Agent",
            format!("About question {}: {}", request.question_id, request.feedback),
        ),
        ChatMessage::new("Agent", "What would you like to change in your answer?"),
    ]
}

/// Keyword routing for chat messages.
///
/// Keywords match whole words, not substrings, on purpose: "this" does not
/// trigger the greeting and "said" does not trigger the AI reply.
pub fn chat_reply(message: &str) -> ChatReply {
    let lowered = message.to_lowercase();
    if lowered.trim().is_empty() {
        return ChatReply {
            response: "Please enter a message.".to_string(),
            target: RawTargets::One("chat".to_string()),
        };
    }
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |w: &str| words.contains(&w);

    let mut response = "That's interesting! Could you elaborate?";
    let mut targets = vec!["chat".to_string()];

    if has("hello") || has("hi") {
        response = "Hello! How can I assist you today?";
    }
    if has("feedback") || has("evaluate") {
        response = "Hello! How can I assist you today?";
        targets = vec!["feedback-q2".to_string()];
    }
    if has("technology") {
        response = "Technology is evolving rapidly! What specific aspect interests you?";
        targets.push("feedback-q1".to_string());
    }
    if has("ai") {
        response = "AI is transforming many industries. Do you think it will be beneficial?";
        targets.push("feedback-q2".to_string());
    }

    ChatReply {
        response: response.to_string(),
        target: RawTargets::Many(targets),
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| HttpResponse::error(400, &e.to_string()))
}

/// Dispatch one request to its handler.
pub fn route(method: &str, path: &str, body: &[u8], store: &AnswerStore) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/") => HttpResponse {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: b"answer-overlay reference backend\n".to_vec(),
        },
        ("POST", "/save_answers") => match parse_body::<Answers>(body) {
            Ok(answers) => {
                if let Ok(mut guard) = store.lock() {
                    guard.extend(answers);
                }
                HttpResponse::json(
                    200,
                    &StatusResponse {
                        message: SAVED_MESSAGE.to_string(),
                    },
                )
            }
            Err(resp) => resp,
        },
        ("GET", "/get_answers") => {
            let answers = store.lock().map(|g| g.clone()).unwrap_or_default();
            HttpResponse::json(200, &answers)
        }
        ("POST", "/generate_feedback") => match parse_body::<EvaluationRequest>(body) {
            Ok(req) if req.question_id.trim().is_empty() => {
                HttpResponse::error(400, "question_id is required")
            }
            Ok(req) => HttpResponse::json(200, &feedback_for(&req.question_id, &req.answer)),
            Err(resp) => resp,
        },
        ("POST", "/score_answer") => match parse_body::<EvaluationRequest>(body) {
            Ok(req) => HttpResponse::json(200, &serde_json::json!({ "score": score_for(&req.answer) })),
            Err(resp) => resp,
        },
        ("POST", "/start_conversation") => match parse_body::<SeedRequest>(body) {
            Ok(req) => HttpResponse::json(200, &conversation_for(&req)),
            Err(resp) => resp,
        },
        ("POST", "/chat") => match parse_body::<ChatRequest>(body) {
            Ok(req) => HttpResponse::json(200, &chat_reply(&req.message)),
            Err(resp) => resp,
        },
        (_, "/" | "/save_answers" | "/get_answers" | "/generate_feedback" | "/score_answer"
            | "/start_conversation" | "/chat") => HttpResponse::error(405, "method not allowed"),
        _ => HttpResponse::error(404, "not found"),
    }
}

// ---------------------------------------------------------------------------
// Server loop
// ---------------------------------------------------------------------------

/// Bind to `127.0.0.1:port` and serve until the process stops.
pub async fn serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    eprintln!(
        "{}",
        format!("  Reference backend running at http://localhost:{}", port).bright_green()
    );
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());
    serve_on(listener, new_answer_store()).await?;
    Ok(())
}

/// Serve connections from an already-bound listener.
pub async fn serve_on(listener: TcpListener, store: AnswerStore) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, store).await {
                warn!(peer = %addr, error = %e, "connection error");
            }
        });
    }
}

struct ParsedRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

enum ReadOutcome {
    Request(ParsedRequest),
    Rejected(HttpResponse),
    Closed,
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<ReadOutcome> {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(ReadOutcome::Rejected(HttpResponse::error(413, "request too large")));
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        let header_len = match req.parse(&buf) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) => continue,
            Err(e) => return Ok(ReadOutcome::Rejected(HttpResponse::error(400, &e.to_string()))),
        };
        let content_length = req
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-length"))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if header_len + content_length > MAX_REQUEST_BYTES {
            return Ok(ReadOutcome::Rejected(HttpResponse::error(413, "request too large")));
        }
        if buf.len() < header_len + content_length {
            continue;
        }
        return Ok(ReadOutcome::Request(ParsedRequest {
            method: req.method.unwrap_or("GET").to_string(),
            path: req.path.unwrap_or("/").to_string(),
            body: buf[header_len..header_len + content_length].to_vec(),
        }));
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    store: AnswerStore,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let response = match read_request(&mut stream).await? {
        ReadOutcome::Request(req) => {
            debug!(method = %req.method, path = %req.path, bytes = req.body.len(), "request");
            route(&req.method, &req.path, &req.body, &store)
        }
        ReadOutcome::Rejected(resp) => resp,
        ReadOutcome::Closed => return Ok(()),
    };
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{DispatchTarget, TargetList};

    fn targets(reply: ChatReply) -> Vec<DispatchTarget> {
        TargetList::from(reply.target).as_slice().to_vec()
    }

    fn json(resp: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("  One. Two."), "One.");
        assert_eq!(first_sentence("No terminator"), "No terminator");
        assert_eq!(first_sentence("Really? Yes."), "Really?");
    }

    #[test]
    fn test_feedback_short_answer() {
        let body = feedback_for("q1", "Too short");
        assert_eq!(body["q1"][0], SHORT_ANSWER_FEEDBACK);
        assert_eq!(body["q1_extracts"][0], "Too short");
    }

    #[test]
    fn test_feedback_long_answer() {
        let answer = "We help children. We run twelve programmes across four regions every year.";
        let body = feedback_for("q2", answer);
        assert_eq!(body["q2"][0], GOOD_ANSWER_FEEDBACK);
        assert_eq!(body["q2_extracts"][0], "We help children.");
    }

    #[test]
    fn test_feedback_empty_answer() {
        let body = feedback_for("q3", "   ");
        assert_eq!(body["q3"][0], EMPTY_ANSWER_FEEDBACK);
        assert_eq!(body["q3_extracts"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_score_for_caps_at_one() {
        assert_eq!(score_for(""), 0.0);
        assert!((score_for("one two three four five") - 0.1).abs() < 1e-9);
        assert_eq!(score_for(&"w ".repeat(80)), 1.0);
    }

    #[test]
    fn test_chat_default_goes_to_chat() {
        let reply = chat_reply("Tell me something");
        assert_eq!(reply.response, "That's interesting! Could you elaborate?");
        assert_eq!(targets(reply), vec![DispatchTarget::Chat]);
    }

    #[test]
    fn test_chat_empty_message() {
        let reply = chat_reply("   ");
        assert_eq!(reply.response, "Please enter a message.");
        assert_eq!(reply.target, RawTargets::One("chat".into()));
    }

    #[test]
    fn test_chat_technology_adds_q1() {
        let reply = chat_reply("What about technology?");
        assert_eq!(
            targets(reply),
            vec![DispatchTarget::Chat, DispatchTarget::Panel("q1".into())]
        );
    }

    #[test]
    fn test_chat_feedback_replaces_targets() {
        let reply = chat_reply("Please evaluate my AI text");
        assert_eq!(
            targets(reply),
            vec![
                DispatchTarget::Panel("q2".into()),
                DispatchTarget::Panel("q2".into())
            ]
        );
    }

    #[test]
    fn test_chat_hi_is_whole_word() {
        let reply = chat_reply("this and that");
        assert_eq!(reply.response, "That's interesting! Could you elaborate?");
    }

    #[test]
    fn test_chat_ai_is_whole_word() {
        let reply = chat_reply("she said so");
        assert_eq!(reply.response, "That's interesting! Could you elaborate?");
        assert_eq!(targets(reply), vec![DispatchTarget::Chat]);
    }

    #[test]
    fn test_route_save_then_get() {
        let store = new_answer_store();
        let resp = route("POST", "/save_answers", br#"{"q1":"mission"}"#, &store);
        assert_eq!(resp.status, 200);
        assert_eq!(json(&resp)["message"], SAVED_MESSAGE);
        let resp = route("GET", "/get_answers", b"", &store);
        assert_eq!(json(&resp)["q1"], "mission");
    }

    #[test]
    fn test_route_bad_json_is_400() {
        let store = new_answer_store();
        assert_eq!(route("POST", "/chat", b"not json", &store).status, 400);
    }

    #[test]
    fn test_route_missing_question_id_is_400() {
        let store = new_answer_store();
        let resp = route(
            "POST",
            "/generate_feedback",
            br#"{"question_id":"","answer":"x"}"#,
            &store,
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn test_route_unknown_and_wrong_method() {
        let store = new_answer_store();
        assert_eq!(route("GET", "/nope", b"", &store).status, 404);
        assert_eq!(route("GET", "/chat", b"", &store).status, 405);
    }

    #[test]
    fn test_response_bytes_have_length() {
        let resp = HttpResponse::error(404, "not found");
        let text = String::from_utf8(resp.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains(&format!("Content-Length: {}", resp.body.len())));
    }
}
