//! Boundary with the feedback, scoring, chat and persistence services.
//!
//! [`Backend`] is the narrow interface the workspace depends on;
//! [`HttpBackend`] speaks it over JSON/HTTP with `reqwest`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotate::FeedbackFragment;
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::panel::ChatMessage;
use crate::router::ChatReply;

/// Answers keyed by question id.
pub type Answers = BTreeMap<String, String>;

/// Body of the feedback and scoring requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub question_id: String,
    pub answer: String,
    #[serde(default)]
    pub context: String,
}

/// Body of a panel-item click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRequest {
    pub question_id: String,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

/// Feedback for one question: messages plus the fragments they point at,
/// aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackResponse {
    pub feedback: Vec<String>,
    pub fragments: Vec<FeedbackFragment>,
}

impl FeedbackResponse {
    /// Extract the feedback for `question_id` from a service reply.
    ///
    /// `<qid>` holds a list of strings (a bare string counts as one) and is
    /// required. `<qid>_extracts` holds the literal fragments and may be
    /// absent, in which case nothing gets highlighted.
    pub fn from_json(question_id: &str, body: &serde_json::Value) -> Result<Self, BackendError> {
        let feedback = match body.get(question_id) {
            Some(value) => string_list(question_id, value)?,
            None => return Err(BackendError::malformed(question_id, "key absent")),
        };
        let extracts_key = format!("{question_id}_extracts");
        let extracts = match body.get(&extracts_key) {
            Some(value) => string_list(&extracts_key, value)?,
            None => Vec::new(),
        };
        let fragments = extracts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let message = feedback.get(i).cloned().unwrap_or_default();
                FeedbackFragment::new(i, text, message)
            })
            .collect();
        Ok(FeedbackResponse {
            feedback,
            fragments,
        })
    }
}

fn string_list(field: &str, value: &serde_json::Value) -> Result<Vec<String>, BackendError> {
    match value {
        serde_json::Value::String(s) => Ok(vec![s.clone()]),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| BackendError::malformed(field, "expected a list of strings"))
            })
            .collect(),
        _ => Err(BackendError::malformed(field, "expected a string or list of strings")),
    }
}

/// Result of saving: a status line, or a document to store client-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Status(String),
    Artifact { filename: String, bytes: Vec<u8> },
}

/// The remote collaborator. Every call is a single request/response; no
/// retries happen here.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn generate_feedback(
        &self,
        request: &EvaluationRequest,
    ) -> Result<FeedbackResponse, BackendError>;

    /// Score in `[0, 1]`.
    async fn score_answer(&self, request: &EvaluationRequest) -> Result<f64, BackendError>;

    async fn start_conversation(
        &self,
        request: &SeedRequest,
    ) -> Result<Vec<ChatMessage>, BackendError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;

    async fn save_answers(&self, answers: &Answers) -> Result<SaveOutcome, BackendError>;

    async fn load_answers(&self) -> Result<Answers, BackendError>;
}

/// JSON-over-HTTP backend.
pub struct HttpBackend {
    base_url: String,
    export_filename: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Self {
        // Builder failure only happens in broken TLS environments; fall back
        // to a default client rather than panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        HttpBackend {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            export_filename: config.export_filename.clone(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;
        check_status(resp, url)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, BackendError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;
        check_status(resp, url)
    }
}

fn check_status(resp: reqwest::Response, url: String) -> Result<reqwest::Response, BackendError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(BackendError::Http {
            status: resp.status().as_u16(),
            url,
        })
    }
}

async fn read_json<R: DeserializeOwned>(
    resp: reqwest::Response,
    field: &str,
) -> Result<R, BackendError> {
    let url = resp.url().to_string();
    let bytes = resp.bytes().await.map_err(|e| BackendError::Transport {
        url,
        detail: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::malformed(field, e.to_string()))
}

impl Backend for HttpBackend {
    async fn generate_feedback(
        &self,
        request: &EvaluationRequest,
    ) -> Result<FeedbackResponse, BackendError> {
        let resp = self.post("/generate_feedback", request).await?;
        let body: serde_json::Value = read_json(resp, "body").await?;
        FeedbackResponse::from_json(&request.question_id, &body)
    }

    async fn score_answer(&self, request: &EvaluationRequest) -> Result<f64, BackendError> {
        let resp = self.post("/score_answer", request).await?;
        let body: ScoreResponse = read_json(resp, "score").await?;
        Ok(body.score.clamp(0.0, 1.0))
    }

    async fn start_conversation(
        &self,
        request: &SeedRequest,
    ) -> Result<Vec<ChatMessage>, BackendError> {
        let resp = self.post("/start_conversation", request).await?;
        read_json(resp, "conversation").await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let resp = self.post("/chat", request).await?;
        read_json(resp, "response").await
    }

    async fn save_answers(&self, answers: &Answers) -> Result<SaveOutcome, BackendError> {
        let resp = self.post("/save_answers", answers).await?;
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let status: StatusResponse = read_json(resp, "message").await?;
            return Ok(SaveOutcome::Status(status.message));
        }
        let url = resp.url().to_string();
        let bytes = resp.bytes().await.map_err(|e| BackendError::Transport {
            url,
            detail: e.to_string(),
        })?;
        Ok(SaveOutcome::Artifact {
            filename: self.export_filename.clone(),
            bytes: bytes.to_vec(),
        })
    }

    async fn load_answers(&self) -> Result<Answers, BackendError> {
        let resp = self.get("/get_answers").await?;
        let raw: BTreeMap<String, serde_json::Value> = read_json(resp, "answers").await?;
        Ok(raw
            .into_iter()
            .map(|(k, v)| {
                let text = v.as_str().map(str::to_string).unwrap_or_default();
                (k, text)
            })
            .collect())
    }
}
