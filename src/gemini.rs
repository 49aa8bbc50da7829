//! Streaming client for the Gemini `streamGenerateContent` endpoint.
//!
//! [`Gemini`] implements [`Completion`]: a chat started from a stored history sends the whole
//! conversation with every prompt and records the exchange in its history once the reply
//! stream has been drained.

use std::env;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::completion::{ChatHandle, Completion, FragmentStream};
use crate::error::{Error, Result};
use crate::sse::process_sse;
use crate::types::ModelHistoryEntry;

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable the API key is read from by default.
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// One turn of a Gemini conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`.
    pub role: String,
    /// The parts of the turn.
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// A model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenates the text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// A part of a turn.  Only text parts are produced by Talkie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// The text of the part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

/// One streamed chunk of a reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate replies; Talkie reads the first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Feedback on the prompt, present when it was blocked.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    /// Set instead of `candidates` when the server fails mid-stream.
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl GenerateContentResponse {
    /// The text carried by the first candidate of this chunk.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(Content::text)
            .unwrap_or_default()
    }

    /// Turns an error event or a blocked prompt into an error.
    pub fn into_result(self) -> Result<Self> {
        if let Some(error) = self.error {
            return Err(Error::streaming(
                format!("reply stream failed: {error}"),
                None,
            ));
        }
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(Error::bad_request(format!("prompt blocked: {reason}")));
        }
        Ok(self)
    }
}

/// The error object Gemini returns, either as a response body or as a streamed event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// HTTP-style status code.
    #[serde(default)]
    pub code: Option<u16>,
    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,
    /// Status name such as `INTERNAL`.
    #[serde(default)]
    pub status: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status.as_deref().unwrap_or("error");
        match (self.code, self.message.as_deref()) {
            (Some(code), Some(message)) => write!(f, "{status} ({code}): {message}"),
            (Some(code), None) => write!(f, "{status} ({code})"),
            (None, Some(message)) => write!(f, "{status}: {message}"),
            (None, None) => f.write_str(status),
        }
    }
}

/// A candidate reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The content of the candidate.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped, on the last chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Feedback on a prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Set when the prompt was blocked.
    #[serde(default)]
    pub block_reason: Option<String>,
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Client for the Gemini API.
#[derive(Debug, Clone)]
pub struct Gemini {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    model: String,
    timeout: Duration,
}

impl Gemini {
    /// Create a new Gemini client for the default model.
    ///
    /// The API key can be provided directly or read from the GOOGLE_API_KEY environment
    /// variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_API_KEY_ENV, None, DEFAULT_MODEL, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        api_key_env: &str,
        base_url: Option<&str>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(api_key_env).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {api_key_env} environment variable not set"
                ))
            })?,
        };

        let mut base_url = Url::parse(base_url.unwrap_or(DEFAULT_API_URL))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            model: model.into(),
            timeout,
        })
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::authentication("API key contains invalid characters"))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    fn stream_url(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("models/{}:streamGenerateContent", self.model))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|d| d.status.clone());
        let error_message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            400 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message, Some("model".to_string()), None),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message),
        }
    }

    /// Send a conversation and get a streaming response.
    pub async fn stream_generate(&self, contents: &[Content]) -> Result<ResponseStream> {
        let url = self.stream_url()?;

        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(&GenerateContentRequest { contents })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let events = process_sse(Box::pin(response.bytes_stream()));
        Ok(Box::pin(events.map(|event| {
            let event = event?;
            let chunk: GenerateContentResponse = serde_json::from_str(&event.data)?;
            chunk.into_result()
        })))
    }
}

impl Completion for Gemini {
    type Chat = GeminiChat;

    fn start_session(&self, history: Vec<ModelHistoryEntry>) -> GeminiChat {
        // Entries that are not Gemini contents cannot be replayed and are skipped.
        let contents = history
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry.into_value()).ok())
            .collect();
        GeminiChat {
            client: self.clone(),
            history: Arc::new(Mutex::new(contents)),
        }
    }
}

/// A Gemini chat.  The history is shared with in-flight reply streams, which append the
/// exchange when they complete.
pub struct GeminiChat {
    client: Gemini,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChat {
    fn contents(&self) -> Vec<Content> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatHandle for GeminiChat {
    async fn send(&mut self, prompt: &str) -> Result<FragmentStream> {
        let user = Content::user(prompt);
        let mut contents = self.contents();
        contents.push(user.clone());
        let responses = self.client.stream_generate(&contents).await?;
        Ok(Box::pin(record_reply(
            responses,
            Arc::clone(&self.history),
            user,
        )))
    }

    fn history(&self) -> Vec<ModelHistoryEntry> {
        self.contents()
            .into_iter()
            .filter_map(|content| serde_json::to_value(content).ok())
            .map(ModelHistoryEntry::new)
            .collect()
    }
}

/// Maps response chunks to text fragments, appending the user turn and the full reply to
/// `history` once the stream ends without error.
fn record_reply(
    responses: ResponseStream,
    history: Arc<Mutex<Vec<Content>>>,
    user: Content,
) -> impl Stream<Item = Result<String>> + Send {
    let pending = Some((history, user));
    stream::unfold(
        (responses, String::new(), pending),
        |(mut responses, mut reply, mut pending)| async move {
            loop {
                match responses
                    .next()
                    .await
                    .map(|chunk| chunk.and_then(GenerateContentResponse::into_result))
                {
                    Some(Ok(chunk)) => {
                        let text = chunk.text();
                        if text.is_empty() {
                            continue;
                        }
                        reply.push_str(&text);
                        return Some((Ok(text), (responses, reply, pending)));
                    }
                    Some(Err(e)) => {
                        pending = None;
                        return Some((Err(e), (responses, reply, pending)));
                    }
                    None => {
                        if let Some((history, user)) = pending.take() {
                            if let Ok(mut history) = history.lock() {
                                history.push(user);
                                history.push(Content::model(reply.clone()));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}
