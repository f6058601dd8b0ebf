//! Completion client: the one place that knows the provider's
//! request and response shapes. The rest of the crate only sees
//! `CompletionClient`, `RequestMessage` and `Completion`.

use serde::Deserialize;
use serde_json::json;

use crate::models::{Completion, RequestMessage, Usage};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Cannot reach completion endpoint at {0}")]
    Connection(String),
    #[error("Completion request timed out after {0}s")]
    Timeout(u64),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Completion endpoint returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("Response parsing failed: {0}")]
    ResponseParsing(String),
    #[error("Transcript could not be persisted: {0}")]
    Persistence(#[from] crate::transcript::PersistenceError),
}

/// Per-call generation knobs, fixed at service start.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    /// Let the provider consult external information sources.
    pub web_search: bool,
    /// Output length budget.
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            web_search: true,
            max_output_tokens: 800,
        }
    }
}

/// Boundary trait between the conversation session and the provider.
pub trait CompletionClient: Send + Sync {
    fn generate(
        &self,
        messages: &[RequestMessage],
        options: &GenerationOptions,
    ) -> Result<Completion, GenerationError>;
}

/// Whole-request timeout; generation with web search can be slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP client for an OpenAI-style `/v1/responses` endpoint.
pub struct ResponsesClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ResponsesClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Build the provider request body.
    ///
    /// Text travels as `input_text` parts; an attached image becomes an
    /// `input_image` part carrying a base64 data-URL.
    fn build_body(
        &self,
        messages: &[RequestMessage],
        options: &GenerationOptions,
    ) -> serde_json::Value {
        let input: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let mut content = vec![json!({
                    "type": "input_text",
                    "text": m.text,
                })];
                if let Some(img) = &m.image {
                    content.push(json!({
                        "type": "input_image",
                        "image_url": img.data_url(),
                    }));
                }
                json!({ "role": m.role.as_str(), "content": content })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "input": input,
            "max_output_tokens": options.max_output_tokens,
        });
        if options.web_search {
            body["tools"] = json!([{ "type": "web_search" }]);
        }
        body
    }
}

/// Response body from the `/v1/responses` endpoint. Every field the
/// provider might omit is optional or defaulted; a sparse response
/// must not become a parse failure.
#[derive(Debug, Deserialize)]
struct ResponsesApiResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Collect every `output_text` segment across message items, in order.
/// Zero segments yields an empty string, never an error.
fn collect_output_text(response: &ResponsesApiResponse) -> String {
    let mut text = String::new();
    for item in &response.output {
        if item.kind != "message" {
            continue;
        }
        for part in &item.content {
            if part.kind == "output_text" {
                text.push_str(&part.text);
            }
        }
    }
    text
}

fn normalize_usage(usage: Option<ApiUsage>) -> Usage {
    let u = usage.unwrap_or_default();
    Usage {
        input_units: u.input_tokens,
        output_units: u.output_tokens,
        total_units: u.total_tokens,
    }
}

impl CompletionClient for ResponsesClient {
    fn generate(
        &self,
        messages: &[RequestMessage],
        options: &GenerationOptions,
    ) -> Result<Completion, GenerationError> {
        let url = format!("{}/v1/responses", self.base_url);
        let body = self.build_body(messages, options);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    GenerationError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResponsesApiResponse = response
            .json()
            .map_err(|e| GenerationError::ResponseParsing(e.to_string()))?;

        let text = collect_output_text(&parsed);
        let usage = normalize_usage(parsed.usage);
        tracing::debug!(
            output_chars = text.len(),
            total_units = usage.total_units,
            "completion received"
        );

        Ok(Completion { text, usage })
    }
}

/// Mock completion client for tests: fixed reply or forced failure.
pub struct MockCompletionClient {
    reply: Result<String, String>,
    calls: std::sync::Mutex<Vec<Vec<RequestMessage>>>,
}

impl MockCompletionClient {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Message lists this mock has been called with.
    pub fn calls(&self) -> Vec<Vec<RequestMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompletionClient for MockCompletionClient {
    fn generate(
        &self,
        messages: &[RequestMessage],
        _options: &GenerationOptions,
    ) -> Result<Completion, GenerationError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                usage: Usage {
                    input_units: 10,
                    output_units: 5,
                    total_units: 15,
                },
            }),
            Err(reason) => Err(GenerationError::HttpClient(reason.clone())),
        }
    }
}
