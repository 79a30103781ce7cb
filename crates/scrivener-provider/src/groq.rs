use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::prompt::system_prompt;
use crate::{ChunkStream, ContextMessage, GenerationOptions, Generator, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Models offered by the hosted endpoint.
pub const AVAILABLE_MODELS: [&str; 4] = [
    "llama-3.3-70b-versatile",
    "llama-3.1-70b-versatile",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default).
///
/// The API key is only exposed while building the Authorization header.
pub struct GroqClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// One `data:` payload of a streamed completion.
#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

/// What a single line of the event stream carries.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Text(String),
    Done,
    Skip,
}

impl GroqClient {
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn available_models() -> &'static [&'static str] {
        &AVAILABLE_MODELS
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send_chat(
        &self,
        context: &[ContextMessage],
        options: &GenerationOptions,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let system = system_prompt(options.content_type, options.tone, options.length);
        let mut messages = Vec::with_capacity(context.len() + 1);
        messages.push(WireMessage { role: "system", content: &system });
        messages.extend(context.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let body = ChatRequest {
            model: &options.model,
            messages,
            stream,
            max_tokens: None,
        };

        debug!(model = %options.model, turns = context.len(), stream, "Sending chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!("Chat completion failed: {}", err);
            return Err(err);
        }
        Ok(response)
    }

    /// Send a tiny completion to confirm the key and model are accepted.
    pub async fn check_connection(&self, model: &str) -> Result<(), ProviderError> {
        let body = ChatRequest {
            model,
            messages: vec![WireMessage { role: "user", content: "test" }],
            stream: false,
            max_tokens: Some(5),
        };
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .timeout(PROBE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

impl Generator for GroqClient {
    async fn generate(
        &self,
        context: &[ContextMessage],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let response = self.send_chat(context, options, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("response contained no text".into()))
    }

    /// Server-sent `data:` lines, one delta each, ending with `[DONE]`.
    fn generate_stream<'a>(&'a self, context: &'a [ContextMessage], options: &'a GenerationOptions) -> ChunkStream<'a> {
        Box::pin(async_stream::try_stream! {
            let response = self.send_chat(context, options, true).await?;
            let mut body = response.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();
            let mut produced = false;
            let mut finished = false;

            while !finished {
                let Some(bytes) = body.next().await else {
                    break;
                };
                pending.extend_from_slice(&bytes.map_err(map_transport_error)?);

                while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=end).collect();
                    match parse_stream_line(&line)? {
                        StreamLine::Text(text) => {
                            produced = true;
                            yield text;
                        }
                        StreamLine::Done => {
                            finished = true;
                            break;
                        }
                        StreamLine::Skip => {}
                    }
                }
            }

            // A final line may come without its newline
            if !finished {
                if let StreamLine::Text(text) = parse_stream_line(&pending)? {
                    produced = true;
                    yield text;
                }
            }

            if !produced {
                Err::<(), _>(ProviderError::InvalidResponse("stream contained no text".into()))?;
            }
        })
    }
}

fn parse_stream_line(line: &[u8]) -> Result<StreamLine, ProviderError> {
    let line = std::str::from_utf8(line).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::InvalidResponse(format!("bad stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty())
        .map_or(StreamLine::Skip, StreamLine::Text))
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, body)
}

pub(crate) fn classify_status(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after_secs },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthRejected,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        s if s.is_server_error() => ProviderError::Unavailable(format!("HTTP {s}")),
        s => ProviderError::Rejected {
            status: s.as_u16(),
            message: body,
        },
    }
}
