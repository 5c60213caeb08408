//! OpenAI-compatible chat completions (OpenRouter, OpenAI, and look-alikes).

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ProviderError;
use super::lines::LineBuffer;
use super::pricing::PricingTable;
use super::traits::{ChatStream, ChunkSender, Provider};
use super::types::{ChatChunk, ChatRequest, ChatUsage, ContentPart, Credentials, Message};

const STREAM_BUFFER: usize = 32;

/// Endpoint currently in use. Replaced wholesale on credential update.
#[derive(Debug, Clone)]
struct Endpoint {
    api_base: String,
    api_key: Option<String>,
}

/// Client for any backend speaking the `/chat/completions` protocol.
pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    endpoint: RwLock<Arc<Endpoint>>,
    pricing: PricingTable,
    /// OpenRouter reports cost in the usage block when asked.
    request_cost: bool,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        api_base: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            endpoint: RwLock::new(Arc::new(Endpoint {
                api_base: api_base.into(),
                api_key,
            })),
            pricing: PricingTable::default(),
            request_cost: false,
        }
    }

    /// OpenRouter defaults: named "openrouter", asks the backend for cost.
    pub fn openrouter(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        let mut provider = Self::new("openrouter", api_base, api_key);
        provider.request_cost = true;
        provider
    }

    pub fn openai(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self::new("openai", api_base, api_key)
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn api_base(&self) -> String {
        self.endpoint().api_base.clone()
    }

    pub fn has_api_key(&self) -> bool {
        self.endpoint().api_key.is_some()
    }

    fn endpoint(&self) -> Arc<Endpoint> {
        self.endpoint
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn build_body<'a>(&self, request: &'a ChatRequest) -> WireRequest<'a> {
        WireRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_wire_message).collect(),
            stream: request.stream,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream_options: request.stream.then_some(StreamOptions {
                include_usage: true,
            }),
            usage: self.request_cost.then_some(UsageOptions { include: true }),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, ProviderError> {
        let endpoint = self.endpoint();
        let api_key = endpoint
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured(self.name.clone()))?;

        let body = self.build_body(&request);
        let url = format!("{}/chat/completions", endpoint.api_base.trim_end_matches('/'));
        debug!(provider = %self.name, model = %request.model, stream = request.stream, "Sending chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(ProviderError::Api { status, message });
        }

        let pricing = UsagePricing {
            table: self.pricing.clone(),
            model: request.model.clone(),
        };

        if !request.stream {
            let parsed: WireChunk = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let event = decode_event(parsed)?;
            let usage = event.usage.map(|u| pricing.apply(u));
            return Ok(ChatStream::from_chunks(vec![
                Ok(ChatChunk::text(event.texts.concat())),
                Ok(ChatChunk::done(usage)),
            ]));
        }

        let (tx, stream) = ChatStream::channel(STREAM_BUFFER);
        let provider = self.name.clone();
        tokio::spawn(async move {
            pump_sse(response, tx, pricing).await;
            debug!(provider = %provider, "Chat stream producer finished");
        });
        Ok(stream)
    }

    fn update_credentials(&self, credentials: Credentials) -> Result<(), ProviderError> {
        let mut guard = self
            .endpoint
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = guard.clone();
        *guard = Arc::new(Endpoint {
            api_base: credentials.api_base.unwrap_or_else(|| current.api_base.clone()),
            api_key: credentials.api_key.or_else(|| current.api_key.clone()),
        });
        debug!(provider = %self.name, "Credentials updated");
        Ok(())
    }
}

struct UsagePricing {
    table: PricingTable,
    model: String,
}

impl UsagePricing {
    fn apply(&self, mut usage: ChatUsage) -> ChatUsage {
        if usage.cost.is_none() {
            usage.cost = self
                .table
                .cost(&self.model, usage.input_tokens, usage.output_tokens);
        }
        usage
    }
}

/// Reads the SSE body and forwards chunks until `[DONE]`, an error, or the consumer leaves.
async fn pump_sse(response: reqwest::Response, tx: ChunkSender, pricing: UsagePricing) {
    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::default();
    let mut usage: Option<ChatUsage> = None;

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("Chat stream consumer dropped, aborting request");
                return;
            }
            next = body.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tx.send(Err(ProviderError::Http(e.to_string()))).await;
                return;
            }
            None => break,
        };

        for line in lines.push(&bytes) {
            let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if data == "[DONE]" {
                tx.send(Ok(ChatChunk::done(usage.map(|u| pricing.apply(u)))))
                    .await;
                return;
            }
            if data.is_empty() {
                continue;
            }

            let event = serde_json::from_str::<WireChunk>(data)
                .map_err(|e| ProviderError::Malformed(format!("{}: {}", e, data)))
                .and_then(decode_event);
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tx.send(Err(e)).await;
                    return;
                }
            };

            if event.usage.is_some() {
                usage = event.usage;
            }
            for text in event.texts {
                if !tx.send(Ok(ChatChunk::text(text))).await {
                    return;
                }
            }
        }
    }

    warn!("Chat stream ended without [DONE]");
    tx.send(Ok(ChatChunk::done(usage.map(|u| pricing.apply(u)))))
        .await;
}

#[derive(Debug, Default, PartialEq)]
struct DecodedEvent {
    texts: Vec<String>,
    usage: Option<ChatUsage>,
}

fn decode_event(chunk: WireChunk) -> Result<DecodedEvent, ProviderError> {
    if let Some(error) = chunk.error {
        let status = error
            .code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(502);
        return Err(ProviderError::Api {
            status,
            message: error.message,
        });
    }

    let texts = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.or(choice.message))
        .filter_map(|delta| delta.content)
        .filter(|text| !text.is_empty())
        .collect();

    let usage = chunk.usage.map(|u| ChatUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        cost: u.cost,
    });

    Ok(DecodedEvent { texts, usage })
}

fn to_wire_message(message: &Message) -> WireMessage {
    let content = if message.is_text_only() {
        WireContent::Text(message.text())
    } else {
        WireContent::Parts(
            message
                .content
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => WirePart::Text { text: text.clone() },
                    // Data URIs are accepted as-is.
                    ContentPart::Image { url } => WirePart::ImageUrl {
                        image_url: WireImageUrl { url: url.clone() },
                    },
                    ContentPart::Audio { data, format } => WirePart::InputAudio {
                        input_audio: WireInputAudio {
                            data: data.clone(),
                            format: format.clone(),
                        },
                    },
                })
                .collect(),
        )
    };
    WireMessage {
        role: message.role.as_str(),
        content,
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct UsageOptions {
    include: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
    InputAudio { input_audio: WireInputAudio },
}

#[derive(Debug, Serialize)]
struct WireImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct WireInputAudio {
    data: String,
    format: String,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    delta: Option<WireDelta>,
    message: Option<WireDelta>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
    code: Option<serde_json::Value>,
}
