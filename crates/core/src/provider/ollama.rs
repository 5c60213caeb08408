//! Local inference through an Ollama server.
//!
//! Connects to `/api/chat` (default base: http://localhost:11434). No API key.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ProviderError;
use super::lines::LineBuffer;
use super::pricing::PricingTable;
use super::traits::{ChatStream, ChunkSender, Provider};
use super::types::{split_data_uri, ChatChunk, ChatRequest, ChatUsage, ContentPart, Credentials};

const STREAM_BUFFER: usize = 32;

pub struct OllamaProvider {
    client: reqwest::Client,
    api_base: RwLock<Arc<String>>,
    pricing: PricingTable,
}

impl OllamaProvider {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: RwLock::new(Arc::new(api_base.into())),
            pricing: PricingTable::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn api_base(&self) -> Arc<String> {
        self.api_base
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn build_body<'a>(&self, request: &'a ChatRequest) -> Result<OllamaRequest<'a>, ProviderError> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            let mut content = String::new();
            let mut images = Vec::new();
            for part in &message.content {
                match part {
                    ContentPart::Text { text } => content.push_str(text),
                    ContentPart::Image { url } => {
                        // Ollama wants the bare base64 payload.
                        let (_, payload) = split_data_uri(url).ok_or_else(|| {
                            ProviderError::unsupported("ollama", "image URLs must be inline data URIs")
                        })?;
                        images.push(payload.to_string());
                    }
                    ContentPart::Audio { .. } => {
                        return Err(ProviderError::unsupported(
                            "ollama",
                            "audio content is not supported",
                        ))
                    }
                }
            }
            messages.push(OllamaMessage {
                role: message.role.as_str(),
                content,
                images,
            });
        }

        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then_some(
            OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        );

        Ok(OllamaRequest {
            model: &request.model,
            messages,
            stream: request.stream,
            options,
        })
    }

    fn usage_from(&self, model: &str, response: &OllamaResponse) -> ChatUsage {
        let input_tokens = response.prompt_eval_count;
        let output_tokens = response.eval_count;
        ChatUsage {
            input_tokens,
            output_tokens,
            cost: self.pricing.cost(model, input_tokens, output_tokens),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, ProviderError> {
        let body = self.build_body(&request)?;
        let url = format!("{}/api/chat", self.api_base().trim_end_matches('/'));
        debug!(model = %request.model, stream = request.stream, "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(ProviderError::Api { status, message });
        }

        if !request.stream {
            let parsed: OllamaResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let usage = self.usage_from(&request.model, &parsed);
            return Ok(ChatStream::from_chunks(vec![
                Ok(ChatChunk::text(parsed.text())),
                Ok(ChatChunk::done(Some(usage))),
            ]));
        }

        let (tx, stream) = ChatStream::channel(STREAM_BUFFER);
        let pricing = self.pricing.clone();
        let model = request.model.clone();
        tokio::spawn(async move {
            pump_ndjson(response, tx, pricing, model).await;
        });
        Ok(stream)
    }

    fn update_credentials(&self, credentials: Credentials) -> Result<(), ProviderError> {
        if credentials.api_key.is_some() {
            return Err(ProviderError::unsupported(
                "ollama",
                "ollama does not take an API key",
            ));
        }
        if let Some(api_base) = credentials.api_base {
            let mut guard = self
                .api_base
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::new(api_base);
            debug!("Ollama endpoint updated");
        }
        Ok(())
    }
}

async fn pump_ndjson(
    response: reqwest::Response,
    tx: ChunkSender,
    pricing: PricingTable,
    model: String,
) {
    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("Ollama stream consumer dropped, aborting request");
                return;
            }
            next = body.next() => next,
        };

        let ended = next.is_none();
        let pending: Vec<String> = match next {
            Some(Ok(bytes)) => lines.push(&bytes),
            Some(Err(e)) => {
                tx.send(Err(ProviderError::Http(e.to_string()))).await;
                return;
            }
            None => lines.finish().into_iter().collect(),
        };

        for line in pending {
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line) {
                Err(e) => {
                    tx.send(Err(e)).await;
                    return;
                }
                Ok(parsed) => {
                    let text = parsed.text();
                    if !text.is_empty() && !tx.send(Ok(ChatChunk::text(text))).await {
                        return;
                    }
                    if parsed.done {
                        let usage = ChatUsage {
                            input_tokens: parsed.prompt_eval_count,
                            output_tokens: parsed.eval_count,
                            cost: pricing.cost(&model, parsed.prompt_eval_count, parsed.eval_count),
                        };
                        tx.send(Ok(ChatChunk::done(Some(usage)))).await;
                        return;
                    }
                }
            }
        }

        if ended {
            break;
        }
    }

    warn!("Ollama stream ended without a done message");
    tx.send(Ok(ChatChunk::done(None))).await;
}

fn decode_line(line: &str) -> Result<OllamaResponse, ProviderError> {
    if let Ok(error) = serde_json::from_str::<OllamaErrorResponse>(line) {
        return Err(ProviderError::Api {
            status: 502,
            message: error.error,
        });
    }
    serde_json::from_str(line).map_err(|e| ProviderError::Malformed(format!("{}: {}", e, line)))
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    /// Number of tokens in the prompt
    #[serde(default)]
    prompt_eval_count: u64,
    /// Number of tokens in the response
    #[serde(default)]
    eval_count: u64,
}

impl OllamaResponse {
    fn text(&self) -> String {
        self.message
            .as_ref()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{Message, Role};

    #[test]
    fn test_images_are_sent_as_bare_base64() {
        let provider = OllamaProvider::new("http://localhost:11434");
        let request = ChatRequest::new("llava").with_message(Message::new(
            Role::User,
            vec![
                ContentPart::text("Read this"),
                ContentPart::image_bytes("image/png", b"png"),
            ],
        ));
        let json = serde_json::to_value(provider.build_body(&request).unwrap()).unwrap();
        let message = &json["messages"][0];
        assert_eq!(message["content"], "Read this");
        assert_eq!(message["images"][0], "cG5n");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_remote_image_and_audio_are_unsupported() {
        let provider = OllamaProvider::new("http://localhost:11434");
        let remote = ChatRequest::new("llava").with_message(Message::new(
            Role::User,
            vec![ContentPart::image_url("https://example.com/x.png")],
        ));
        assert!(matches!(
            provider.build_body(&remote),
            Err(ProviderError::Unsupported { .. })
        ));

        let audio = ChatRequest::new("llama3").with_message(Message::new(
            Role::User,
            vec![ContentPart::audio_bytes("wav", b"RIFF")],
        ));
        assert!(matches!(
            provider.build_body(&audio),
            Err(ProviderError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_options_carry_sampling_settings() {
        let provider = OllamaProvider::new("http://localhost:11434");
        let request = ChatRequest::new("llama3")
            .with_message(Message::user("hi"))
            .with_max_tokens(64)
            .with_temperature(0.0);
        let json = serde_json::to_value(provider.build_body(&request).unwrap()).unwrap();
        assert_eq!(json["options"]["num_predict"], 64);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_decode_line_variants() {
        let chunk = decode_line(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
            .unwrap();
        assert_eq!(chunk.text(), "Hel");
        assert!(!chunk.done);

        let last = decode_line(r#"{"done":true,"prompt_eval_count":20,"eval_count":4}"#).unwrap();
        assert!(last.done);
        assert_eq!(last.prompt_eval_count, 20);
        assert_eq!(last.eval_count, 4);

        assert!(matches!(
            decode_line(r#"{"error":"model not found"}"#),
            Err(ProviderError::Api { .. })
        ));
        assert!(matches!(
            decode_line("not json"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_update_credentials_swaps_base() {
        let provider = OllamaProvider::new("http://localhost:11434");
        provider
            .update_credentials(Credentials {
                api_key: None,
                api_base: Some("http://gpu-box:11434".to_string()),
            })
            .unwrap();
        assert_eq!(provider.api_base().as_str(), "http://gpu-box:11434");
    }

    #[test]
    fn test_update_credentials_rejects_api_key() {
        let provider = OllamaProvider::new("http://localhost:11434");
        let err = provider
            .update_credentials(Credentials {
                api_key: Some("sk-test".to_string()),
                api_base: Some("http://gpu-box:11434".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));
        assert_eq!(provider.api_base().as_str(), "http://localhost:11434");
    }
}
