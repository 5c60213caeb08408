//! Request and response types shared by every provider.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One typed piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// A raw URL or an inline `data:<mime>;base64,<payload>` URI.
    Image {
        url: String,
    },
    /// Base64 audio payload plus its container format ("mp3", "wav", ...).
    Audio {
        data: String,
        format: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::Image { url: url.into() }
    }

    /// Inline image bytes as a data URI.
    pub fn image_bytes(mime: &str, bytes: &[u8]) -> Self {
        ContentPart::Image {
            url: format!("data:{};base64,{}", mime, BASE64.encode(bytes)),
        }
    }

    pub fn audio_bytes(format: impl Into<String>, bytes: &[u8]) -> Self {
        ContentPart::Audio {
            data: BASE64.encode(bytes),
            format: format.into(),
        }
    }
}

/// Splits `data:<mime>;base64,<payload>` into `(mime, payload)`.
///
/// Returns `None` for anything that is not a base64 data URI.
pub fn split_data_uri(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    Some((mime, payload))
}

/// A role-tagged chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// Concatenation of the message's text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_text_only(&self) -> bool {
        self.content
            .iter()
            .all(|part| matches!(part, ContentPart::Text { .. }))
    }
}

/// A chat request. `model` may carry a provider prefix such as `"ollama:llama3"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            stream: true,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token and cost figures for one completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Monetary cost in USD, when the backend or the pricing table knows it.
    pub cost: Option<f64>,
}

impl ChatUsage {
    pub fn add(&mut self, other: &ChatUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost = match (self.cost, other.cost) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
    }
}

/// An incremental piece of a response. Only the terminal chunk carries usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatChunk {
    pub text: String,
    pub usage: Option<ChatUsage>,
    pub done: bool,
}

impl ChatChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            done: false,
        }
    }

    pub fn done(usage: Option<ChatUsage>) -> Self {
        Self {
            text: String::new(),
            usage,
            done: true,
        }
    }
}

/// Runtime credential update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}
