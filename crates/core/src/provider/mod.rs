//! Chat provider abstraction.
//!
//! Every backend implements [`Provider`]: one `chat` call returning a
//! [`ChatStream`] of text chunks, the last of which carries token usage and
//! cost. [`RoutingProvider`] composes concrete providers behind model-name
//! prefixes ("ollama:llama3") with a default for unprefixed models.

mod error;
mod lines;
mod ollama;
mod openai_compat;
mod pricing;
mod router;
mod traits;
mod types;

pub use error::ProviderError;
pub use lines::LineBuffer;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use pricing::{ModelPricing, PricingTable};
pub use router::RoutingProvider;
pub use traits::{collect_text, complete, ChatStream, ChunkSender, Completion, Provider};
pub use types::{
    split_data_uri, ChatChunk, ChatRequest, ChatUsage, ContentPart, Credentials, Message, Role,
};
