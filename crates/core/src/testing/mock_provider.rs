//! Mock chat provider for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::provider::{
    ChatChunk, ChatRequest, ChatStream, ChatUsage, Credentials, Provider, ProviderError,
};

/// Scripted behaviour for one `chat` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream the text, then a terminal chunk with the configured usage.
    Text(String),
    /// Fail at setup, before any chunk.
    Fail(ProviderError),
    /// Deliver `partial`, then fail mid-stream.
    StreamError { partial: String, error: ProviderError },
    /// Never produce a chunk. The producer stops once the consumer drops.
    Hang,
}

/// Mock implementation of the Provider trait.
///
/// Replies are consumed in order; once the queue is empty every call gets
/// [`MockProvider::DEFAULT_REPLY`]. Every request is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use lectern_core::testing::MockProvider;
///
/// let provider = MockProvider::named("openrouter");
/// provider.push_reply("Page text").await;
///
/// let completion = complete(&provider, request, &CancelToken::new()).await?;
/// assert_eq!(provider.requests().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    replies: Arc<RwLock<VecDeque<MockReply>>>,
    requests: Arc<RwLock<Vec<ChatRequest>>>,
    usage: Arc<RwLock<ChatUsage>>,
    credential_updates: AtomicUsize,
}

impl MockProvider {
    pub const DEFAULT_REPLY: &'static str = "mock reply";

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Arc::new(RwLock::new(VecDeque::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            usage: Arc::new(RwLock::new(ChatUsage::default())),
            credential_updates: AtomicUsize::new(0),
        }
    }

    /// Queue a successful text reply.
    pub async fn push_reply(&self, text: &str) {
        self.push(MockReply::Text(text.to_string())).await;
    }

    pub async fn push(&self, reply: MockReply) {
        self.replies.write().await.push_back(reply);
    }

    /// Usage attached to the terminal chunk of every text reply.
    pub async fn set_usage(&self, usage: ChatUsage) {
        *self.usage.write().await = usage;
    }

    /// All requests received, in order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.read().await.clone()
    }

    pub fn credential_updates(&self) -> usize {
        self.credential_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, ProviderError> {
        self.requests.write().await.push(request);

        let reply = self
            .replies
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::Text(Self::DEFAULT_REPLY.to_string()));
        let usage = self.usage.read().await.clone();

        match reply {
            MockReply::Text(text) => Ok(ChatStream::from_chunks(vec![
                Ok(ChatChunk::text(text)),
                Ok(ChatChunk::done(Some(usage))),
            ])),
            MockReply::Fail(error) => Err(error),
            MockReply::StreamError { partial, error } => Ok(ChatStream::from_chunks(vec![
                Ok(ChatChunk::text(partial)),
                Err(error),
            ])),
            MockReply::Hang => {
                let (tx, stream) = ChatStream::channel(1);
                tokio::spawn(async move {
                    tx.closed().await;
                });
                Ok(stream)
            }
        }
    }

    fn update_credentials(&self, _credentials: Credentials) -> Result<(), ProviderError> {
        self.credential_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
