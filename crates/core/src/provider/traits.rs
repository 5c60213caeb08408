//! Provider trait and the chunk stream it returns.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use super::error::ProviderError;
use super::types::{ChatChunk, ChatRequest, ChatUsage, Credentials};
use crate::cancel::CancelToken;

type StreamItem = Result<ChatChunk, ProviderError>;

/// Live sequence of response chunks.
///
/// The producer runs on its own task. Dropping the stream closes the channel,
/// which the producer observes through [`ChunkSender::closed`] and stops.
pub struct ChatStream {
    rx: mpsc::Receiver<StreamItem>,
}

impl ChatStream {
    /// Creates a bounded stream and the sender its producer writes to.
    pub fn channel(buffer: usize) -> (ChunkSender, ChatStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (ChunkSender { tx }, ChatStream { rx })
    }

    /// A stream that yields the given items and then ends.
    pub fn from_chunks(items: Vec<StreamItem>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // Capacity equals the item count, so this cannot fail.
            let _ = tx.try_send(item);
        }
        Self { rx }
    }

    pub async fn next_chunk(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }
}

impl Stream for ChatStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Producer half of a [`ChatStream`].
#[derive(Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<StreamItem>,
}

impl ChunkSender {
    /// Sends one item. Returns `false` once the consumer is gone.
    pub async fn send(&self, item: StreamItem) -> bool {
        self.tx.send(item).await.is_ok()
    }

    /// Resolves when the consumer drops its stream.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A chat backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name, also the model prefix that routes to it ("ollama", "openrouter").
    fn name(&self) -> &str;

    /// Starts a chat. Setup failures return immediately; failures after
    /// streaming begins arrive as an `Err` item on the stream.
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, ProviderError>;

    /// Swaps credentials for subsequent requests. In-flight requests keep the old ones.
    fn update_credentials(&self, _credentials: Credentials) -> Result<(), ProviderError> {
        Err(ProviderError::unsupported(
            self.name(),
            "credentials cannot be updated at runtime",
        ))
    }
}

/// Fully drained response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: ChatUsage,
}

/// Drains `stream` into one string, stopping early if `cancel` fires.
///
/// Returning early drops the stream, which tells the producer to stop.
pub async fn collect_text(
    mut stream: ChatStream,
    cancel: &CancelToken,
) -> Result<Completion, ProviderError> {
    let mut completion = Completion::default();
    loop {
        let next = cancel
            .run_until_cancelled(stream.next_chunk())
            .await
            .ok_or(ProviderError::Cancelled)?;

        match next {
            None => break,
            Some(Err(e)) => return Err(e),
            Some(Ok(chunk)) => {
                completion.text.push_str(&chunk.text);
                if let Some(usage) = chunk.usage {
                    completion.usage = usage;
                }
                if chunk.done {
                    break;
                }
            }
        }
    }
    Ok(completion)
}

/// Sends `request` and collects the whole response.
pub async fn complete(
    provider: &dyn Provider,
    request: ChatRequest,
    cancel: &CancelToken,
) -> Result<Completion, ProviderError> {
    let stream = cancel
        .run_until_cancelled(provider.chat(request))
        .await
        .ok_or(ProviderError::Cancelled)??;
    collect_text(stream, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_collect_text_concatenates_and_keeps_terminal_usage() {
        let usage = ChatUsage {
            input_tokens: 12,
            output_tokens: 3,
            cost: Some(0.001),
        };
        let stream = ChatStream::from_chunks(vec![
            Ok(ChatChunk::text("Hel")),
            Ok(ChatChunk::text("lo")),
            Ok(ChatChunk::done(Some(usage.clone()))),
        ]);

        let completion = collect_text(stream, &CancelToken::new()).await.unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.usage, usage);
    }

    #[tokio::test]
    async fn test_collect_text_surfaces_stream_error() {
        let stream = ChatStream::from_chunks(vec![
            Ok(ChatChunk::text("partial")),
            Err(ProviderError::Http("connection reset".to_string())),
        ]);
        let err = collect_text(stream, &CancelToken::new()).await.unwrap_err();
        assert_eq!(err, ProviderError::Http("connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_stream_yields_partial_text_before_error() {
        let mut stream = ChatStream::from_chunks(vec![
            Ok(ChatChunk::text("kept")),
            Err(ProviderError::Malformed("bad".to_string())),
        ]);
        assert_eq!(stream.next().await, Some(Ok(ChatChunk::text("kept"))));
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_producer_sees_abandoned_consumer() {
        let (tx, stream) = ChatStream::channel(1);
        let cancel = CancelToken::new();

        let producer = tokio::spawn(async move {
            let mut sent = 0;
            while tx.send(Ok(ChatChunk::text("x"))).await {
                sent += 1;
            }
            sent
        });

        let consumer_cancel = cancel.clone();
        let consumer = tokio::spawn(async move { collect_text(stream, &consumer_cancel).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = consumer.await.unwrap();
        assert_eq!(result, Err(ProviderError::Cancelled));
        let sent = tokio::time::timeout(Duration::from_secs(2), producer)
            .await
            .expect("producer must stop once the consumer is gone")
            .unwrap();
        assert!(sent > 0);
    }
}
