//! Streaming response handling

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;

use crate::Result;

/// Incremental text fragments from a streaming completion.
///
/// Fragments arrive in generation order. A mid-stream failure surfaces as one
/// final `Err` item, after which the stream ends.
pub struct TokenStream {
    receiver: mpsc::Receiver<Result<String>>,
}

impl TokenStream {
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<Result<String>>) -> Self {
        Self { receiver }
    }

    /// Get the next fragment
    pub async fn next(&mut self) -> Option<Result<String>> {
        self.receiver.recv().await
    }

    /// Collect the whole stream into one string, stopping at the first error
    pub async fn collect(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_fragments_in_order() {
        let (sender, receiver) = mpsc::channel(8);
        sender.send(Ok("Hello, ".to_string())).await.unwrap();
        sender.send(Ok("world".to_string())).await.unwrap();
        drop(sender);

        let text = TokenStream::new(receiver).collect().await.unwrap();
        assert_eq!(text, "Hello, world");
    }

    #[tokio::test]
    async fn collect_stops_at_first_error() {
        let (sender, receiver) = mpsc::channel(8);
        sender.send(Ok("partial".to_string())).await.unwrap();
        sender
            .send(Err(crate::SatRagError::provider("test/model", "boom")))
            .await
            .unwrap();
        drop(sender);

        assert!(TokenStream::new(receiver).collect().await.is_err());
    }
}
