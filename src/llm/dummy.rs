//! Offline no-op provider
//!
//! Used for local development and as the resolution target for unknown
//! provider names. It never fails.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::GenerationOptions;
use super::LlmProvider;
use super::TokenStream;
use crate::Result;

pub struct DummyProvider {
    model: String,
}

impl DummyProvider {
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }

    fn canned_response(prompt: &str) -> String {
        let preview: String = prompt.chars().take(50).collect();
        let ellipsis = if prompt.chars().count() > 50 { "..." } else { "" };
        format!("This is a dummy response to: '{preview}{ellipsis}'")
    }
}

#[async_trait]
impl LlmProvider for DummyProvider {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        Ok(Self::canned_response(prompt))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<TokenStream> {
        let response = Self::canned_response(prompt);
        let (sender, receiver) = mpsc::channel(16);

        tokio::spawn(async move {
            let chars: Vec<char> = response.chars().collect();
            for piece in chars.chunks(10) {
                let fragment: String = piece.iter().collect();
                if sender.send(Ok(fragment)).await.is_err() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        });

        Ok(TokenStream::new(receiver))
    }

    fn name(&self) -> String {
        format!("dummy/{}", self.model)
    }
}
