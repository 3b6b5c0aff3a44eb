//! Anthropic messages-API provider

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;

use super::GenerationOptions;
use super::LlmProvider;
use super::TokenStream;
use crate::errors::SatRagError;
use crate::Result;

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// Provider for Anthropic Claude models
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| SatRagError::Http(e.to_string()))?;
        debug!("Initialized Anthropic provider with model: {model}");
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn request_body(&self, prompt: &str, options: &GenerationOptions, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": stream,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(ANTHROPIC_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| SatRagError::provider(self.name(), e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(SatRagError::provider(
                self.name(),
                format!("API error ({status}): {body}"),
            ))
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let response = self.post(&self.request_body(prompt, options, false)).await?;

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SatRagError::provider(self.name(), format!("Invalid response: {e}")))?;

        result
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| SatRagError::provider(self.name(), "No content returned"))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TokenStream> {
        let response = self.post(&self.request_body(prompt, options, true)).await?;

        let provider_name = self.name();
        let (sender, receiver) = mpsc::channel::<Result<String>>(256);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Stream transport error from {provider_name}: {e}");
                        let _ = sender
                            .send(Err(SatRagError::provider(&provider_name, e.to_string())))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    match event["type"].as_str() {
                        Some("content_block_delta") => {
                            if let Some(text) = event["delta"]["text"].as_str() {
                                if !text.is_empty()
                                    && sender.send(Ok(text.to_string())).await.is_err()
                                {
                                    return;
                                }
                            }
                        }
                        Some("message_stop") => return,
                        _ => {}
                    }
                }
            }
        });

        Ok(TokenStream::new(receiver))
    }

    fn name(&self) -> String {
        format!("anthropic/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_carries_vendor_and_model() {
        let provider = AnthropicProvider::new(
            "key".to_string(),
            "claude-3-7-sonnet-20250219".to_string(),
        )
        .unwrap();
        assert_eq!(provider.name(), "anthropic/claude-3-7-sonnet-20250219");
    }

    #[test]
    fn stream_body_sets_flag() {
        let provider =
            AnthropicProvider::new("key".to_string(), "claude-3-haiku-20240307".to_string())
                .unwrap();
        let body = provider.request_body("hello", &GenerationOptions::default(), true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
