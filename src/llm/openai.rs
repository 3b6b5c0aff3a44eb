//! OpenAI provider, and the OpenAI-compatible DeepSeek provider

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

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com/v1";

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn build_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(std::time::Duration::from_secs(15))
        .timeout(std::time::Duration::from_secs(300))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .map_err(|e| SatRagError::Http(e.to_string()))
}

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    label: &'static str,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, OPENAI_ENDPOINT, "openai")
    }

    fn with_endpoint(
        api_key: String,
        model: String,
        endpoint: &str,
        label: &'static str,
    ) -> Result<Self> {
        let client = build_client()?;
        debug!("Initialized {label} provider with model: {model}");
        Ok(Self {
            client,
            api_key,
            model,
            endpoint: endpoint.to_string(),
            label,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, options: &GenerationOptions, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": stream,
        });
        // o3 models accept a reasoning-effort hint
        if self.model.starts_with("o3") {
            body["reasoning_effort"] = json!("medium");
        }
        body
    }

    async fn post_completion(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, options, false))
            .send()
            .await
            .map_err(|e| SatRagError::provider(self.name(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SatRagError::provider(
                self.name(),
                format!("API error ({status}): {body}"),
            ));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SatRagError::provider(self.name(), format!("Invalid response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SatRagError::provider(self.name(), "No completion choices returned"))
    }

    async fn post_stream(&self, prompt: &str, options: &GenerationOptions) -> Result<TokenStream> {
        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, options, true))
            .send()
            .await
            .map_err(|e| SatRagError::provider(self.name(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SatRagError::provider(
                self.name(),
                format!("Streaming API error ({status}): {body}"),
            ));
        }

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
                    if data == "[DONE]" {
                        return;
                    }
                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(content) = parsed["choices"][0]["delta"]["content"].as_str() {
                            if !content.is_empty()
                                && sender.send(Ok(content.to_string())).await.is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(TokenStream::new(receiver))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.post_completion(prompt, options).await
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TokenStream> {
        self.post_stream(prompt, options).await
    }

    fn name(&self) -> String {
        format!("{}/{}", self.label, self.model)
    }
}

/// DeepSeek provider (OpenAI-compatible wire protocol, different base URL)
pub struct DeepSeekProvider {
    inner: OpenAiProvider,
}

impl DeepSeekProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            inner: OpenAiProvider::with_endpoint(api_key, model, DEEPSEEK_ENDPOINT, "deepseek")?,
        })
    }
}

#[async_trait]
impl LlmProvider for DeepSeekProvider {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.inner.generate(prompt, options).await
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TokenStream> {
        self.inner.generate_stream(prompt, options).await
    }

    fn name(&self) -> String {
        format!("deepseek/{}", self.inner.model())
    }
}
