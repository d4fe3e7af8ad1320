//! Ollama provider
//!
//! Ollama exposes an OpenAI-compatible API at localhost:11434/v1, so
//! requests and SSE streaming both use that shape.

use crate::llm::{GenerateRequest, LlmProvider};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn payload(&self, req: &GenerateRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": req.prompt}));
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "stream": stream,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.payload(&req, false);

        let response = tokio::time::timeout(
            req.timeout,
            self.client.post(&url).json(&payload).send(),
        )
        .await
        .context("LLM request timed out")?
        .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let err_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama error {}: {}", status, err_text);
        }

        let resp_json: Value = response.json().await.context("Invalid JSON from Ollama")?;
        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .context("Missing content in Ollama response")?;
        Ok(content.to_string())
    }

    async fn generate_streaming(&self, req: GenerateRequest) -> Result<mpsc::Receiver<String>> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.payload(&req, true);

        let response = tokio::time::timeout(
            req.timeout,
            self.client.post(&url).json(&payload).send(),
        )
        .await
        .context("LLM streaming request timed out")?
        .context("Failed to send streaming request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let err_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama streaming error {}: {}", status, err_text);
        }

        let (tx, rx) = mpsc::channel(64);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!("stream read error: {}", e);
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited "data: {...}" lines.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    if let Ok(value) = serde_json::from_str::<Value>(data) {
                        if let Some(delta) =
                            value["choices"][0]["delta"]["content"].as_str()
                        {
                            if !delta.is_empty()
                                && tx.send(delta.to_string()).await.is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("LLM connection test failed: {}", e);
                false
            }
        }
    }
}
