//! LLM provider abstraction
//!
//! One narrow contract: prompt in, text out. Transient failures are
//! errors the orchestrator maps to "no text" and routes around with
//! fallbacks; nothing above this layer retries.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt. Errors cover timeouts, network failures, and
    /// unparseable responses alike.
    async fn generate(&self, req: GenerateRequest) -> Result<String>;

    /// Streaming variant. The default implementation degrades to one
    /// chunk from `generate`.
    async fn generate_streaming(&self, req: GenerateRequest) -> Result<mpsc::Receiver<String>> {
        let text = self.generate(req).await?;
        let (tx, rx) = mpsc::channel(4);
        let _ = tx.send(text).await;
        Ok(rx)
    }

    /// Vision variant; providers without vision reject it.
    async fn generate_with_image(&self, _req: GenerateRequest, _image: &[u8]) -> Result<String> {
        anyhow::bail!("this provider does not support vision input")
    }

    /// Cheap startup reachability probe.
    async fn test_connection(&self) -> bool;
}

/// Extract the outermost balanced `{...}` from model output and parse
/// it. Models wrap JSON in prose and code fences more often than not.
pub fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }
    let braced = extract_balanced_braces(trimmed)?;
    serde_json::from_str::<T>(&braced).ok()
}

fn extract_balanced_braces(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Judgment {
        emotion: String,
        intensity: f32,
    }

    #[test]
    fn test_parse_clean_json() {
        let parsed: Judgment =
            parse_json_object(r#"{"emotion": "awe", "intensity": 0.7}"#).unwrap();
        assert_eq!(parsed.emotion, "awe");
    }

    #[test]
    fn test_parse_json_in_prose() {
        let text = "Sure! Here is the answer:\n```json\n{\"emotion\": \"joy\", \"intensity\": 0.5}\n```\nHope that helps.";
        let parsed: Judgment = parse_json_object(text).unwrap();
        assert_eq!(parsed.emotion, "joy");
        assert!((parsed.intensity - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_nested_braces() {
        #[derive(Deserialize)]
        struct Outer {
            inner: serde_json::Value,
        }
        let text = r#"prefix {"inner": {"a": 1}} suffix"#;
        let parsed: Outer = parse_json_object(text).unwrap();
        assert_eq!(parsed.inner["a"], 1);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_json_object::<Judgment>("no json here at all").is_none());
        assert!(parse_json_object::<Judgment>("{broken").is_none());
    }

    #[test]
    fn test_request_builder_defaults() {
        let req = GenerateRequest::new("hello")
            .with_temperature(0.3)
            .with_max_tokens(40);
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.max_tokens, 40);
        assert!(req.system.is_none());
        assert_eq!(req.timeout, Duration::from_secs(30));
    }
}
