//! Scripted provider for tests
//!
//! Returns queued responses in order, then a fixed default. Records
//! every request so tests can assert on prompt assembly.

use crate::llm::{GenerateRequest, LlmProvider};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct MockProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
    default_response: String,
    fail: bool,
}

impl MockProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
            default_response: "mock response".to_string(),
            fail: false,
        }
    }

    /// A provider where every call fails, for degradation tests.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: String::new(),
            fail: true,
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default_response = default.to_string();
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<String> {
        self.requests.lock().unwrap().push(req);
        if self.fail {
            anyhow::bail!("mock provider failure");
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone()))
    }

    async fn test_connection(&self) -> bool {
        !self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockProvider::new(vec!["first", "second"]);
        assert_eq!(
            mock.generate(GenerateRequest::new("a")).await.unwrap(),
            "first"
        );
        assert_eq!(
            mock.generate(GenerateRequest::new("b")).await.unwrap(),
            "second"
        );
        // Exhausted: default.
        assert_eq!(
            mock.generate(GenerateRequest::new("c")).await.unwrap(),
            "mock response"
        );
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockProvider::failing();
        assert!(mock.generate(GenerateRequest::new("a")).await.is_err());
        assert!(!mock.test_connection().await);
    }

    #[tokio::test]
    async fn test_default_streaming_degrades_to_one_chunk() {
        let mock = MockProvider::new(vec!["whole reply"]);
        let mut rx = mock
            .generate_streaming(GenerateRequest::new("q"))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), "whole reply");
        assert!(rx.recv().await.is_none());
    }
}
