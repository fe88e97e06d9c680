//! Text generation backends
//!
//! The inference endpoint does not load weights itself. Generation is
//! delegated to a co-located model server speaking the OpenAI-compatible
//! completions API (llama.cpp server, vLLM, TGI and the like).

use crate::error::AppError;
use crate::inference::params::{GenerationParams, REPETITION_PENALTY};
use crate::inference::prompt::extract_reply;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Something that turns a formatted prompt into generated text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for `prompt`
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, AppError>;

    /// Whether the model is loaded and able to serve requests
    async fn is_ready(&self) -> bool;

    /// Where generation runs, for health reporting
    fn device(&self) -> String;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// Generator backed by `POST {endpoint}/v1/completions`
///
/// Readiness is checked against `GET {endpoint}/v1/models` until it first
/// succeeds, then remembered until a request fails to reach the server.
pub struct CompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    ready: AtomicBool,
}

impl CompletionsGenerator {
    /// Create a generator for the model server at `endpoint`
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            ready: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TextGenerator for CompletionsGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, AppError> {
        let url = format!("{}/v1/completions", self.endpoint);
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: params.max_length,
            temperature: params.temperature,
            top_p: params.top_p,
            repetition_penalty: REPETITION_PENALTY,
            stream: false,
        };

        debug!(
            url = %url,
            prompt_len = prompt.len(),
            max_tokens = params.max_length,
            "Calling model server"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if self.ready.swap(false, Ordering::AcqRel) {
                    warn!(error = %e, "Lost connection to model server");
                }
                AppError::Generation(format!("model server request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            error!(status = status.as_u16(), body = %body, "Model server returned error status");
            return Err(AppError::Generation(format!(
                "model server returned {}",
                status.as_u16()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("invalid model server response: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| AppError::Generation("model server returned no choices".to_string()))?;

        Ok(extract_reply(&text))
    }

    async fn is_ready(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return true;
        }

        let url = format!("{}/v1/models", self.endpoint);
        let ready = match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Model server not reachable");
                false
            }
        };
        if ready {
            info!(endpoint = %self.endpoint, "Model server is ready");
            self.ready.store(true, Ordering::Release);
        }
        ready
    }

    fn device(&self) -> String {
        format!("remote ({})", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn generator(url: &str) -> CompletionsGenerator {
        CompletionsGenerator::new(url, "test-model", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_forwards_prompt_and_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "prompt": "[INST] Hi [/INST]",
                "max_tokens": 64,
                "stream": false,
            })))
            .with_status(200)
            .with_body(r#"{"choices": [{"text": "  Hello there. "}]}"#)
            .create_async()
            .await;

        let params = GenerationParams {
            max_length: 64,
            ..Default::default()
        };
        let reply = generator(&server.url())
            .generate("[INST] Hi [/INST]", &params)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Hello there.");
    }

    #[tokio::test]
    async fn test_generate_strips_echoed_prompt() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"text": "[INST] Hi [/INST] Echoed answer"}]}"#)
            .create_async()
            .await;

        let reply = generator(&server.url())
            .generate("[INST] Hi [/INST]", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(reply, "Echoed answer");
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = generator(&server.url())
            .generate("prompt", &GenerationParams::default())
            .await;
        match result {
            Err(AppError::Generation(msg)) => assert!(msg.contains("500")),
            other => panic!("Expected generation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_no_choices() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let result = generator(&server.url())
            .generate("prompt", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

    #[tokio::test]
    async fn test_is_ready() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        assert!(generator(&server.url()).is_ready().await);
        assert!(!generator("http://127.0.0.1:9").is_ready().await);
    }

    #[tokio::test]
    async fn test_readiness_is_remembered() {
        let mut server = Server::new_async().await;
        let models = server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .expect(1)
            .create_async()
            .await;

        let generator = generator(&server.url());
        assert!(generator.is_ready().await);
        assert!(generator.is_ready().await);
        models.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_clears_readiness() {
        let generator = generator("http://127.0.0.1:9");
        generator.ready.store(true, Ordering::Release);

        let result = generator
            .generate("prompt", &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(AppError::Generation(_))));
        assert!(!generator.ready.load(Ordering::Acquire));
        assert!(!generator.is_ready().await);
    }
}
