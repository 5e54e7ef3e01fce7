//! Completion provider client. One blocking request per call against an
//! OpenAI-compatible `/chat/completions` endpoint; the result carries the
//! reply text plus a cost estimate and wall-clock latency for logging.
//! Failures are never retried here; the caller decides what the sender sees.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::context::Turn;
use crate::error::MagpieError;

pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cost_rates: HashMap<String, f64>,
    timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    /// USD, from the configured per-model rate and the provider's token count.
    pub cost: f64,
    pub elapsed_ms: f64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

impl CompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        cost_rates: HashMap<String, f64>,
        timeout: Duration,
    ) -> Self {
        CompletionClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            cost_rates,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.llm_base_url.clone(),
            config.api_key.clone(),
            config.cost_rates.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Issue one completion request. The model must have a configured cost
    /// rate; an unknown model fails before any request is sent.
    pub async fn complete(
        &self,
        turns: &[Turn],
        model: &str,
        temperature: f64,
    ) -> Result<CompletionResult, MagpieError> {
        let rate = self
            .cost_rates
            .get(model)
            .copied()
            .ok_or_else(|| MagpieError::UnknownModel(model.to_string()))?;

        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&ChatRequest {
                model,
                messages: turns,
                temperature,
            })
            .send()
            .await
            .map_err(|e| MagpieError::Provider(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MagpieError::Provider(e.to_string()))?;
        if !status.is_success() {
            return Err(MagpieError::Provider(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| MagpieError::Provider(format!("invalid response body: {e}")))?;
        let usage = parsed
            .usage
            .ok_or_else(|| MagpieError::Provider("response missing usage".into()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MagpieError::Provider("response contained no message text".into()))?
            .trim()
            .to_string();

        let cost = rate * usage.total_tokens as f64 / 1000.0;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(CompletionResult {
            text,
            cost,
            elapsed_ms,
        })
    }
}
