//! Asynchronous scrape-job workflow. A job is submitted to the scraping
//! provider, polled on a fixed interval until it finishes, and its payload is
//! then summarized by the completion provider and delivered in chunks.
//!
//! The poll loop is bounded twice over (attempt count and an overall
//! deadline); a job that never finishes ends in a poll failure instead of a
//! task that lives forever. Terminal failures are logged and deliver nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::channels::Delivery;
use crate::chunker;
use crate::config::Config;
use crate::context::{Role, Turn};
use crate::error::MagpieError;
use crate::llm::CompletionClient;

pub struct FetchJobTracker {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    poll_timeout: Duration,
    http_timeout: Duration,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    #[serde(rename = "apiKey")]
    api_key: &'a str,
    url: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
}

impl FetchJobTracker {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        poll_interval: Duration,
        max_poll_attempts: u32,
        poll_timeout: Duration,
        http_timeout: Duration,
    ) -> Self {
        FetchJobTracker {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            poll_interval,
            max_poll_attempts,
            poll_timeout,
            http_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.fetch_base_url.clone(),
            config.scraper_api_key.clone(),
            Duration::from_secs(config.poll_interval_secs),
            config.max_poll_attempts,
            Duration::from_secs(config.poll_timeout_secs),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{job_id}", self.base_url)
    }

    /// Submit a scrape job. Failure here means no poll task is ever
    /// scheduled; the caller apologizes to the sender and stops.
    pub async fn submit(&self, url: &str) -> Result<String, MagpieError> {
        let response = self
            .http
            .post(format!("{}/jobs", self.base_url))
            .timeout(self.http_timeout)
            .json(&SubmitRequest {
                api_key: &self.api_key,
                url,
            })
            .send()
            .await
            .map_err(|e| MagpieError::SubmitFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MagpieError::SubmitFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(MagpieError::SubmitFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| MagpieError::SubmitFailed(format!("invalid response body: {e}")))?;
        info!("Scrape job {} submitted for {url}", parsed.id);
        Ok(parsed.id)
    }

    /// Drive one submitted job to its terminal state: poll until finished,
    /// summarize the payload through `summarizer`, and deliver the summary in
    /// order through `dest`. Any error leaves the destination untouched.
    pub async fn run(
        &self,
        job_id: &str,
        summarizer: &CompletionClient,
        model: &str,
        temperature: f64,
        dest: &dyn Delivery,
        chunk_size: usize,
    ) -> Result<(), MagpieError> {
        self.await_finished(job_id).await?;
        let payload = self.retrieve_payload(job_id).await?;

        info!("Scrape job {job_id} finished; summarizing");
        let instruction =
            format!("Please provide a brief summary of the following content: {payload}");
        let turns = [Turn::new(Role::System, instruction)];
        let summary = summarizer.complete(&turns, model, temperature).await?;
        info!(
            "Scrape job {job_id} summarized (cost: {:.4}, elapsed: {:.0}ms)",
            summary.cost, summary.elapsed_ms
        );

        chunker::deliver_chunked(dest, &summary.text, chunk_size).await?;
        Ok(())
    }

    /// Poll the job status until `finished`. A non-success status response
    /// consumes an attempt and the loop keeps going; a transport failure is
    /// terminal. Exhausting the attempt budget or the overall deadline is a
    /// poll failure.
    async fn await_finished(&self, job_id: &str) -> Result<(), MagpieError> {
        let deadline = Instant::now() + self.poll_timeout;
        for _ in 0..self.max_poll_attempts {
            sleep(self.poll_interval).await;
            if Instant::now() >= deadline {
                return Err(MagpieError::PollError(format!(
                    "job {job_id} did not finish within {:?}",
                    self.poll_timeout
                )));
            }

            let response = self
                .http
                .get(self.job_url(job_id))
                .timeout(self.http_timeout)
                .send()
                .await
                .map_err(|e| MagpieError::PollError(e.to_string()))?;
            if !response.status().is_success() {
                debug!(
                    "Job {job_id} status check returned HTTP {}",
                    response.status()
                );
                continue;
            }
            let body = response
                .text()
                .await
                .map_err(|e| MagpieError::PollError(e.to_string()))?;
            match serde_json::from_str::<JobStatusResponse>(&body) {
                Ok(s) if s.status == "finished" => return Ok(()),
                Ok(s) => debug!("Job {job_id} status: {}", s.status),
                Err(e) => debug!("Job {job_id} status body unparsable: {e}"),
            }
        }
        Err(MagpieError::PollError(format!(
            "job {job_id} still unfinished after {} status checks",
            self.max_poll_attempts
        )))
    }

    /// Fetch the finished job's raw payload. An empty body is a poll failure;
    /// a non-JSON body is a malformed result (logged in full).
    async fn retrieve_payload(&self, job_id: &str) -> Result<serde_json::Value, MagpieError> {
        let response = self
            .http
            .get(self.job_url(job_id))
            .timeout(self.http_timeout)
            .send()
            .await
            .map_err(|e| MagpieError::PollError(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MagpieError::PollError(e.to_string()))?;
        if !status.is_success() {
            return Err(MagpieError::PollError(format!(
                "result fetch for job {job_id} returned HTTP {status}"
            )));
        }
        if body.is_empty() {
            return Err(MagpieError::PollError(format!(
                "job {job_id} returned an empty result"
            )));
        }
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("Failed to decode scrape result for job {job_id}: {e}");
                error!("Raw result payload: {body}");
                Err(MagpieError::MalformedResult(e.to_string()))
            }
        }
    }
}
