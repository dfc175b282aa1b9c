use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dataset::Dataset;
use crate::error::{CourseLensError, Result};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Fixed delay before the single rate-limit retry.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(20);

/// Which underlying model a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Fast and cheap; used for per-item batch generation.
    Cheap,
    /// Accurate and expensive; used for single insights, Q&A and summaries.
    Accurate,
}

impl Tier {
    pub fn model_name(self) -> &'static str {
        match self {
            Self::Cheap => "gpt-3.5-turbo",
            Self::Accurate => "gpt-4",
        }
    }
}

/// The seam between the workflow and the hosted natural-language query
/// service. Everything downstream of prompt composition goes through this
/// trait so flows are testable with a stub.
#[allow(async_fn_in_trait)]
pub trait QueryAgent {
    async fn answer(&self, prompt: &str, tier: Tier) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Production adapter: submits prompts against the in-memory table to a
/// chat-completions endpoint with zero temperature.
pub struct OpenAiAgent {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    table_context: String,
}

impl OpenAiAgent {
    pub fn new(api_key: String, dataset: &Dataset) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("CourseLens/0.1.0")
            .build()
            .map_err(|e| CourseLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .map_err(|e| CourseLensError::Config(format!("Invalid endpoint URL: {e}")))?;

        let table_context = format!(
            "You are a data analyst working with a course completion dataset. \
             The full dataset is provided below as CSV. Answer questions using \
             only this data.\n\n{}",
            dataset.to_csv()
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            table_context,
        })
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|e| CourseLensError::Config(format!("Invalid endpoint URL: {e}")))?;
        Ok(self)
    }
}

impl QueryAgent for OpenAiAgent {
    async fn answer(&self, prompt: &str, tier: Tier) -> Result<String> {
        let request = ChatRequest {
            model: tier.model_name(),
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.table_context,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        debug!("Submitting prompt to {} ({})", self.endpoint, tier.model_name());

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CourseLensError::Agent(format!("{status}: {body}")));
        }

        let parsed = response.json::<ChatResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CourseLensError::Agent("Empty response from agent".to_string()))
    }
}

/// Run a query with the adapter's retry policy: exactly one resubmission,
/// only when the failure carries a rate-limit signature, after a fixed
/// delay. Any other failure, or a failed retry, propagates.
pub async fn answer_with_retry<A: QueryAgent>(agent: &A, prompt: &str, tier: Tier) -> Result<String> {
    match agent.answer(prompt, tier).await {
        Err(e) if e.is_rate_limited() => {
            warn!(
                "Rate limit hit, waiting {}s before retrying once...",
                RATE_LIMIT_BACKOFF.as_secs()
            );
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            agent.answer(prompt, tier).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_dataset() -> Dataset {
        Dataset::from_records(vec![])
    }

    /// Stub agent that fails a configurable number of times before
    /// succeeding, recording how often it was called.
    struct FlakyAgent {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> CourseLensError,
    }

    impl FlakyAgent {
        fn rate_limited(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error: || CourseLensError::Agent("Rate limit reached".to_string()),
            }
        }

        fn broken(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error: || CourseLensError::Agent("model overloaded".to_string()),
            }
        }
    }

    impl QueryAgent for FlakyAgent {
        async fn answer(&self, _prompt: &str, _tier: Tier) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok("42".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_single_rate_limit() {
        let agent = FlakyAgent::rate_limited(1);
        let result = answer_with_retry(&agent, "prompt", Tier::Accurate).await;

        assert_eq!(result.unwrap(), "42");
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fires_at_most_once() {
        let agent = FlakyAgent::rate_limited(5);
        let result = answer_with_retry(&agent, "prompt", Tier::Accurate).await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_failure_does_not_retry() {
        let agent = FlakyAgent::broken(5);
        let result = answer_with_retry(&agent, "prompt", Tier::Accurate).await;

        assert!(result.is_err());
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tier_model_names() {
        assert_eq!(Tier::Cheap.model_name(), "gpt-3.5-turbo");
        assert_eq!(Tier::Accurate.model_name(), "gpt-4");
    }

    #[tokio::test]
    async fn test_openai_agent_parses_chat_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4",
                "temperature": 0.0,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"There are 3 such employees."}}]}"#)
            .create_async()
            .await;

        let agent = OpenAiAgent::new("test-key".to_string(), &sample_dataset())
            .unwrap()
            .with_endpoint(&server.url())
            .unwrap();

        let answer = agent.answer("How many?", Tier::Accurate).await.unwrap();
        assert_eq!(answer, "There are 3 such employees.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_agent_maps_http_failure_to_agent_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(429)
            .with_body("Rate limit reached for requests")
            .create_async()
            .await;

        let agent = OpenAiAgent::new("test-key".to_string(), &sample_dataset())
            .unwrap()
            .with_endpoint(&server.url())
            .unwrap();

        let err = agent.answer("How many?", Tier::Cheap).await.unwrap_err();
        assert!(matches!(err, CourseLensError::Agent(_)));
        assert!(err.is_rate_limited());
    }
}
