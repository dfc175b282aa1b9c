//! Converts insight text into spoken audio via a hosted synthesis service.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use url::Url;

use crate::error::{CourseLensError, Result};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";
const MODEL: &str = "tts-1";
const VOICE: &str = "alloy";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

pub struct Narrator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl Narrator {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("CourseLens/0.1.0")
            .build()
            .map_err(|e| CourseLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .map_err(|e| CourseLensError::Config(format!("Invalid endpoint URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Point the narrator at a different endpoint (tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|e| CourseLensError::Config(format!("Invalid endpoint URL: {e}")))?;
        Ok(self)
    }

    /// Synthesize `text` into an MP3 at `path`. No local length limit; the
    /// upstream service may impose one. Failures propagate, nothing is
    /// retried.
    pub async fn speak(&self, text: &str, path: &Path) -> Result<PathBuf> {
        debug!("Synthesizing {} characters of narration", text.len());

        let request = SpeechRequest {
            model: MODEL,
            voice: VOICE,
            input: text,
        };

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
            return Err(CourseLensError::Narration(format!("{status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(CourseLensError::Narration("Empty audio response".to_string()));
        }
        std::fs::write(path, &audio)?;

        info!("Narration written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
