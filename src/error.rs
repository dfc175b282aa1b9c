use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourseLensError {
    #[error("Agent request failed: {0}")]
    Agent(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Report assembly failed: {0}")]
    Report(String),

    #[error("Narration failed: {0}")]
    Narration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mail address error: {0}")]
    MailAddress(#[from] lettre::address::AddressError),

    #[error("Mail message error: {0}")]
    MailMessage(#[from] lettre::error::Error),

    #[error("Mail transport error: {0}")]
    MailTransport(#[from] lettre::transport::smtp::Error),
}

impl CourseLensError {
    /// Whether the failure text carries a rate-limit signature. Only these
    /// failures are eligible for the single automatic retry.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Agent(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("rate limit") || msg.contains("rate_limit") || msg.contains("429")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CourseLensError>;
