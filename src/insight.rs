//! Prompt composition flows over the query agent seam.

use log::{info, warn};

use crate::agent::{answer_with_retry, QueryAgent, Tier};
use crate::catalog::{INSIGHT_CATALOG, TASK_PREFIX};
use crate::error::Result;

/// Generate one catalog insight on the accurate tier.
pub async fn single_insight<A: QueryAgent>(agent: &A, prompt_text: &str) -> Result<String> {
    let prompt = format!("{TASK_PREFIX}\n\n{prompt_text}");
    agent.answer(&prompt, Tier::Accurate).await
}

/// Run the full catalog in order on the cheap tier. A failed item is
/// replaced with a placeholder and the batch continues; the output always
/// has exactly one section per catalog entry, in catalog order.
pub async fn all_insights<A: QueryAgent>(agent: &A) -> String {
    let mut summary = String::new();
    for (label, prompt_text) in INSIGHT_CATALOG {
        info!("Generating insight: {label}");
        let prompt = format!("{TASK_PREFIX}\n\n{prompt_text}");
        let result = match agent.answer(&prompt, Tier::Cheap).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Insight '{label}' failed: {e}");
                format!("[Skipped due to error: {e}]")
            }
        };
        summary.push_str(&format!("\n\n### {label}\n{result}\n"));
    }
    summary
}

/// Answer a free-form question on the accurate tier, with the single
/// rate-limit retry.
pub async fn ask<A: QueryAgent>(agent: &A, question: &str) -> Result<String> {
    let prompt = format!(
        "You are an AI analyst. Based on the dataset, answer the following \
         question in 5 lines maximum:\n\n{question}"
    );
    answer_with_retry(agent, &prompt, Tier::Accurate).await
}

/// What a podcast script is summarizing.
#[derive(Debug, Clone, Copy)]
pub enum PodcastSource {
    /// One insight, condensed to a 60-second summary.
    SingleInsight,
    /// The full batch, condensed to a 2-minute summary.
    AllInsights,
    /// The daily batch, condensed to a podcast-style audio summary.
    DailyDigest,
}

/// Turn insight text into a podcast script on the accurate tier.
pub async fn podcast_script<A: QueryAgent>(
    agent: &A,
    source: PodcastSource,
    text: &str,
) -> Result<String> {
    let prompt = match source {
        PodcastSource::SingleInsight => {
            format!("Convert this into a 60-second podcast summary:\n\n{text}")
        }
        PodcastSource::AllInsights => {
            format!("Summarize all these insights into a 2-minute podcast:\n\n{text}")
        }
        PodcastSource::DailyDigest => {
            format!("Summarize the following into a podcast-style audio summary:\n\n{text}")
        }
    };
    agent.answer(&prompt, Tier::Accurate).await
}

/// Per-metric explanation used by the report flow, on the cheap tier.
pub async fn metric_insight<A: QueryAgent>(
    agent: &A,
    metric_name: &str,
    context: &str,
) -> Result<String> {
    let prompt = format!("Explain: {metric_name}. Context: {context}. Keep it concise (5 lines).");
    agent.answer(&prompt, Tier::Cheap).await
}
