use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use crate::agent::{OpenAiAgent, QueryAgent};
use crate::catalog::{self, INSIGHT_CATALOG};
use crate::chart::{self, ChartStyle};
use crate::dataset::Dataset;
use crate::insight::{self, PodcastSource};
use crate::mailer::{self, MailConfig};
use crate::metrics::{Metric, METRIC_NAMES};
use crate::narration::Narrator;
use crate::report::{self, ReportEntry};
use crate::session::Session;

#[derive(Parser)]
#[command(name = "courselens")]
#[command(author, version, about = "Course Completion Insights Tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the course completion spreadsheet
    #[arg(short, long, global = true, default_value = "course_data.xlsx")]
    data: PathBuf,

    /// Query service API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory for generated charts, reports and audio
    #[arg(short, long, global = true, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the insight catalog
    Catalog,

    /// Generate a single catalog insight
    Insight {
        /// Catalog label or its leading number (e.g. "3")
        label: String,

        /// Also narrate the insight as a 60-second podcast
        #[arg(long)]
        podcast: bool,
    },

    /// Generate every catalog insight in one batch
    All {
        /// Also narrate the batch as a 2-minute podcast
        #[arg(long)]
        podcast: bool,
    },

    /// Ask a free-form question about the data
    Ask {
        /// The question text
        question: String,
    },

    /// Build a per-metric insight and chart report
    Report {
        /// Metrics to include (defaults to the first four)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Chart style applied to every metric
        #[arg(short, long, value_enum, default_value_t = ChartStyle::Bar)]
        style: ChartStyle,

        /// Per-metric style override, as "Metric Name=style" (repeatable)
        #[arg(long)]
        chart: Vec<String>,

        /// Extra context passed to the agent for every metric
        #[arg(long, default_value = "")]
        context: String,

        /// Email the finished report to this address
        #[arg(long)]
        email: Option<String>,

        /// Ask for recurring delivery (acknowledged only; no scheduler backend)
        #[arg(long, value_enum)]
        recur: Option<Recurrence>,
    },

    /// Run the daily digest: full batch, podcast, PDF and one email
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        };
        write!(f, "{name}")
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        if let Commands::Catalog = &self.command {
            for (label, _) in INSIGHT_CATALOG {
                println!("{label}");
            }
            return Ok(());
        }

        // The table is loaded exactly once per invocation and shared
        // read-only by everything downstream.
        let dataset = Dataset::load(&self.data)?;
        info!("Loaded {} course records from {}", dataset.len(), self.data.display());

        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("An API key is required (set OPENAI_API_KEY or pass --api-key)"))?;
        let agent = OpenAiAgent::new(api_key.clone(), &dataset)?;
        let mut session = Session::new();

        match &self.command {
            Commands::Catalog => unreachable!("handled above"),
            Commands::Insight { label, podcast } => {
                self.run_insight(&agent, &api_key, &mut session, label, *podcast).await
            }
            Commands::All { podcast } => {
                self.run_all(&agent, &api_key, &mut session, *podcast).await
            }
            Commands::Ask { question } => self.run_ask(&agent, question).await,
            Commands::Report {
                metrics,
                style,
                chart,
                context,
                email,
                recur,
            } => {
                self.run_report(&agent, &dataset, &mut session, metrics, *style, chart, context, email.as_deref(), *recur)
                    .await
            }
            Commands::Daily => self.run_daily(&agent, &api_key, &mut session).await,
        }
    }

    async fn run_insight<A: QueryAgent>(
        &self,
        agent: &A,
        api_key: &str,
        session: &mut Session,
        label: &str,
        podcast: bool,
    ) -> Result<()> {
        let (label, prompt_text) = catalog::lookup(label)
            .ok_or_else(|| anyhow!("Unknown insight label: {label} (see `courselens catalog`)"))?;

        info!("Generating insight: {label}");
        let result = insight::single_insight(agent, prompt_text).await?;
        println!("{result}");

        let path = self.out_dir.join("Insight.txt");
        std::fs::write(&path, &result)?;
        info!("Insight written to: {}", path.display());
        session.last_insight = Some(result);

        if podcast {
            let text = session.last_insight.as_deref().unwrap_or_default();
            let script = insight::podcast_script(agent, PodcastSource::SingleInsight, text).await?;
            let narrator = Narrator::new(api_key.to_string())?;
            narrator
                .speak(&script, &self.out_dir.join("podcast_individual.mp3"))
                .await?;
        }

        Ok(())
    }

    async fn run_all<A: QueryAgent>(
        &self,
        agent: &A,
        api_key: &str,
        session: &mut Session,
        podcast: bool,
    ) -> Result<()> {
        let summary = insight::all_insights(agent).await;
        println!("{summary}");

        let path = self.out_dir.join("All_Insights.txt");
        std::fs::write(&path, &summary)?;
        info!("All insights written to: {}", path.display());
        session.all_insights = Some(summary);

        if podcast {
            let text = session.all_insights.as_deref().unwrap_or_default();
            let script = insight::podcast_script(agent, PodcastSource::AllInsights, text).await?;
            let narrator = Narrator::new(api_key.to_string())?;
            narrator
                .speak(&script, &self.out_dir.join("full_podcast.mp3"))
                .await?;
        }

        Ok(())
    }

    async fn run_ask<A: QueryAgent>(&self, agent: &A, question: &str) -> Result<()> {
        let result = insight::ask(agent, question).await?;
        println!("{result}");

        let path = self.out_dir.join("QnA_Insight.txt");
        std::fs::write(&path, &result)?;
        info!("Answer written to: {}", path.display());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_report<A: QueryAgent>(
        &self,
        agent: &A,
        dataset: &Dataset,
        session: &mut Session,
        metrics: &[String],
        default_style: ChartStyle,
        overrides: &[String],
        context: &str,
        email: Option<&str>,
        recur: Option<Recurrence>,
    ) -> Result<()> {
        let selected = resolve_metrics(metrics)?;
        let overrides = parse_style_overrides(overrides)?;

        for metric in selected {
            let name = metric.name();
            info!("Generating insight for metric: {name}");
            let text = insight::metric_insight(agent, name, context).await?;

            let style = overrides.get(name).copied().unwrap_or(default_style);
            // A failed chart degrades this metric to text-only; the other
            // metrics are unaffected.
            let chart_path = match chart::render(metric, style, dataset, &self.out_dir) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Chart generation failed for {name}: {e}");
                    None
                }
            };

            session.report.insert(
                name.to_string(),
                ReportEntry {
                    insight: text,
                    style,
                    chart_path,
                },
            );
        }

        let pdf_path = report::assemble(&session.report, &self.out_dir.join("final_report.pdf"))?;
        println!("Report written to: {}", pdf_path.display());
        session.final_report = Some(pdf_path.clone());

        if let Some(address) = email {
            let sent = mailer::send_from_env(
                &[address.to_string()],
                "AI Report",
                "Find your report attached.",
                &[pdf_path.as_path()],
            );
            if sent {
                println!("Email sent.");
                if let Some(recur) = recur {
                    // The recurrence selector is acknowledged only; no job
                    // is registered.
                    info!("Scheduled for {recur}. (Scheduler backend required.)");
                    println!("Scheduled for {recur}. (Scheduler backend required.)");
                }
            } else {
                println!("Email failed.");
            }
        }

        Ok(())
    }

    async fn run_daily<A: QueryAgent>(
        &self,
        agent: &A,
        api_key: &str,
        session: &mut Session,
    ) -> Result<()> {
        let summary = insight::all_insights(agent).await;
        let text_path = self.out_dir.join("auto_insights.txt");
        std::fs::write(&text_path, &summary)?;
        info!("Batch insights written to: {}", text_path.display());

        let script = insight::podcast_script(agent, PodcastSource::DailyDigest, &summary).await?;
        let narrator = Narrator::new(api_key.to_string())?;
        let audio_path = narrator
            .speak(&script, &self.out_dir.join("auto_podcast.mp3"))
            .await?;

        let pdf_path = report::assemble_text(
            "Daily Course Insights",
            &summary,
            &self.out_dir.join("auto_insights.pdf"),
        )?;
        session.all_insights = Some(summary);
        session.final_report = Some(pdf_path.clone());

        let subject = format!("Daily Course Insights - {}", Utc::now().format("%Y-%m-%d"));
        let body = "Attached are your latest daily insights and podcast summary.";
        let sent = match MailConfig::from_env() {
            Ok(config) => mailer::send(
                &config,
                &config.receivers,
                &subject,
                body,
                &[audio_path.as_path(), pdf_path.as_path()],
            ),
            Err(e) => {
                warn!("Email configuration error: {e}");
                false
            }
        };

        if sent {
            println!("Email sent successfully.");
        } else {
            println!("Email failed.");
        }
        Ok(())
    }
}

/// Resolve requested metric names, defaulting to the first four when none
/// are given.
fn resolve_metrics(requested: &[String]) -> Result<Vec<Metric>> {
    if requested.is_empty() {
        return Ok(METRIC_NAMES[..4]
            .iter()
            .filter_map(|name| Metric::from_name(name))
            .collect());
    }

    requested
        .iter()
        .map(|name| {
            Metric::from_name(name).ok_or_else(|| {
                anyhow!(
                    "Unknown metric: {name}. Valid metrics: {}",
                    METRIC_NAMES.join(", ")
                )
            })
        })
        .collect()
}

/// Parse "Metric Name=style" override pairs.
fn parse_style_overrides(pairs: &[String]) -> Result<HashMap<String, ChartStyle>> {
    let mut overrides = HashMap::new();
    for pair in pairs {
        let (name, style) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid chart override '{pair}', expected 'Metric Name=style'"))?;
        let metric = Metric::from_name(name)
            .ok_or_else(|| anyhow!("Unknown metric in chart override: {name}"))?;
        let style = ChartStyle::from_str(style.trim(), true)
            .map_err(|e| anyhow!("Invalid chart style in '{pair}': {e}"))?;
        overrides.insert(metric.name().to_string(), style);
    }
    Ok(overrides)
}
