mod agent;
mod catalog;
mod chart;
mod cli;
mod dataset;
mod error;
mod insight;
mod mailer;
mod metrics;
mod narration;
mod report;
mod session;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting CourseLens - Course Completion Insights Tool");
    cli.execute().await?;

    Ok(())
}
