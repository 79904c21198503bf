// src/main.rs

use clap::Parser;
use color_eyre::eyre::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod api;
mod core;
mod logging;

use api::ScanHandler;
use crate::core::browser::chrome::ChromeEngine;
use crate::core::browser::LaunchConfig;
use crate::core::config::FeatureConfig;
use crate::core::guard::{RateLimiter, SystemClock};

/// Audits a web page for SEO, accessibility, performance, security and
/// responsive design, and prints the scored report as JSON.
#[derive(Debug, Parser)]
#[command(name = "sitegrade", version, about)]
struct Cli {
    /// The URL to scan. A bare hostname gets https:// prepended.
    url: String,

    /// Path to a JSON file toggling individual checkers on or off.
    #[arg(long)]
    features: Option<PathBuf>,

    /// Pretty-print the report JSON.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let cli = Cli::parse();
    let config = FeatureConfig::load(cli.features.as_deref());

    let handler = ScanHandler::new(
        Arc::new(ChromeEngine),
        RateLimiter::new(Arc::new(SystemClock)),
        reqwest::Client::new(),
        config,
        LaunchConfig::from_environment(),
    );

    let body = serde_json::json!({ "url": cli.url }).to_string();
    let response = handler.handle(&body, None, None).await;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response.body)?
    } else {
        response.body.to_string()
    };
    println!("{rendered}");

    if response.status == 200 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
