#![forbid(unsafe_code)]

//! Interactive channel downloader.
//!
//! Asks for a YouTube channel URL, scrolls the channel's video listing in a
//! WebDriver-controlled browser until every thumbnail has loaded, then
//! downloads each video with yt-dlp into `<output dir>/<channel name>`.
//! A chromedriver or geckodriver must already be listening on the configured
//! WebDriver URL.

use anyhow::Result;
use channel_harvester::app::{self, RunOptions};
use channel_harvester::config::{SettingsOverrides, resolve_settings};
use channel_harvester::console::Console;
use channel_harvester::credential;
use channel_harvester::logging::init_logging;
use channel_harvester::resolver::{YtDlpResolver, ensure_program_available};
use channel_harvester::session::{BrowserSession, WebDriverOptions, WebDriverSession};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line overrides. Anything left out falls back to the environment,
/// then to `.env`, then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "harvest_channel", version)]
struct Args {
    /// WebDriver server to drive, e.g. http://localhost:4444.
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Directory that receives one sub-directory per channel.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON file holding the optional resolver API key.
    #[arg(long)]
    credential_file: Option<PathBuf>,

    /// Alternate `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// yt-dlp executable.
    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,

    /// Page load timeout in seconds.
    #[arg(long = "page-load-timeout", value_name = "SECS")]
    page_load_timeout: Option<u64>,

    /// Show the browser window.
    #[arg(long)]
    no_headless: bool,
}

impl From<Args> for SettingsOverrides {
    fn from(args: Args) -> Self {
        SettingsOverrides {
            webdriver_url: args.webdriver_url,
            output_dir: args.output_dir,
            credential_file: args.credential_file,
            yt_dlp: args.yt_dlp,
            page_load_timeout_secs: args.page_load_timeout,
            headless: args.no_headless.then_some(false),
            env_path: args.env_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();

    let settings = resolve_settings(Args::parse().into())?;
    let mut console = Console::stdio();

    let api_key = credential::load_or_prompt(&settings.credential_file, &mut console)?;
    ensure_program_available(&settings.yt_dlp)?;

    let session = WebDriverSession::connect(&WebDriverOptions {
        webdriver_url: settings.webdriver_url.clone(),
        page_load_timeout: settings.page_load_timeout,
        headless: settings.headless,
    })
    .await?;
    let resolver = YtDlpResolver::new(&settings.yt_dlp, api_key);

    let outcome = app::run(&session, &resolver, &mut console, &RunOptions::from(&settings)).await;

    // The browser goes away on every path, including the fatal one.
    if let Err(err) = session.quit().await {
        tracing::warn!(error = %err, "closing the browser session failed");
    }

    Ok(ExitCode::from(outcome?))
}
