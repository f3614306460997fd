#![forbid(unsafe_code)]

//! One interactive run: pick a channel, harvest its listing, confirm, and
//! download. Returns the process exit status.

use crate::channel::{ChannelUrl, channel_name_from_title};
use crate::config::Settings;
use crate::console::Console;
use crate::destination;
use crate::harvester::{self, HarvestConfig};
use crate::orchestrator;
use crate::resolver::MediaResolver;
use crate::session::{BrowserSession, SessionError};
use crate::validator::get_channel;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub const EXIT_OK: u8 = 0;
/// The channel page could not be loaded after validation.
pub const EXIT_CHANNEL_UNAVAILABLE: u8 = 1;
pub const DOWNLOAD_PROMPT: &str = "Want to download them all or abort? Y/N ";

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Parent of the per-channel directory.
    pub output_dir: PathBuf,
    pub harvest: HarvestConfig,
}

impl From<&Settings> for RunOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            harvest: HarvestConfig {
                settle_delay: settings.settle_delay,
                scroll_pause: settings.scroll_pause,
                max_scroll_steps: settings.max_scroll_steps,
                ..HarvestConfig::default()
            },
        }
    }
}

pub async fn run<S, M, R, W>(
    session: &S,
    resolver: &M,
    console: &mut Console<R, W>,
    options: &RunOptions,
) -> Result<u8>
where
    S: BrowserSession + ?Sized,
    M: MediaResolver + ?Sized,
    R: BufRead,
    W: Write,
{
    let channel = get_channel(session, console).await?;

    let channel_name = match fetch_channel_name(session, &channel).await {
        Ok(name) => name,
        Err(err) => {
            tracing::error!(channel = %channel, error = %err, "could not load channel page");
            if err.is_timeout() {
                console.say("This is taking too long, unable to proceed...")?;
            } else {
                console.say(format!("Unable to retrieve the channel: {err}"))?;
            }
            return Ok(EXIT_CHANNEL_UNAVAILABLE);
        }
    };
    console.say(format!("Channel {channel_name} retrieved successfully...."))?;

    let videos = harvester::harvest(session, &channel, &options.harvest, console).await?;
    console.say(format!("Channel contains {} videos.", videos.len()))?;

    if !console.confirm(DOWNLOAD_PROMPT)? {
        console.say("Ciao")?;
    } else {
        let channel_dir = destination::channel_directory(&options.output_dir, &channel_name);
        let wipe = channel_dir.is_dir()
            && console.confirm(&format!(
                "Channel directory {} exists. Delete it? ",
                channel_dir.display()
            ))?;
        destination::prepare(&channel_dir, wipe)?;
        orchestrator::run(resolver, &videos, &channel_dir, console)?;
    }

    console.say("Finished!")?;
    Ok(EXIT_OK)
}

/// Loads the channel root and reads its display name from the page title.
async fn fetch_channel_name<S: BrowserSession + ?Sized>(
    session: &S,
    channel: &ChannelUrl,
) -> Result<String, SessionError> {
    session.navigate(channel.as_str()).await?;
    let title = session.title().await?;
    Ok(channel_name_from_title(&title))
}
