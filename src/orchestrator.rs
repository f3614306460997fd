#![forbid(unsafe_code)]

//! Sequential download of a harvested channel.
//!
//! Every link is visited once, in harvest order. A video that cannot be
//! resolved or saved is recorded as unavailable and the loop moves on; such
//! failures are common on large channels and are not reported to the user.

use crate::channel::VideoLink;
use crate::console::Console;
use crate::destination;
use crate::resolver::MediaResolver;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { title: String, path: PathBuf },
    Unavailable { reason: String },
}

impl DownloadOutcome {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, DownloadOutcome::Downloaded { .. })
    }
}

/// Per-link outcomes, in the order the links were given.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub outcomes: Vec<(VideoLink, DownloadOutcome)>,
}

impl DownloadSummary {
    pub fn visited(&self) -> usize {
        self.outcomes.len()
    }

    pub fn downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_downloaded())
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.visited() - self.downloaded()
    }
}

/// Downloads `videos` into `destination`, which the caller has already
/// prepared. Only console write failures escape as errors.
pub fn run<M, R, W>(
    resolver: &M,
    videos: &[VideoLink],
    destination: &Path,
    console: &mut Console<R, W>,
) -> Result<DownloadSummary>
where
    M: MediaResolver + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut summary = DownloadSummary::default();
    let total = videos.len();

    for (index, link) in videos.iter().enumerate() {
        let outcome = download_one(resolver, link, destination);
        match &outcome {
            DownloadOutcome::Downloaded { title, path } => {
                tracing::info!(
                    current = index + 1,
                    total,
                    path = %path.display(),
                    "downloaded"
                );
                console.say(format!("{title}  downloaded..."))?;
            }
            DownloadOutcome::Unavailable { reason } => {
                tracing::debug!(
                    current = index + 1,
                    total,
                    link = %link,
                    reason = %reason,
                    "skipped"
                );
            }
        }
        summary.outcomes.push((link.clone(), outcome));
    }

    tracing::info!(
        downloaded = summary.downloaded(),
        skipped = summary.skipped(),
        "channel download finished"
    );
    Ok(summary)
}

/// Resolves and saves one video. Anything created in `destination` by a failed
/// attempt is removed again.
fn download_one<M: MediaResolver + ?Sized>(
    resolver: &M,
    link: &VideoLink,
    destination: &Path,
) -> DownloadOutcome {
    let before = destination::snapshot(destination);
    let attempt = resolver
        .resolve(link)
        .and_then(|video| Ok((resolver.download(&video, destination)?, video.title)));

    match attempt {
        Ok((path, title)) => DownloadOutcome::Downloaded { title, path },
        Err(err) => {
            destination::remove_new_entries(destination, &before);
            DownloadOutcome::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}
