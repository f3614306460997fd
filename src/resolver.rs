#![forbid(unsafe_code)]

//! Turns a video link into a downloadable stream and saves it.
//!
//! The production resolver drives `yt-dlp`. When a YouTube Data API key is
//! configured, the API is consulted for the video's title and availability
//! before any download starts.

use crate::channel::VideoLink;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Best single-file stream, preferring mp4 for player compatibility.
pub const PREFERRED_FORMAT: &str = "best[ext=mp4]/best";
pub const DATA_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Private, removed, region-blocked, or otherwise refused by the site.
    #[error("video unavailable: {0}")]
    Unavailable(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("resolver I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("data API request failed: {0}")]
    Api(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub format_id: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVideo {
    pub link: VideoLink,
    pub id: String,
    pub title: String,
    pub stream: Stream,
}

impl ResolvedVideo {
    /// `<title>.<ext>`, with characters that cannot appear in a file name
    /// replaced.
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}",
            sanitize_file_name(&self.title),
            sanitize_file_name(&self.stream.extension)
        )
    }
}

pub trait MediaResolver {
    fn resolve(&self, link: &VideoLink) -> Result<ResolvedVideo, ResolveError>;

    /// Saves the selected stream under `destination` and returns its path.
    fn download(&self, video: &ResolvedVideo, destination: &Path)
    -> Result<PathBuf, ResolveError>;
}

/// Replaces path separators and control characters so a title can be used as
/// a single path component.
pub fn sanitize_file_name(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Subset of `yt-dlp --dump-single-json` the resolver needs.
#[derive(Debug, Deserialize)]
struct DumpedVideo {
    id: String,
    title: Option<String>,
    fulltitle: Option<String>,
    ext: Option<String>,
    format_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataApiResponse {
    #[serde(default)]
    items: Vec<DataApiItem>,
}

#[derive(Debug, Deserialize)]
struct DataApiItem {
    snippet: Option<DataApiSnippet>,
}

#[derive(Debug, Deserialize)]
struct DataApiSnippet {
    title: Option<String>,
}

pub struct YtDlpResolver {
    program: PathBuf,
    api_key: Option<String>,
    api_base: String,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<PathBuf>, api_key: Option<String>) -> Self {
        Self {
            program: program.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: DATA_API_BASE_URL.to_string(),
        }
    }

    /// Points Data API lookups at another host.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    /// Looks the video up through the Data API. `None` means the API has no
    /// public record of it.
    fn data_api_title(&self, key: &str, id: &str) -> Result<Option<String>, ResolveError> {
        let response = ureq::get(&format!("{}/videos", self.api_base))
            .query("part", "snippet")
            .query("id", id)
            .query("key", key)
            .call();
        let body: DataApiResponse = match response {
            Ok(response) => response
                .into_json()
                .map_err(|err| ResolveError::Api(format!("decoding response: {err}")))?,
            Err(ureq::Error::Status(code, _)) => {
                return Err(ResolveError::Api(format!("HTTP {code} for {id}")));
            }
            Err(err) => return Err(ResolveError::Api(err.to_string())),
        };
        Ok(body.items.into_iter().next().map(|item| {
            item.snippet
                .and_then(|snippet| snippet.title)
                .unwrap_or_default()
        }))
    }
}

impl MediaResolver for YtDlpResolver {
    fn resolve(&self, link: &VideoLink) -> Result<ResolvedVideo, ResolveError> {
        let output = self
            .command()
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--format")
            .arg(PREFERRED_FORMAT)
            .arg(link.as_str())
            .output()?;

        if !output.status.success() {
            return Err(ResolveError::Unavailable(failure_reason(
                &output.stderr,
                output.status,
            )));
        }

        let dumped: DumpedVideo = serde_json::from_slice(&output.stdout)
            .map_err(|err| ResolveError::Unavailable(format!("unreadable metadata: {err}")))?;

        let mut title = dumped
            .title
            .or(dumped.fulltitle)
            .unwrap_or_else(|| dumped.id.clone());

        // Only an explicit "no such video" from the API skips the item; a bad
        // key or an outage keeps the yt-dlp metadata.
        if let Some(key) = &self.api_key {
            match self.data_api_title(key, &dumped.id) {
                Ok(None) => {
                    return Err(ResolveError::Unavailable(format!(
                        "{} is not listed by the data API",
                        dumped.id
                    )));
                }
                Ok(Some(api_title)) if !api_title.trim().is_empty() => title = api_title,
                Ok(Some(_)) => {}
                Err(err) => {
                    tracing::warn!(id = %dumped.id, error = %err, "data API lookup failed, using yt-dlp title");
                }
            }
        }

        Ok(ResolvedVideo {
            link: link.clone(),
            id: dumped.id,
            title,
            stream: Stream {
                format_id: dumped
                    .format_id
                    .unwrap_or_else(|| PREFERRED_FORMAT.to_string()),
                extension: dumped.ext.unwrap_or_else(|| "mp4".to_string()),
            },
        })
    }

    fn download(
        &self,
        video: &ResolvedVideo,
        destination: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let target = destination.join(video.file_name());
        // Literal percent signs in the title would be read as template fields.
        let stem = sanitize_file_name(&video.title).replace('%', "%%");
        let template = destination.join(format!("{stem}.%(ext)s"));

        let output = self
            .command()
            .arg("--format")
            .arg(&video.stream.format_id)
            .arg("--output")
            .arg(template.to_string_lossy().to_string())
            .arg("--no-playlist")
            .arg("--no-overwrites")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg(video.link.as_str())
            .output()?;

        if !output.status.success() {
            return Err(ResolveError::Download(failure_reason(
                &output.stderr,
                output.status,
            )));
        }
        if !target.is_file() {
            return Err(ResolveError::Download(format!(
                "{} was not written",
                target.display()
            )));
        }
        Ok(target)
    }
}

/// Runs `<program> --version` so a missing yt-dlp is reported before any
/// browser work starts.
pub fn ensure_program_available(program: &Path) -> anyhow::Result<()> {
    let status = Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => anyhow::bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => anyhow::bail!(
            "{} is not installed or not in PATH: {}",
            program.display(),
            err
        ),
    }
}

/// yt-dlp prints the useful part as `ERROR: ...`; fall back to the exit status.
fn failure_reason(stderr: &[u8], status: std::process::ExitStatus) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| text.lines().rev().find(|line| !line.trim().is_empty()))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}
