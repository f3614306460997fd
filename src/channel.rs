#![forbid(unsafe_code)]

//! Channel and video link types shared by the validator, harvester and
//! orchestrator.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
/// Where YouTube redirects requests for channels that do not exist.
pub const YOUTUBE_404: &str = "https://www.youtube.com/error?src=404";
const VIDEOS_SEGMENT: &str = "videos";
const TITLE_SUFFIX: &str = " - YouTube";

static CHANNEL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(http|https)://www\.youtube\.com/(channel/|user/|c/)[a-zA-Z0-9\-]+$")
        .expect("channel url pattern compiles")
});

/// Returns true when `candidate` has the canonical channel URL shape. The
/// whole string must match; trailing path segments are rejected.
pub fn is_channel_url(candidate: &str) -> bool {
    CHANNEL_URL.is_match(candidate)
}

/// A channel URL that passed both the shape check and the liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUrl(String);

impl ChannelUrl {
    /// Only the validator hands these out, after the page loaded.
    pub(crate) fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of the channel's video listing sub-page.
    pub fn videos_url(&self) -> String {
        build_listing_url(&self.0)
    }
}

impl fmt::Display for ChannelUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins the `videos` segment onto a channel URL without doubling slashes or
/// the segment itself. Query strings and fragments are carried over.
pub fn build_listing_url(channel_url: &str) -> String {
    let (without_fragment, fragment) = match channel_url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (channel_url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let base = base.trim_end_matches('/');
    let suffix = format!("/{VIDEOS_SEGMENT}");
    let mut result = if base.ends_with(&suffix) {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    };

    if let Some(query) = query {
        result.push('?');
        result.push_str(query);
    }
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }

    result
}

/// Turns a page title such as `Some Channel - YouTube` into `Some Channel`.
pub fn channel_name_from_title(title: &str) -> String {
    let trimmed = title.trim();
    trimmed
        .strip_suffix(TITLE_SUFFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Absolute URL of a single video, as harvested from the listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoLink(String);

impl VideoLink {
    /// Resolves an anchor `href` against the site origin. Relative paths such
    /// as `/watch?v=abc` are common in the rendered listing.
    pub fn from_href(href: &str) -> Option<Self> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let base = Url::parse(YOUTUBE_BASE_URL).ok()?;
        let resolved = base.join(href).ok()?;
        match resolved.scheme() {
            "http" | "https" => Some(Self(resolved.into())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
