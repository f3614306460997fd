#![forbid(unsafe_code)]

//! Drives a channel's lazily loaded video listing to completion and collects
//! the video links it ends up showing.
//!
//! The listing only fetches the next batch of thumbnails when the viewport
//! nears the bottom, and the page exposes no "done loading" signal. The
//! harvester therefore polls: scroll one viewport further, wait, re-measure the
//! document height, and stop once the scroll target has overtaken everything
//! that loaded. Links are read once, from the final page.

use crate::channel::{ChannelUrl, VideoLink};
use crate::console::Console;
use crate::session::{BrowserSession, SessionError};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::time::Duration;

pub const DEFAULT_ANCHOR_SELECTOR: &str = "a#video-title-link, a#video-title";
const VIEWPORT_HEIGHT_SCRIPT: &str = "return window.screen.height;";
const SCROLL_HEIGHT_SCRIPT: &str = "return document.documentElement.scrollHeight";

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Wait after opening the listing, for the first batch to render.
    pub settle_delay: Duration,
    /// Wait after each scroll, for the requested batch to arrive.
    pub scroll_pause: Duration,
    /// Upper bound on scroll steps for listings that never stop growing.
    pub max_scroll_steps: usize,
    pub anchor_selector: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            scroll_pause: Duration::from_secs(1),
            max_scroll_steps: crate::config::DEFAULT_MAX_SCROLL_STEPS,
            anchor_selector: DEFAULT_ANCHOR_SELECTOR.to_string(),
        }
    }
}

/// Summary of how the scroll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub steps: usize,
    pub final_height: u64,
    /// False when `max_scroll_steps` cut the loop short.
    pub converged: bool,
}

/// Harvests the channel's listing. Session failures abort the phase: the user
/// gets a diagnostic and the result is empty.
pub async fn harvest<S, R, W>(
    session: &S,
    channel: &ChannelUrl,
    config: &HarvestConfig,
    console: &mut Console<R, W>,
) -> Result<Vec<VideoLink>>
where
    S: BrowserSession + ?Sized,
    R: BufRead,
    W: Write,
{
    match try_harvest(session, channel, config).await {
        Ok(links) => Ok(links),
        Err(err) => {
            tracing::warn!(channel = %channel, error = %err, "harvest aborted");
            if err.is_connectivity() {
                console.say("External connection occurred. Try again later.")?;
            } else {
                console.say(format!("Unable to read the video listing: {err}"))?;
            }
            Ok(Vec::new())
        }
    }
}

pub async fn try_harvest<S: BrowserSession + ?Sized>(
    session: &S,
    channel: &ChannelUrl,
    config: &HarvestConfig,
) -> Result<Vec<VideoLink>, SessionError> {
    let listing_url = channel.videos_url();
    session.navigate(&listing_url).await?;
    tokio::time::sleep(config.settle_delay).await;

    let report = scroll_to_end(session, config).await?;
    if !report.converged {
        tracing::warn!(
            steps = report.steps,
            height = report.final_height,
            "listing kept growing, extracting what loaded so far"
        );
    } else {
        tracing::debug!(steps = report.steps, height = report.final_height, "listing converged");
    }

    let hrefs = session.anchor_hrefs(&config.anchor_selector).await?;
    let links = dedup_links(hrefs);
    tracing::info!(url = %listing_url, count = links.len(), "harvested video links");
    Ok(links)
}

/// Scrolls one viewport per step until `viewport × step` passes the most
/// recently measured document height.
pub async fn scroll_to_end<S: BrowserSession + ?Sized>(
    session: &S,
    config: &HarvestConfig,
) -> Result<ScrollReport, SessionError> {
    let viewport = read_number(session, VIEWPORT_HEIGHT_SCRIPT).await?;
    if viewport == 0 {
        // No layout to scroll; whatever rendered is all we get.
        return Ok(ScrollReport {
            steps: 0,
            final_height: 0,
            converged: true,
        });
    }

    let mut height = 0;
    for step in 1..=config.max_scroll_steps {
        let position = viewport.saturating_mul(step as u64);
        session
            .evaluate(&format!("window.scrollTo(0, {position});"))
            .await?;
        tokio::time::sleep(config.scroll_pause).await;
        height = read_number(session, SCROLL_HEIGHT_SCRIPT).await?;
        if position > height {
            return Ok(ScrollReport {
                steps: step,
                final_height: height,
                converged: true,
            });
        }
    }

    Ok(ScrollReport {
        steps: config.max_scroll_steps,
        final_height: height,
        converged: false,
    })
}

async fn read_number<S: BrowserSession + ?Sized>(
    session: &S,
    script: &str,
) -> Result<u64, SessionError> {
    let value = session.evaluate(script).await?;
    as_pixels(&value)
        .ok_or_else(|| SessionError::Script(format!("{script:?} returned {value}, not a number")))
}

/// Browsers report heights as integers or floats depending on zoom.
fn as_pixels(value: &Value) -> Option<u64> {
    if let Some(int) = value.as_u64() {
        return Some(int);
    }
    let float = value.as_f64()?;
    if float.is_finite() {
        Some(float.max(0.0).round() as u64)
    } else {
        None
    }
}

/// Resolves hrefs to absolute links, keeping the first occurrence of each and
/// dropping anything without a usable href.
pub fn dedup_links<I>(hrefs: I) -> Vec<VideoLink>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .flatten()
        .filter_map(|href| VideoLink::from_href(&href))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{scripted, transcript};
    use crate::session::fake::{FakeSession, Landing};
    use serde_json::json;

    const CHANNEL: &str = "https://www.youtube.com/c/example";
    const LISTING: &str = "https://www.youtube.com/c/example/videos";

    fn quick_config() -> HarvestConfig {
        HarvestConfig {
            settle_delay: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            max_scroll_steps: 100,
            anchor_selector: DEFAULT_ANCHOR_SELECTOR.to_string(),
        }
    }

    fn channel() -> ChannelUrl {
        ChannelUrl::new_unchecked(CHANNEL)
    }

    fn hrefs(ids: &[&str]) -> Vec<Option<String>> {
        ids.iter()
            .map(|id| Some(format!("/watch?v={id}")))
            .collect()
    }

    #[tokio::test]
    async fn harvest_returns_fixture_links_in_order() {
        let session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1800, 2800, 3500], hrefs(&["a", "b", "c"]));

        let links = try_harvest(&session, &channel(), &quick_config())
            .await
            .unwrap();

        let urls: Vec<&str> = links.iter().map(VideoLink::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=a",
                "https://www.youtube.com/watch?v=b",
                "https://www.youtube.com/watch?v=c",
            ]
        );
        assert_eq!(session.navigations(), vec![LISTING.to_string()]);
    }

    #[tokio::test]
    async fn convergence_stops_one_step_after_growth_ends() {
        // Height stops growing after step 3.
        let session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1800, 2800, 3500], Vec::new());

        let report = scroll_to_end(&session, &quick_config()).await.unwrap();
        assert!(report.converged);
        assert_eq!(report.steps, 4);
        assert_eq!(report.final_height, 3500);
        assert_eq!(session.scrolls(), vec![1000, 2000, 3000, 4000]);
    }

    #[tokio::test]
    async fn convergence_waits_for_growth_to_stop() {
        let session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1500, 2500, 3500, 4500, 4500, 4500], Vec::new());

        let report = scroll_to_end(&session, &quick_config()).await.unwrap();
        assert!(report.converged);
        assert_eq!(report.steps, 5);
        assert!(session.scrolls().len() >= 4);
    }

    #[tokio::test]
    async fn convergence_uses_height_measured_after_each_scroll() {
        // Initial height is tiny; a pre-loop measurement would stop at step 1.
        let mut session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![2100, 3100, 3100], Vec::new());
        session.initial_height = 500;

        let report = scroll_to_end(&session, &quick_config()).await.unwrap();
        assert_eq!(report.steps, 4);
    }

    #[tokio::test]
    async fn extra_scroll_steps_do_not_change_result() {
        let anchors = hrefs(&["a", "b", "a", "c", "b"]);
        let short = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1200], anchors.clone());
        // Same content, but a tall footer keeps the loop scrolling longer.
        let long = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1200, 9000], anchors);

        let a = try_harvest(&short, &channel(), &quick_config()).await.unwrap();
        let b = try_harvest(&long, &channel(), &quick_config()).await.unwrap();
        assert!(long.scrolls().len() > short.scrolls().len());
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[tokio::test]
    async fn scroll_loop_is_bounded() {
        let session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing((1..=50).map(|step| step * 2000).collect(), hrefs(&["a"]));
        let config = HarvestConfig {
            max_scroll_steps: 10,
            ..quick_config()
        };

        let report = scroll_to_end(&session, &config).await.unwrap();
        assert!(!report.converged);
        assert_eq!(report.steps, 10);
        assert_eq!(session.scrolls().len(), 10);

        let links = try_harvest(&session, &channel(), &config).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn zero_viewport_skips_scrolling() {
        let mut session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![5000], hrefs(&["a"]));
        session.viewport = 0;

        let links = try_harvest(&session, &channel(), &quick_config()).await.unwrap();
        assert!(session.scrolls().is_empty());
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn missing_hrefs_are_dropped() {
        let anchors = vec![
            None,
            Some("/watch?v=a".to_string()),
            Some(String::new()),
            Some("https://www.youtube.com/watch?v=a".to_string()),
            Some("/watch?v=b".to_string()),
        ];
        let session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![900], anchors);

        let links = try_harvest(&session, &channel(), &quick_config()).await.unwrap();
        let urls: Vec<&str> = links.iter().map(VideoLink::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=a",
                "https://www.youtube.com/watch?v=b"
            ]
        );
    }

    #[tokio::test]
    async fn connection_failure_yields_empty_result_with_diagnostic() {
        let mut session = FakeSession::new()
            .with_page(LISTING, "Example - YouTube")
            .with_listing(vec![1800, 2800, 3500], hrefs(&["a"]));
        session.fail_evaluate_after = Some(2);
        let mut console = scripted(&[]);

        let links = harvest(&session, &channel(), &quick_config(), &mut console)
            .await
            .unwrap();
        assert!(links.is_empty());
        assert!(transcript(&console).contains("External connection occurred. Try again later."));
    }

    #[tokio::test]
    async fn navigation_timeout_yields_empty_result() {
        let session = FakeSession::new().with_landing(LISTING, Landing::Timeout);
        let mut console = scripted(&[]);

        let links = harvest(&session, &channel(), &quick_config(), &mut console)
            .await
            .unwrap();
        assert!(links.is_empty());
        assert!(transcript(&console).contains("Unable to read the video listing"));
    }

    #[test]
    fn pixels_accept_integers_and_floats() {
        assert_eq!(as_pixels(&json!(900)), Some(900));
        assert_eq!(as_pixels(&json!(899.6)), Some(900));
        assert_eq!(as_pixels(&json!(-3.0)), Some(0));
        assert_eq!(as_pixels(&json!("tall")), None);
        assert_eq!(as_pixels(&Value::Null), None);
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let links = dedup_links(hrefs(&["c", "a", "c", "b", "a"]));
        let ids: Vec<String> = links
            .iter()
            .map(|link| link.as_str().rsplit('=').next().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
