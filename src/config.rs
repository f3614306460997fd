#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_CREDENTIAL_FILE: &str = ".channel-harvester-api.json";
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;
pub const DEFAULT_SCROLL_PAUSE_MS: u64 = 1_000;
pub const DEFAULT_MAX_SCROLL_STEPS: usize = 5_000;

/// Everything the binary needs to know before it opens a browser.
#[derive(Debug, Clone)]
pub struct Settings {
    pub webdriver_url: String,
    pub output_dir: PathBuf,
    pub credential_file: PathBuf,
    pub yt_dlp: PathBuf,
    pub page_load_timeout: Duration,
    pub settle_delay: Duration,
    pub scroll_pause: Duration,
    pub max_scroll_steps: usize,
    pub headless: bool,
}

/// Values that win over both the environment and the `.env` file. Filled from
/// command-line flags.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub webdriver_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub credential_file: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
    pub page_load_timeout_secs: Option<u64>,
    pub headless: Option<bool>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings(
        &file_vars,
        env_var_string,
        dirs::home_dir(),
        overrides,
    ))
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
    overrides: SettingsOverrides,
) -> Settings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let lookup_parsed = |key: &str| lookup(key).and_then(|value| value.parse::<u64>().ok());

    let webdriver_url = overrides
        .webdriver_url
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup("HARVESTER_WEBDRIVER_URL"))
        .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
    let output_dir = overrides
        .output_dir
        .or_else(|| lookup("HARVESTER_OUTPUT_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let credential_file = overrides
        .credential_file
        .or_else(|| lookup("HARVESTER_CREDENTIAL_FILE").map(PathBuf::from))
        .unwrap_or_else(|| {
            home.unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_CREDENTIAL_FILE)
        });
    let yt_dlp = overrides
        .yt_dlp
        .or_else(|| lookup("HARVESTER_YT_DLP").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP));
    let page_load_timeout = overrides
        .page_load_timeout_secs
        .or_else(|| lookup_parsed("HARVESTER_PAGE_LOAD_TIMEOUT_SECS"))
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_SECS);
    let settle_delay =
        lookup_parsed("HARVESTER_SETTLE_DELAY_MS").unwrap_or(DEFAULT_SETTLE_DELAY_MS);
    let scroll_pause =
        lookup_parsed("HARVESTER_SCROLL_PAUSE_MS").unwrap_or(DEFAULT_SCROLL_PAUSE_MS);
    let max_scroll_steps = lookup("HARVESTER_MAX_SCROLL_STEPS")
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|steps| *steps > 0)
        .unwrap_or(DEFAULT_MAX_SCROLL_STEPS);
    let headless = overrides
        .headless
        .or_else(|| lookup("HARVESTER_HEADLESS").and_then(|value| parse_bool(&value)))
        .unwrap_or(true);

    Settings {
        webdriver_url,
        output_dir,
        credential_file,
        yt_dlp,
        page_load_timeout: Duration::from_secs(page_load_timeout),
        settle_delay: Duration::from_millis(settle_delay),
        scroll_pause: Duration::from_millis(scroll_pause),
        max_scroll_steps,
        headless,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Process environment first, then the `.env` file. Blank values count as
/// unset in both.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let non_blank = |value: String| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };
    env_lookup(key)
        .and_then(non_blank)
        .or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
