#![forbid(unsafe_code)]

//! The optional resolver API key, kept in a small JSON file between runs.

use crate::console::Console;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

const KEY_PROMPT: &str = "Please input resolver api key (leave empty for None): ";

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct CredentialFile {
    #[serde(rename = "API_KEY", default)]
    api_key: String,
}

/// Reads the key from `path`, or asks for it once and writes the file. An
/// empty key means "no key".
pub fn load_or_prompt<R: BufRead, W: Write>(
    path: &Path,
    console: &mut Console<R, W>,
) -> Result<Option<String>> {
    let stored = if path.exists() {
        console.say(format!("Reading resolver api key from {}", path.display()))?;
        read(path)?
    } else {
        let entered = CredentialFile {
            api_key: console.ask(KEY_PROMPT)?.trim().to_string(),
        };
        console.say(format!("Writing api key to {}", path.display()))?;
        write(path, &entered)?;
        entered
    };
    Ok(Some(stored.api_key).filter(|key| !key.is_empty()))
}

fn read(path: &Path) -> Result<CredentialFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write(path: &Path, credential: &CredentialFile) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let payload = serde_json::to_vec(credential).context("serializing credential")?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
