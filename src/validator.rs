#![forbid(unsafe_code)]

//! Channel URL validation: shape first, then a live page load.

use crate::channel::{ChannelUrl, YOUTUBE_404, is_channel_url};
use crate::console::Console;
use crate::session::{BrowserSession, SessionError};
use anyhow::Result;
use std::io::{BufRead, Write};

pub const CHANNEL_PROMPT: &str = "Enter the channel's url: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing entered yet. Silent.
    Empty,
    Malformed,
    TimedOut,
    NotFound,
    Unreachable(String),
}

impl Rejection {
    /// What the user sees before being asked again.
    pub fn diagnostic(&self) -> Vec<String> {
        match self {
            Rejection::Empty => Vec::new(),
            Rejection::Malformed => vec![
                "Wrong channel URL".to_string(),
                "Try including the whole URL starting by http/https...".to_string(),
            ],
            Rejection::TimedOut => {
                vec!["This is taking too long, unable to proceed...".to_string()]
            }
            Rejection::NotFound => vec!["Non existent channel".to_string()],
            Rejection::Unreachable(cause) => vec![format!("Unable to open the channel: {cause}")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted(ChannelUrl),
    Rejected(Rejection),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Accepted(_))
    }
}

/// Checks the candidate's shape and, if that passes, loads it in the session.
/// Leaves the session on the channel page when accepted.
pub async fn validate<S: BrowserSession + ?Sized>(
    session: &S,
    candidate: Option<&str>,
) -> Validation {
    let Some(candidate) = candidate.map(str::trim).filter(|value| !value.is_empty()) else {
        return Validation::Rejected(Rejection::Empty);
    };
    if !is_channel_url(candidate) {
        return Validation::Rejected(Rejection::Malformed);
    }

    if let Err(err) = session.navigate(candidate).await {
        tracing::warn!(url = candidate, error = %err, "channel page did not load");
        return Validation::Rejected(match err {
            SessionError::Timeout { .. } => Rejection::TimedOut,
            other => Rejection::Unreachable(other.to_string()),
        });
    }

    match session.current_url().await {
        Ok(landed) if landed == YOUTUBE_404 => Validation::Rejected(Rejection::NotFound),
        Ok(_) => Validation::Accepted(ChannelUrl::new_unchecked(candidate)),
        Err(err) => Validation::Rejected(Rejection::Unreachable(err.to_string())),
    }
}

/// States of the channel prompt loop.
enum ChannelInput {
    AwaitingInput,
    Validating(String),
    Accepted(ChannelUrl),
}

/// Asks for a channel URL until one validates. There is no default channel.
pub async fn get_channel<S, R, W>(session: &S, console: &mut Console<R, W>) -> Result<ChannelUrl>
where
    S: BrowserSession + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut state = ChannelInput::AwaitingInput;
    loop {
        state = match state {
            ChannelInput::AwaitingInput => {
                ChannelInput::Validating(console.ask(CHANNEL_PROMPT)?.trim().to_string())
            }
            ChannelInput::Validating(candidate) => {
                match validate(session, Some(&candidate)).await {
                    Validation::Accepted(channel) => ChannelInput::Accepted(channel),
                    Validation::Rejected(rejection) => {
                        for line in rejection.diagnostic() {
                            console.say(line)?;
                        }
                        ChannelInput::AwaitingInput
                    }
                }
            }
            ChannelInput::Accepted(channel) => return Ok(channel),
        };
    }
}
