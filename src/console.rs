#![forbid(unsafe_code)]

//! Line-oriented conversation with the user. Generic over the reader and
//! writer so the prompt loops run against in-memory buffers in tests.

use anyhow::{Context, Result, bail};
use std::fmt::Display;
use std::io::{self, BufRead, Stdout, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid input: {0}")]
pub struct InvalidAnswer(pub String);

/// Accepts `Y` or `N` in either case, ignoring surrounding whitespace.
pub fn parse_answer(input: &str) -> Result<Answer, InvalidAnswer> {
    match input.trim().to_uppercase().as_str() {
        "Y" => Ok(Answer::Yes),
        "N" => Ok(Answer::No),
        other => Err(InvalidAnswer(other.to_string())),
    }
}

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.output, "{message}").context("writing to console")?;
        self.output.flush().context("flushing console")
    }

    /// Prints `question` without a newline and reads one line back. A closed
    /// input stream is an error: no answer can ever arrive.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}").context("writing prompt")?;
        self.output.flush().context("flushing prompt")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("reading console input")?;
        if read == 0 {
            bail!("input closed while waiting for an answer to {question:?}");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Re-asks until the user answers `Y` or `N`.
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            let raw = self.ask(question)?;
            match parse_answer(&raw) {
                Ok(answer) => return Ok(answer == Answer::Yes),
                Err(invalid) => {
                    self.say(&invalid)?;
                    self.say("Please choose: Y, N")?;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &W {
        &self.output
    }
}

#[cfg(test)]
pub(crate) fn scripted(lines: &[&str]) -> Console<io::Cursor<Vec<u8>>, Vec<u8>> {
    let mut input = lines.join("\n");
    if !lines.is_empty() {
        input.push('\n');
    }
    Console::new(io::Cursor::new(input.into_bytes()), Vec::new())
}

#[cfg(test)]
pub(crate) fn transcript(console: &Console<io::Cursor<Vec<u8>>, Vec<u8>>) -> String {
    String::from_utf8_lossy(console.output()).into_owned()
}
