#![forbid(unsafe_code)]

//! Harvests every video link from a YouTube channel's listing page and
//! downloads the videos into a directory named after the channel.

pub mod app;
pub mod channel;
pub mod config;
pub mod console;
pub mod credential;
pub mod destination;
pub mod harvester;
pub mod logging;
pub mod orchestrator;
pub mod resolver;
pub mod session;
pub mod validator;
