//! Track resolution against music metadata providers.
//!
//! Identifiers (provider URLs or `<prefix>:<query>` searches) are resolved
//! to normalized track and playlist metadata by the [`resolver`]. Tracks
//! from providers that serve no audio get a playable stream at playback
//! time from the [`mirror`] resolver. [`track_state`] persists resolved
//! tracks without re-resolving them.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod identifier;
pub mod mirror;
pub mod parser;
pub mod protocol;
pub mod resolver;
pub mod retry;
pub mod source;
pub mod track;
pub mod track_state;
pub mod util;

#[cfg(test)]
mod test_utils;
