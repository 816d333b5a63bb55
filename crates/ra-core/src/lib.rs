//! Core of the rocket-alert relay.
//!
//! Reads the aggregator's server-pushed alert stream, turns every alert into a
//! short human-readable message and fans it out to notification channels.
//! Channel adapters (Telegram, Mastodon) live in their own crates behind
//! [`channel::NotificationChannel`].

pub mod channel;
pub mod chunking;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod relay;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
