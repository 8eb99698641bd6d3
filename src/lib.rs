//! tgwatch — watch a Telegram channel from a user account.
//!
//! Logs in once (reusing a persisted session when it is still valid),
//! resolves a channel alias, then polls the channel history on a fixed
//! interval and prints every new message with its sender.
//!
//! The MTProto protocol is handled by a gateway sidecar reached over HTTP;
//! see [`telegram::gateway`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod poller;
pub mod resolver;
pub mod session;
pub mod telegram;
