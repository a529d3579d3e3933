//! An IRC client session engine with an async driver.
//!
//! The engine keeps, for every configured server, the connection state machine, the channels
//! and their nicks, the IRCv3 capability and SASL negotiation, flood-controlled outgoing queues,
//! reply redirection, the notify list and the raw protocol log. It can write all of that to an
//! upgrade snapshot and read it back. The [`client::Client`] driver runs it over tokio.
//!
//! The wire protocol itself lives in the `irc-proto` crate, re-exported as [`proto`].
#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub use irc_proto as proto;

pub mod client;
pub mod error;
