//! A client-side prelude, re-exporting the high-level session API.
//!
//! # Structure
//! A [`Client`] drives a [`Registry`] of [`Server`] sessions, configured by a [`Config`] with
//! one [`ServerConfig`] per server. Other tasks talk to a running client through a [`Sender`].
//! Sessions report to the outside through a [`Ui`] (buffers, nicklists, printed lines) and to
//! [`Event`] observers. User commands are methods of [`Server`] and fail with a
//! [`CommandError`] before anything is sent.
//!
//! The `proto` types describe the wire: `Message`, `Command` and `Response` for parsed lines,
//! `Capability` for IRCv3 capability names, `CaseMapping` and `ISupport` for what the server
//! announced.

#[cfg(feature = "proxy")]
pub use crate::client::data::ProxyType;

pub use crate::{
    client::{
        data::{Config, JoinList, PvBuffer, SaslFail, SaslMechanism, ServerConfig},
        event::{ChannelKind, Event, SessionState},
        outqueue::Priority,
        registry::Registry,
        server::{Action, Server},
        ui::{BufferId, BufferKind, MemoryUi, Ui},
        Client, Sender,
    },
    error::CommandError,
    proto::{Capability, CaseMapping, Command, ISupport, Message, Prefix, Response},
};
