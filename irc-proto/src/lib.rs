//! Support for the IRC protocol as spoken by a client session: message parsing, typed commands
//! and numerics, capability names, casemapping, `ISUPPORT` tokens and the Tokio line codecs.

#![warn(missing_docs)]

pub mod caps;
pub mod casemap;
pub mod chan;
pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
pub mod isupport;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod response;
pub mod split;

pub use self::caps::{Capability, NegotiationVersion};
pub use self::casemap::CaseMapping;
pub use self::chan::ChannelExt;
pub use self::command::{CapSubCommand, Command};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
pub use self::isupport::ISupport;
pub use self::message::{Message, Tag};
pub use self::mode::{ChanModeType, Mode};
pub use self::prefix::Prefix;
pub use self::response::Response;
