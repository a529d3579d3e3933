//! Data related to IRC functionality.

pub use crate::client::data::channel::{Channel, ModeContext, ModeOutcome, TypingState};
pub use crate::client::data::config::{Config, PvBuffer, ReconnectPolicy, SaslFail, SaslMechanism, ServerConfig};
pub use crate::client::data::join::{JoinEntry, JoinList, JoinSort};
pub use crate::client::data::modelist::{Modelist, ModelistItem, ModelistState};
pub use crate::client::data::nick::{Nick, PrefixTable};
#[cfg(feature = "proxy")]
pub use crate::client::data::proxy::ProxyType;
pub use crate::client::data::raw::{RawFlags, RawLog, RawMessage};

pub mod channel;
pub mod config;
pub mod join;
pub mod mask;
pub mod modelist;
pub mod nick;
#[cfg(feature = "proxy")]
pub mod proxy;
pub mod raw;
