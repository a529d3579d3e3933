//! Connecting to a server through a proxy.
//!
//! ```
//! use irc_session::client::data::{ProxyType, ServerConfig};
//!
//! let server = ServerConfig {
//!     name: "libera".to_owned(),
//!     addresses: Some(vec!["irc.libera.chat/6697".to_owned()]),
//!     proxy_type: Some(ProxyType::Socks5),
//!     proxy_server: Some("127.0.0.1".to_owned()),
//!     proxy_port: Some(9050),
//!     ..ServerConfig::default()
//! };
//! assert_eq!(server.proxy_type(), ProxyType::Socks5);
//! ```

use serde::{Deserialize, Serialize};

/// Which proxy, if any, a server connects through.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// A direct connection.
    None,

    /// A SOCKS5 proxy. Hostnames are resolved by the proxy.
    Socks5,
}

impl Default for ProxyType {
    fn default() -> ProxyType {
        ProxyType::None
    }
}
