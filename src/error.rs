//! Errors for the `irc-session` crate using `thiserror`.

use std::io::Error as IoError;

use thiserror::Error;

use crate::proto::error::ProtocolError;

/// A specialized `Result` type for the `irc-session` crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// An internal I/O error.
    #[error("an io error occurred")]
    Io(#[source] IoError),

    /// An internal proxy error.
    #[cfg(feature = "proxy")]
    #[error("a proxy error occurred")]
    Proxy(#[source] tokio_socks::Error),

    /// An internal TLS error.
    #[cfg(feature = "tls-native")]
    #[error("a TLS error occurred")]
    Tls(#[source] native_tls::Error),

    /// An internal TLS error.
    #[cfg(all(feature = "tls-rust", not(feature = "tls-native")))]
    #[error("a TLS error occurred")]
    Tls(#[source] tokio_rustls::rustls::TLSError),

    /// Error for invalid configurations.
    #[error("invalid config: {}", path)]
    InvalidConfig {
        /// The path to the configuration, or "<none>" if none specified.
        path: String,
        /// The detailed configuration error.
        #[source]
        cause: ConfigError,
    },

    /// Error encountered when parsing or writing the IRC protocol.
    #[error("a protocol error occurred")]
    Proto(#[source] ProtocolError),

    /// An upgrade snapshot line could not be read back.
    #[error("invalid snapshot record at line {}", line)]
    Snapshot {
        /// The 1-based line of the snapshot that failed.
        line: usize,
        /// The decoding error.
        #[source]
        cause: serde_json::Error,
    },

    /// The named server is not in the registry.
    #[error("server {} not found", name)]
    ServerNotFound {
        /// The server name that was looked up.
        name: String,
    },

    /// A server with this name already exists.
    #[error("server {} already exists", name)]
    ServerExists {
        /// The conflicting server name.
        name: String,
    },

    /// The server cannot be deleted or renamed while connected.
    #[error("server {} is connected", name)]
    ServerConnected {
        /// The connected server's name.
        name: String,
    },

    /// The server has no address to connect to.
    #[error("server {} has no address", name)]
    NoAddress {
        /// The server that lacks an address.
        name: String,
    },

    /// Every configured and generated nickname was refused by the server.
    #[error("all declared nicknames are already in use or reserved")]
    NoUsableNick,

    /// The server did not complete registration in time.
    #[error("connection timeout (message 001 not received)")]
    ConnectionTimeout,

    /// No redirect pattern has this name.
    #[error("redirect pattern {} not found", name)]
    UnknownRedirectPattern {
        /// The pattern name.
        name: String,
    },

    /// Stream has stopped producing.
    #[error("stream has stopped producing")]
    StreamClosed,

    /// A user command was rejected.
    #[error("command failed")]
    Command(#[source] CommandError),
}

/// Errors that occur with configurations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse as TOML.
    #[cfg(feature = "toml_config")]
    #[error("invalid toml")]
    InvalidToml(#[source] TomlError),

    /// Failed to parse as JSON.
    #[cfg(feature = "json_config")]
    #[error("invalid json")]
    InvalidJson(#[source] serde_json::Error),

    /// Failed to parse as YAML.
    #[cfg(feature = "yaml_config")]
    #[error("invalid yaml")]
    InvalidYaml(#[source] serde_yaml::Error),

    /// Failed to parse the given format because it was disabled at compile-time.
    #[error("config format disabled: {}", format)]
    ConfigFormatDisabled {
        /// The disabled file format.
        format: &'static str,
    },

    /// Could not identify the given file format.
    #[error("config format unknown: {}", format)]
    UnknownConfigFormat {
        /// The unknown file extension.
        format: String,
    },

    /// File was missing an extension to identify file format.
    #[error("missing format extension")]
    MissingExtension,

    /// A server entry has no name.
    #[error("server name not specified")]
    ServerNameNotSpecified,

    /// Two server entries share a name.
    #[error("duplicate server name: {}", name)]
    DuplicateServer {
        /// The repeated name.
        name: String,
    },

    /// A server names an encoding that is not known.
    #[error("unknown encoding {} for server {}", encoding, server)]
    UnknownEncoding {
        /// The server entry.
        server: String,
        /// The label given.
        encoding: String,
    },
}

/// A wrapper that combines toml's serialization and deserialization errors.
#[cfg(feature = "toml_config")]
#[derive(Debug, Error)]
pub enum TomlError {
    /// A TOML deserialization error.
    #[error("deserialization failed")]
    Read(#[source] toml::de::Error),
    /// A TOML serialization error.
    #[error("serialization failed")]
    Write(#[source] toml::ser::Error),
}

/// A user command that was rejected before anything was changed or sent.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandError {
    /// The command needs a connected server.
    #[error("you are not connected to server {}", server)]
    NotConnected {
        /// The server the command was issued on.
        server: String,
    },

    /// The command must be run in a channel buffer or given a channel.
    #[error("this command must be executed in a channel")]
    NoChannel,

    /// The channel is not known to the server.
    #[error("channel {} not found", name)]
    ChannelNotFound {
        /// The channel that was looked up.
        name: String,
    },

    /// A required argument is missing.
    #[error("missing argument: {}", what)]
    MissingArgument {
        /// What is missing.
        what: &'static str,
    },

    /// A wildcard over every nick requires an explicit confirmation.
    #[error("\"-yes\" argument is required for nick \"*\" (security reason)")]
    WildcardNeedsYes,

    /// A modelist item number does not exist.
    #[error("invalid number: {}", value)]
    InvalidNumber {
        /// The number given.
        value: String,
    },
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Error {
        Error::Proto(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Error {
        Error::Command(e)
    }
}

#[cfg(feature = "proxy")]
impl From<tokio_socks::Error> for Error {
    fn from(e: tokio_socks::Error) -> Error {
        Error::Proxy(e)
    }
}

#[cfg(feature = "tls-native")]
impl From<native_tls::Error> for Error {
    fn from(e: native_tls::Error) -> Error {
        Error::Tls(e)
    }
}

#[cfg(all(feature = "tls-rust", not(feature = "tls-native")))]
impl From<tokio_rustls::rustls::TLSError> for Error {
    fn from(e: tokio_rustls::rustls::TLSError) -> Error {
        Error::Tls(e)
    }
}
