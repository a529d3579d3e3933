//! Session configuration using serde.
use encoding::label::encoding_from_whatwg_label;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::prelude::*,
    path::{Path, PathBuf},
};

#[cfg(feature = "proxy")]
use super::proxy::ProxyType;
use crate::error::Error::InvalidConfig;
#[cfg(feature = "toml_config")]
use crate::error::TomlError;
use crate::error::{ConfigError, Result};

/// Global configuration plus one `ServerConfig` per server.
///
/// # Building a configuration programmatically
///
/// `Config` is an ordinary struct with public fields, so it can be built in code. Start from
/// `Config::default()` so that the fields you leave out take their documented defaults.
///
/// ```
/// use irc_session::client::data::{Config, ServerConfig};
///
/// let config = Config {
///     smart_filter: Some(false),
///     servers: Some(vec![ServerConfig {
///         name: "libera".to_owned(),
///         addresses: Some(vec!["irc.libera.chat/6697".to_owned()]),
///         tls: Some(true),
///         nicks: Some(vec!["alice".to_owned()]),
///         ..ServerConfig::default()
///     }]),
///     ..Config::default()
/// };
/// assert_eq!(config.server("libera").unwrap().addresses(), vec![("irc.libera.chat".to_owned(), 6697)]);
/// ```
///
/// # Loading a configuration from a file
///
/// ## TOML (`config.toml`)
/// ```toml
/// smart_filter = true
///
/// [[servers]]
/// name = "libera"
/// addresses = ["irc.libera.chat/6697"]
/// tls = true
/// nicks = ["alice", "alice_"]
/// autojoin = "#rust,#ircv3"
/// ```
///
/// ## Rust
/// ```no_run
/// use irc_session::client::data::Config;
///
/// let config = Config::load("config.toml").unwrap();
/// ```
#[derive(Clone, Deserialize, Serialize, Default, PartialEq, Debug)]
pub struct Config {
    /// Multiplier applied to the reconnect delay after each failed attempt.
    pub autoreconnect_delay_growing: Option<u32>,
    /// Upper bound of the reconnect delay in seconds, 0 for none.
    pub autoreconnect_delay_max: Option<u32>,
    /// Seconds between two lag checks, 0 to disable them.
    pub lag_check: Option<u32>,
    /// Lag in seconds after which no more lag is measured.
    pub lag_max: Option<u32>,
    /// Lag in seconds that forces a reconnection, 0 to never reconnect.
    pub lag_reconnect: Option<u32>,
    /// Whether a missing `sasl` capability counts as a SASL failure.
    pub sasl_fail_unavailable: Option<bool>,
    /// How many raw lines the raw protocol log keeps.
    pub raw_messages: Option<usize>,
    /// Seconds after which a pending redirect times out.
    pub redirect_timeout: Option<u32>,

    /// Whether join/part/quit/nick lines of quiet nicks are filtered.
    pub smart_filter: Option<bool>,
    /// Minutes since a nick last spoke for its join/part/quit to be filtered.
    pub smart_filter_delay: Option<u32>,
    /// Whether joins are filtered.
    pub smart_filter_join: Option<bool>,
    /// Minutes during which a filtered join is unmasked if the nick speaks.
    pub smart_filter_join_unmask: Option<u32>,
    /// Whether parts and quits are filtered.
    pub smart_filter_quit: Option<bool>,
    /// Whether nick changes are filtered.
    pub smart_filter_nick: Option<bool>,
    /// Mode letters whose changes are filtered, `+` for list and prefix modes, `-` to negate.
    pub smart_filter_mode: Option<String>,
    /// How private buffers are grouped.
    pub pv_buffer: Option<PvBuffer>,

    /// Whether CTCP replies sent to other users are displayed.
    pub display_ctcp_reply: Option<bool>,
    /// Whether unknown CTCP requests are displayed.
    pub display_ctcp_unknown: Option<bool>,
    /// strftime format of the CTCP TIME reply.
    pub ctcp_time_format: Option<String>,
    /// Whether typing notifications of other nicks are tracked.
    pub typing_status_nicks: Option<bool>,
    /// Whether our own typing state is sent to channels and nicks.
    pub typing_status_self: Option<bool>,
    /// CTCP replies keyed by lowercase CTCP name, or `server.ctcp` for one server. An empty reply
    /// blocks the CTCP.
    pub ctcp: Option<BTreeMap<String, String>>,

    /// One entry per server.
    pub servers: Option<Vec<ServerConfig>>,

    /// The path that this configuration was loaded from.
    ///
    /// This should not be specified in any configuration. It will automatically be handled by the library.
    #[serde(skip_serializing)]
    #[doc(hidden)]
    pub path: Option<PathBuf>,
}

/// How private buffers are laid out. These choices are exclusive.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PvBuffer {
    /// One buffer per private conversation.
    Independent,
    /// One buffer for all private conversations of a server.
    MergeByServer,
    /// One buffer for all private conversations of all servers.
    MergeAll,
}

/// The SASL mechanism used to authenticate.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaslMechanism {
    /// Username and password, sent in the clear over the (ideally TLS) connection.
    Plain,
    /// Authentication by the TLS client certificate.
    External,
}

impl SaslMechanism {
    /// The mechanism name sent with `AUTHENTICATE`.
    pub fn as_str(self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::External => "EXTERNAL",
        }
    }
}

/// What to do when SASL authentication fails.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaslFail {
    /// Finish registration without authentication.
    Continue,
    /// Disconnect and schedule a reconnection.
    Reconnect,
    /// Disconnect for good.
    Disconnect,
}

/// How the delay between reconnection attempts grows.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ReconnectPolicy {
    /// Delay of the first attempt, in seconds.
    pub base: i64,
    /// Multiplier applied after each failed attempt.
    pub growth: i64,
    /// Upper bound of the delay, 0 for none.
    pub max: i64,
}

impl ReconnectPolicy {
    /// The delay following `current`, where 0 means no attempt has been made yet.
    ///
    /// # Example
    /// ```
    /// # use irc_session::client::data::ReconnectPolicy;
    /// let policy = ReconnectPolicy { base: 10, growth: 2, max: 30 };
    /// assert_eq!(policy.next_delay(0), 10);
    /// assert_eq!(policy.next_delay(10), 20);
    /// assert_eq!(policy.next_delay(20), 30);
    /// ```
    pub fn next_delay(&self, current: i64) -> i64 {
        let next = if current == 0 {
            self.base
        } else {
            current.saturating_mul(self.growth)
        };
        if self.max > 0 && next > self.max {
            self.max
        } else {
            next
        }
    }
}

/// Configuration of one server.
#[derive(Clone, Deserialize, Serialize, Default, PartialEq, Debug)]
pub struct ServerConfig {
    /// The internal name of the server, unique in a registry.
    pub name: String,
    /// Addresses as `host/port`, tried in turn.
    pub addresses: Option<Vec<String>>,
    /// Whether IPv6 is allowed.
    pub ipv6: Option<bool>,
    /// Whether the connection uses TLS.
    pub tls: Option<bool>,
    /// Whether the server certificate is checked.
    pub tls_verify: Option<bool>,
    /// Path to an additional trusted certificate (DER).
    pub cert_path: Option<String>,
    /// Path to a client certificate (PKCS#12), used by SASL EXTERNAL.
    pub client_cert_path: Option<String>,
    /// Password of the client certificate.
    pub client_cert_pass: Option<String>,
    /// The type of proxy to use.
    #[cfg(feature = "proxy")]
    pub proxy_type: Option<ProxyType>,
    /// The proxy host.
    #[cfg(feature = "proxy")]
    pub proxy_server: Option<String>,
    /// The proxy port.
    #[cfg(feature = "proxy")]
    pub proxy_port: Option<u16>,
    /// The proxy username.
    #[cfg(feature = "proxy")]
    pub proxy_username: Option<String>,
    /// The proxy password.
    #[cfg(feature = "proxy")]
    pub proxy_password: Option<String>,
    /// Server password, sent with `PASS`.
    pub password: Option<String>,
    /// Comma separated capabilities to request, `*` for every supported one, `!cap` to exclude.
    pub capabilities: Option<String>,
    /// SASL mechanism.
    pub sasl_mechanism: Option<SaslMechanism>,
    /// SASL username.
    pub sasl_username: Option<String>,
    /// SASL password.
    pub sasl_password: Option<String>,
    /// Seconds to wait for SASL to complete.
    pub sasl_timeout: Option<u32>,
    /// What to do when SASL fails.
    pub sasl_fail: Option<SaslFail>,
    /// Whether the server connects on startup.
    pub autoconnect: Option<bool>,
    /// Whether the server reconnects after an unexpected disconnection.
    pub autoreconnect: Option<bool>,
    /// Base reconnection delay in seconds.
    pub autoreconnect_delay: Option<u32>,
    /// Nicknames to try, in order.
    pub nicks: Option<Vec<String>>,
    /// Whether nicknames are generated once `nicks` are all taken.
    pub nicks_alternate: Option<bool>,
    /// The user name.
    pub username: Option<String>,
    /// The real name.
    pub realname: Option<String>,
    /// Raw commands sent once registered.
    pub command: Option<Vec<String>>,
    /// Seconds between the commands and the autojoin.
    pub command_delay: Option<u32>,
    /// Channels to join once registered, as `#chan1,#chan2 key1`.
    pub autojoin: Option<String>,
    /// Whether manual joins and parts update `autojoin`.
    pub autojoin_dynamic: Option<bool>,
    /// Whether channels are rejoined after a kick.
    pub autorejoin: Option<bool>,
    /// Seconds before rejoining after a kick.
    pub autorejoin_delay: Option<u32>,
    /// Seconds to wait for the welcome message.
    pub connection_timeout: Option<u32>,
    /// Seconds between two high priority messages.
    pub anti_flood_prio_high: Option<u32>,
    /// Seconds between two low priority messages.
    pub anti_flood_prio_low: Option<u32>,
    /// Minutes between two away checks with `WHO`, 0 to disable them.
    pub away_check: Option<u32>,
    /// Channels with more nicks than this are skipped by the away check, 0 for no limit.
    pub away_check_max_nicks: Option<u32>,
    /// Default kick reason.
    pub default_msg_kick: Option<String>,
    /// Default part message.
    pub default_msg_part: Option<String>,
    /// Default quit message.
    pub default_msg_quit: Option<String>,
    /// Nicks to watch, comma separated.
    pub notify: Option<String>,
    /// The character encoding on the wire.
    pub encoding: Option<String>,
    /// Whether the driver uses an in-memory connection (for testing).
    pub use_mock_connection: Option<bool>,
    /// The text the in-memory connection hands back.
    pub mock_initial_value: Option<String>,
}

impl Config {
    fn with_path<P: AsRef<Path>>(mut self, path: P) -> Config {
        self.path = Some(path.as_ref().to_owned());
        self
    }

    fn path(&self) -> String {
        self.path
            .as_ref()
            .map(|buf| buf.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<none>".to_owned())
    }

    /// Loads a configuration from the desired path. This will use the file extension to detect
    /// which format to parse the file as (json, toml, or yaml). Using each format requires having
    /// its respective crate feature enabled. Only toml is available by default. The servers are
    /// checked for missing or repeated names.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let mut file = File::open(&path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;

        let res = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => Config::load_json(&path, &data),
            Some("toml") => Config::load_toml(&path, &data),
            Some("yaml") | Some("yml") => Config::load_yaml(&path, &data),
            Some(ext) => Err(InvalidConfig {
                path: path.as_ref().to_string_lossy().into_owned(),
                cause: ConfigError::UnknownConfigFormat {
                    format: ext.to_owned(),
                },
            }),
            None => Err(InvalidConfig {
                path: path.as_ref().to_string_lossy().into_owned(),
                cause: ConfigError::MissingExtension,
            }),
        };

        let config = res?.with_path(path);
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "json_config")]
    fn load_json<P: AsRef<Path>>(path: P, data: &str) -> Result<Config> {
        serde_json::from_str(data).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidJson(e),
        })
    }

    #[cfg(not(feature = "json_config"))]
    fn load_json<P: AsRef<Path>>(path: P, _: &str) -> Result<Config> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "JSON" },
        })
    }

    #[cfg(feature = "toml_config")]
    fn load_toml<P: AsRef<Path>>(path: P, data: &str) -> Result<Config> {
        toml::from_str(data).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidToml(TomlError::Read(e)),
        })
    }

    #[cfg(not(feature = "toml_config"))]
    fn load_toml<P: AsRef<Path>>(path: P, _: &str) -> Result<Config> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "TOML" },
        })
    }

    #[cfg(feature = "yaml_config")]
    fn load_yaml<P: AsRef<Path>>(path: P, data: &str) -> Result<Config> {
        serde_yaml::from_str(data).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidYaml(e),
        })
    }

    #[cfg(not(feature = "yaml_config"))]
    fn load_yaml<P: AsRef<Path>>(path: P, _: &str) -> Result<Config> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "YAML" },
        })
    }

    /// Saves a configuration to the desired path. This will use the file extension to detect
    /// which format to write the file as (json, toml, or yaml).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let _ = self.path.take();
        let data = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => self.save_json(&path)?,
            Some("toml") => self.save_toml(&path)?,
            Some("yaml") | Some("yml") => self.save_yaml(&path)?,
            Some(ext) => {
                return Err(InvalidConfig {
                    path: path.as_ref().to_string_lossy().into_owned(),
                    cause: ConfigError::UnknownConfigFormat {
                        format: ext.to_owned(),
                    },
                })
            }
            None => {
                return Err(InvalidConfig {
                    path: path.as_ref().to_string_lossy().into_owned(),
                    cause: ConfigError::MissingExtension,
                })
            }
        };
        let mut file = File::create(&path)?;
        file.write_all(data.as_bytes())?;
        self.path = Some(path.as_ref().to_owned());
        Ok(())
    }

    #[cfg(feature = "json_config")]
    fn save_json<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        serde_json::to_string(self).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidJson(e),
        })
    }

    #[cfg(not(feature = "json_config"))]
    fn save_json<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "JSON" },
        })
    }

    #[cfg(feature = "toml_config")]
    fn save_toml<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        toml::to_string(self).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidToml(TomlError::Write(e)),
        })
    }

    #[cfg(not(feature = "toml_config"))]
    fn save_toml<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "TOML" },
        })
    }

    #[cfg(feature = "yaml_config")]
    fn save_yaml<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::InvalidYaml(e),
        })
    }

    #[cfg(not(feature = "yaml_config"))]
    fn save_yaml<P: AsRef<Path>>(&self, path: &P) -> Result<String> {
        Err(InvalidConfig {
            path: path.as_ref().to_string_lossy().into_owned(),
            cause: ConfigError::ConfigFormatDisabled { format: "YAML" },
        })
    }

    /// Checks that every server has a name and that no name is used twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for server in self.servers() {
            if server.name.is_empty() {
                return Err(InvalidConfig {
                    path: self.path(),
                    cause: ConfigError::ServerNameNotSpecified,
                });
            }
            if !seen.insert(server.name.as_str()) {
                return Err(InvalidConfig {
                    path: self.path(),
                    cause: ConfigError::DuplicateServer {
                        name: server.name.clone(),
                    },
                });
            }
            if encoding_from_whatwg_label(server.encoding()).is_none() {
                return Err(InvalidConfig {
                    path: self.path(),
                    cause: ConfigError::UnknownEncoding {
                        server: server.name.clone(),
                        encoding: server.encoding().to_owned(),
                    },
                });
            }
        }
        Ok(())
    }

    /// The configured servers.
    pub fn servers(&self) -> &[ServerConfig] {
        self.servers.as_deref().unwrap_or(&[])
    }

    /// Looks a server up by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers().iter().find(|s| s.name == name)
    }

    /// The reconnection delay policy for `server`.
    pub fn reconnect_policy(&self, server: &ServerConfig) -> ReconnectPolicy {
        ReconnectPolicy {
            base: i64::from(server.autoreconnect_delay()),
            growth: i64::from(self.autoreconnect_delay_growing.unwrap_or(2)),
            max: i64::from(self.autoreconnect_delay_max.unwrap_or(600)),
        }
    }

    /// Gets the lag check interval in seconds.
    /// This defaults to 60s when not specified.
    pub fn lag_check(&self) -> i64 {
        i64::from(self.lag_check.unwrap_or(60))
    }

    /// Gets the largest lag measured, in seconds.
    /// This defaults to 1800s when not specified.
    pub fn lag_max(&self) -> i64 {
        i64::from(self.lag_max.unwrap_or(1800))
    }

    /// Gets the lag after which the session reconnects, in seconds.
    /// This defaults to 300s when not specified.
    pub fn lag_reconnect(&self) -> i64 {
        i64::from(self.lag_reconnect.unwrap_or(300))
    }

    /// Whether a missing `sasl` capability is a SASL failure.
    /// This defaults to true when not specified.
    pub fn sasl_fail_unavailable(&self) -> bool {
        self.sasl_fail_unavailable.unwrap_or(true)
    }

    /// Gets the size of the raw protocol log.
    /// This defaults to 256 lines when not specified.
    pub fn raw_messages(&self) -> usize {
        self.raw_messages.unwrap_or(256)
    }

    /// Gets the redirect timeout in seconds.
    /// This defaults to 60s when not specified.
    pub fn redirect_timeout(&self) -> i64 {
        i64::from(self.redirect_timeout.unwrap_or(60))
    }

    /// Whether the smart filter is enabled.
    pub fn smart_filter(&self) -> bool {
        self.smart_filter.unwrap_or(true)
    }

    /// Minutes of silence after which a nick's join/part/quit is filtered.
    pub fn smart_filter_delay(&self) -> i64 {
        i64::from(self.smart_filter_delay.unwrap_or(5))
    }

    /// Whether joins are filtered.
    pub fn smart_filter_join(&self) -> bool {
        self.smart_filter_join.unwrap_or(true)
    }

    /// Minutes during which a filtered join is unmasked when the nick speaks.
    pub fn smart_filter_join_unmask(&self) -> i64 {
        i64::from(self.smart_filter_join_unmask.unwrap_or(30))
    }

    /// Whether parts and quits are filtered.
    pub fn smart_filter_quit(&self) -> bool {
        self.smart_filter_quit.unwrap_or(true)
    }

    /// Whether nick changes are filtered.
    pub fn smart_filter_nick(&self) -> bool {
        self.smart_filter_nick.unwrap_or(true)
    }

    /// Mode letters whose changes are filtered.
    pub fn smart_filter_mode(&self) -> &str {
        self.smart_filter_mode.as_deref().unwrap_or("+")
    }

    /// How private buffers are grouped.
    pub fn pv_buffer(&self) -> PvBuffer {
        self.pv_buffer.unwrap_or(PvBuffer::Independent)
    }

    /// Whether typing notifications of other nicks are tracked.
    pub fn typing_status_nicks(&self) -> bool {
        self.typing_status_nicks.unwrap_or(true)
    }

    /// Whether our own typing state is sent.
    pub fn typing_status_self(&self) -> bool {
        self.typing_status_self.unwrap_or(true)
    }

    /// Whether CTCP replies sent to other users are displayed.
    pub fn display_ctcp_reply(&self) -> bool {
        self.display_ctcp_reply.unwrap_or(true)
    }

    /// Whether unknown CTCP requests are displayed.
    pub fn display_ctcp_unknown(&self) -> bool {
        self.display_ctcp_unknown.unwrap_or(true)
    }

    /// strftime format of the CTCP TIME reply.
    pub fn ctcp_time_format(&self) -> &str {
        self.ctcp_time_format.as_deref().unwrap_or("%a, %d %b %Y %T %z")
    }

    /// The reply format for a CTCP received on `server`, unexpanded.
    ///
    /// A `server.ctcp` entry wins over a `ctcp` entry, which wins over the built-in replies.
    /// `None` means the CTCP is unknown, `Some("")` that it is blocked.
    pub fn ctcp_reply(&self, server: &str, ctcp: &str) -> Option<&str> {
        let ctcp = ctcp.to_ascii_lowercase();
        if let Some(map) = &self.ctcp {
            let specific = map.get(&format!("{}.{}", server, ctcp));
            if let Some(reply) = specific.or_else(|| map.get(&ctcp)) {
                return Some(reply.as_str());
            }
        }
        DEFAULT_CTCP_REPLIES
            .iter()
            .find(|(name, _)| *name == ctcp)
            .map(|(_, reply)| *reply)
    }
}

/// Built-in CTCP replies, before variable expansion.
const DEFAULT_CTCP_REPLIES: &[(&str, &str)] = &[
    ("clientinfo", "$clientinfo"),
    ("finger", "$username ($realname)"),
    ("source", "$download"),
    ("time", "$time"),
    ("userinfo", "$username ($realname)"),
    ("version", "$version ($osinfo)"),
];

impl ServerConfig {
    /// Creates a configuration for a server with only a name and an address.
    pub fn new(name: &str, address: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_owned(),
            addresses: Some(vec![address.to_owned()]),
            ..ServerConfig::default()
        }
    }

    /// The addresses as `(host, port)`. A missing or invalid port is 6697 with TLS and 6667
    /// otherwise.
    pub fn addresses(&self) -> Vec<(String, u16)> {
        let default_port = if self.tls() { 6697 } else { 6667 };
        self.addresses.as_ref().map_or(vec![], |v| {
            v.iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(|a| match a.rsplit_once('/') {
                    Some((host, port)) => (host.to_owned(), port.parse().unwrap_or(default_port)),
                    None => (a.to_owned(), default_port),
                })
                .collect()
        })
    }

    /// Whether IPv6 is allowed.
    pub fn ipv6(&self) -> bool {
        self.ipv6.unwrap_or(true)
    }

    /// Whether the connection uses TLS.
    pub fn tls(&self) -> bool {
        self.tls.unwrap_or(false)
    }

    /// Whether the server certificate is checked.
    pub fn tls_verify(&self) -> bool {
        self.tls_verify.unwrap_or(true)
    }

    /// Gets the path to an additional trusted certificate.
    pub fn cert_path(&self) -> Option<&str> {
        self.cert_path.as_deref()
    }

    /// Gets the path to the client certificate.
    pub fn client_cert_path(&self) -> Option<&str> {
        self.client_cert_path.as_deref()
    }

    /// Gets the client certificate password.
    pub fn client_cert_pass(&self) -> &str {
        self.client_cert_pass.as_deref().unwrap_or("")
    }

    /// Gets the type of the proxy.
    #[cfg(feature = "proxy")]
    pub fn proxy_type(&self) -> ProxyType {
        self.proxy_type.unwrap_or(ProxyType::None)
    }

    /// Gets the proxy host.
    #[cfg(feature = "proxy")]
    pub fn proxy_server(&self) -> &str {
        self.proxy_server.as_deref().unwrap_or("localhost")
    }

    /// Gets the proxy port.
    #[cfg(feature = "proxy")]
    pub fn proxy_port(&self) -> u16 {
        self.proxy_port.unwrap_or(1080)
    }

    /// Gets the proxy username.
    #[cfg(feature = "proxy")]
    pub fn proxy_username(&self) -> &str {
        self.proxy_username.as_deref().unwrap_or("")
    }

    /// Gets the proxy password.
    #[cfg(feature = "proxy")]
    pub fn proxy_password(&self) -> &str {
        self.proxy_password.as_deref().unwrap_or("")
    }

    /// Gets the server password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Gets the requested capabilities.
    pub fn capabilities(&self) -> &str {
        self.capabilities.as_deref().unwrap_or("*")
    }

    /// Gets the SASL mechanism.
    pub fn sasl_mechanism(&self) -> SaslMechanism {
        self.sasl_mechanism.unwrap_or(SaslMechanism::Plain)
    }

    /// Gets the SASL username.
    pub fn sasl_username(&self) -> Option<&str> {
        self.sasl_username.as_deref().filter(|s| !s.is_empty())
    }

    /// Gets the SASL password.
    pub fn sasl_password(&self) -> Option<&str> {
        self.sasl_password.as_deref().filter(|s| !s.is_empty())
    }

    /// Gets the SASL timeout in seconds.
    /// This defaults to 15s when not specified.
    pub fn sasl_timeout(&self) -> i64 {
        i64::from(self.sasl_timeout.unwrap_or(15))
    }

    /// What happens when SASL fails.
    pub fn sasl_fail(&self) -> SaslFail {
        self.sasl_fail.unwrap_or(SaslFail::Reconnect)
    }

    /// Whether SASL is configured: EXTERNAL, or PLAIN with both credentials.
    pub fn sasl_requested(&self) -> bool {
        match self.sasl_mechanism() {
            SaslMechanism::External => true,
            SaslMechanism::Plain => self.sasl_username().is_some() && self.sasl_password().is_some(),
        }
    }

    /// Whether the server connects on startup.
    pub fn autoconnect(&self) -> bool {
        self.autoconnect.unwrap_or(false)
    }

    /// Whether the server reconnects after an unexpected disconnection.
    pub fn autoreconnect(&self) -> bool {
        self.autoreconnect.unwrap_or(true)
    }

    /// Base reconnection delay in seconds.
    pub fn autoreconnect_delay(&self) -> u32 {
        self.autoreconnect_delay.unwrap_or(10)
    }

    /// Gets the nicknames to try, in order.
    pub fn nicks(&self) -> Vec<&str> {
        self.nicks.as_ref().map_or(vec![], |v| {
            v.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
        })
    }

    /// Whether alternate nicknames are generated.
    pub fn nicks_alternate(&self) -> bool {
        self.nicks_alternate.unwrap_or(true)
    }

    /// Gets the user name, defaulting to the first nickname.
    pub fn username(&self) -> &str {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => user,
            _ => self.nicks().first().copied().unwrap_or("user"),
        }
    }

    /// Gets the real name, defaulting to the user name.
    pub fn realname(&self) -> &str {
        match self.realname.as_deref() {
            Some(real) => real,
            None => self.username(),
        }
    }

    /// Gets the commands sent once registered.
    pub fn command(&self) -> Vec<&str> {
        self.command
            .as_ref()
            .map_or(vec![], |v| v.iter().map(|s| &s[..]).collect())
    }

    /// Gets the delay between commands and autojoin, in seconds.
    pub fn command_delay(&self) -> i64 {
        i64::from(self.command_delay.unwrap_or(0))
    }

    /// Gets the autojoin string.
    pub fn autojoin(&self) -> &str {
        self.autojoin.as_deref().unwrap_or("")
    }

    /// Whether manual joins and parts update the autojoin string.
    pub fn autojoin_dynamic(&self) -> bool {
        self.autojoin_dynamic.unwrap_or(false)
    }

    /// Whether channels are rejoined after a kick.
    pub fn autorejoin(&self) -> bool {
        self.autorejoin.unwrap_or(false)
    }

    /// Gets the autorejoin delay in seconds.
    pub fn autorejoin_delay(&self) -> i64 {
        i64::from(self.autorejoin_delay.unwrap_or(30))
    }

    /// Gets the registration timeout in seconds.
    pub fn connection_timeout(&self) -> i64 {
        i64::from(self.connection_timeout.unwrap_or(60))
    }

    /// Gets the flood delay for high priority messages, in seconds.
    pub fn anti_flood_prio_high(&self) -> i64 {
        i64::from(self.anti_flood_prio_high.unwrap_or(2))
    }

    /// Gets the flood delay for low priority messages, in seconds.
    pub fn anti_flood_prio_low(&self) -> i64 {
        i64::from(self.anti_flood_prio_low.unwrap_or(2))
    }

    /// Gets the away check interval in minutes.
    pub fn away_check(&self) -> i64 {
        i64::from(self.away_check.unwrap_or(0))
    }

    /// Gets the channel size limit for away checks.
    pub fn away_check_max_nicks(&self) -> usize {
        self.away_check_max_nicks.unwrap_or(25) as usize
    }

    /// Gets the default kick reason.
    pub fn default_msg_kick(&self) -> Option<&str> {
        self.default_msg_kick.as_deref().filter(|s| !s.is_empty())
    }

    /// Gets the default part message.
    pub fn default_msg_part(&self) -> Option<&str> {
        self.default_msg_part.as_deref().filter(|s| !s.is_empty())
    }

    /// Gets the default quit message.
    pub fn default_msg_quit(&self) -> Option<&str> {
        self.default_msg_quit.as_deref().filter(|s| !s.is_empty())
    }

    /// Gets the nicks to watch.
    pub fn notify(&self) -> Vec<&str> {
        self.notify.as_ref().map_or(vec![], |v| {
            v.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
        })
    }

    /// Gets the encoding used on the wire.
    /// This defaults to UTF-8 when not specified.
    pub fn encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or("UTF-8")
    }

    /// Whether the driver uses an in-memory connection.
    pub fn use_mock_connection(&self) -> bool {
        self.use_mock_connection.unwrap_or(false)
    }

    /// Gets the text handed back by the in-memory connection.
    pub fn mock_initial_value(&self) -> &str {
        self.mock_initial_value.as_deref().unwrap_or("")
    }
}
