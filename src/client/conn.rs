//! Connections opened by the driver for a session: plain TCP, TLS, through a SOCKS5 proxy, or
//! an in-memory stream for tests.
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{sink::Sink, stream::Stream};
use pin_project::pin_project;
use tokio::net::{lookup_host, TcpStream};

#[cfg(feature = "proxy")]
use tokio_socks::tcp::Socks5Stream;

#[cfg(feature = "proxy")]
use crate::client::data::ProxyType;

#[cfg(feature = "tls-native")]
use std::fs::File;
#[cfg(feature = "tls-native")]
use std::io::Read;
#[cfg(feature = "tls-native")]
use tokio_native_tls::{native_tls::Certificate, native_tls::Identity, TlsConnector, TlsStream};

#[cfg(all(feature = "tls-rust", not(feature = "tls-native")))]
use std::{fs::File, io::BufReader, sync::Arc};
#[cfg(all(feature = "tls-rust", not(feature = "tls-native")))]
use tokio_rustls::{
    client::TlsStream,
    rustls::{internal::pemfile::certs, ClientConfig, RootCertStore, ServerCertVerified, ServerCertVerifier, TLSError},
    webpki::DNSNameRef,
    TlsConnector,
};

use crate::client::data::ServerConfig;
use crate::client::mock::MockStream;
use crate::client::transport::{LogView, Logged, Transport};
use crate::error;

/// An open connection, yielding received lines and accepting lines to send.
#[pin_project(project = ConnectionProj)]
pub enum Connection {
    #[doc(hidden)]
    Unsecured(#[pin] Transport<TcpStream>),
    #[doc(hidden)]
    #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
    Secured(#[pin] Transport<TlsStream<TcpStream>>),
    #[doc(hidden)]
    Mock(#[pin] Logged<MockStream>),
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match *self {
                Connection::Unsecured(_) => "Connection::Unsecured(...)",
                #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
                Connection::Secured(_) => "Connection::Secured(...)",
                Connection::Mock(_) => "Connection::Mock(...)",
            }
        )
    }
}

impl Connection {
    /// Opens a connection to `address`/`port` as configured for the session.
    pub async fn new(config: &ServerConfig, address: &str, port: u16, tls: bool, ipv6: bool) -> error::Result<Connection> {
        if config.use_mock_connection() {
            info!("[{}] using a mock connection", config.name);
            let stream = MockStream::new(config.mock_initial_value().as_bytes());
            return Ok(Connection::Mock(Logged::wrap(Transport::new(stream, config.encoding())?)));
        }
        let stream = Self::new_stream(config, address, port, ipv6).await?;
        if tls {
            Self::new_secured(config, address, stream).await
        } else {
            info!("[{}] connected to {}:{}", config.name, address, port);
            Ok(Connection::Unsecured(Transport::new(stream, config.encoding())?))
        }
    }

    #[cfg(not(any(feature = "tls-native", feature = "tls-rust")))]
    async fn new_secured(config: &ServerConfig, _: &str, _: TcpStream) -> error::Result<Connection> {
        warn!("[{}] TLS requested but no TLS support is compiled in", config.name);
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "TLS support not compiled in").into())
    }

    #[cfg(feature = "tls-native")]
    async fn new_secured(config: &ServerConfig, domain: &str, stream: TcpStream) -> error::Result<Connection> {
        let mut builder = tokio_native_tls::native_tls::TlsConnector::builder();

        if let Some(cert_path) = config.cert_path() {
            let mut file = File::open(cert_path)?;
            let mut cert_data = vec![];
            file.read_to_end(&mut cert_data)?;
            let cert = Certificate::from_der(&cert_data)?;
            builder.add_root_certificate(cert);
            info!("Added {} to trusted certificates.", cert_path);
        }

        if let Some(client_cert_path) = config.client_cert_path() {
            let client_cert_pass = config.client_cert_pass();
            let mut file = File::open(client_cert_path)?;
            let mut client_cert_data = vec![];
            file.read_to_end(&mut client_cert_data)?;
            let pkcs12_archive = Identity::from_pkcs12(&client_cert_data, client_cert_pass)?;
            builder.identity(pkcs12_archive);
            info!("Using {} for client certificate authentication.", client_cert_path);
        }

        if !config.tls_verify() {
            warn!("[{}] server certificate is not checked", config.name);
            builder.danger_accept_invalid_certs(true);
        }

        let connector: TlsConnector = builder.build()?.into();
        let stream = connector.connect(domain, stream).await?;
        info!("[{}] TLS session established with {}", config.name, domain);
        Ok(Connection::Secured(Transport::new(stream, config.encoding())?))
    }

    #[cfg(all(feature = "tls-rust", not(feature = "tls-native")))]
    async fn new_secured(config: &ServerConfig, domain: &str, stream: TcpStream) -> error::Result<Connection> {
        struct DangerousAcceptAllVerifier;

        impl ServerCertVerifier for DangerousAcceptAllVerifier {
            fn verify_server_cert(
                &self,
                _: &RootCertStore,
                _: &[tokio_rustls::rustls::Certificate],
                _: DNSNameRef,
                _: &[u8],
            ) -> Result<ServerCertVerified, TLSError> {
                Ok(ServerCertVerified::assertion())
            }
        }

        let mut builder = ClientConfig::default();
        builder
            .root_store
            .add_server_trust_anchors(&webpki_roots::TLS_SERVER_ROOTS);

        if let Some(cert_path) = config.cert_path() {
            let file = File::open(cert_path)?;
            let mut reader = BufReader::new(file);
            let (added, _) = builder
                .root_store
                .add_pem_file(&mut reader)
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid certificate"))?;
            info!("Added {} certificate(s) from {} to trusted certificates.", added, cert_path);
        }

        if let Some(client_cert_path) = config.client_cert_path() {
            let file = File::open(client_cert_path)?;
            let chain = certs(&mut BufReader::new(file))
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid client certificate"))?;
            warn!(
                "[{}] {} client certificate(s) in {} ignored: client certificates need tls-native",
                config.name,
                chain.len(),
                client_cert_path
            );
        }

        if !config.tls_verify() {
            warn!("[{}] server certificate is not checked", config.name);
            builder
                .dangerous()
                .set_certificate_verifier(Arc::new(DangerousAcceptAllVerifier));
        }

        let connector = TlsConnector::from(Arc::new(builder));
        let dns_name = DNSNameRef::try_from_ascii_str(domain)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid server name"))?;
        let stream = connector.connect(dns_name, stream).await?;
        info!("[{}] TLS session established with {}", config.name, domain);
        Ok(Connection::Secured(Transport::new(stream, config.encoding())?))
    }

    #[cfg(feature = "proxy")]
    async fn new_stream(config: &ServerConfig, address: &str, port: u16, ipv6: bool) -> error::Result<TcpStream> {
        match config.proxy_type() {
            ProxyType::None => Self::direct(config, address, port, ipv6).await,
            ProxyType::Socks5 => {
                let proxy_server = format!("{}:{}", config.proxy_server(), config.proxy_port());
                let target_server = format!("{}:{}", address, port);
                info!("[{}] connecting to {} through {}", config.name, target_server, proxy_server);
                let username = config.proxy_username();
                let stream = if username.is_empty() {
                    Socks5Stream::connect(proxy_server.as_str(), target_server.as_str()).await?
                } else {
                    let password = config.proxy_password();
                    Socks5Stream::connect_with_password(proxy_server.as_str(), target_server.as_str(), username, password)
                        .await?
                };
                Ok(stream.into_inner())
            }
        }
    }

    #[cfg(not(feature = "proxy"))]
    async fn new_stream(config: &ServerConfig, address: &str, port: u16, ipv6: bool) -> error::Result<TcpStream> {
        Self::direct(config, address, port, ipv6).await
    }

    // Tries every resolved address in turn, IPv4 only unless IPv6 is allowed.
    async fn direct(config: &ServerConfig, address: &str, port: u16, ipv6: bool) -> error::Result<TcpStream> {
        let mut last_error = None;
        for addr in lookup_host((address, port)).await?.filter(|a| ipv6 || a.is_ipv4()) {
            debug!("[{}] trying {}", config.name, addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no usable address"))
            .into())
    }

    /// Gets a view of the lines carried by a mock connection. Otherwise, this will always return
    /// `None`.
    pub fn log_view(&self) -> Option<LogView> {
        match *self {
            Connection::Mock(ref inner) => Some(inner.view()),
            _ => None,
        }
    }
}

impl Stream for Connection {
    type Item = error::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.project() {
            ConnectionProj::Unsecured(inner) => inner.poll_next(cx),
            #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
            ConnectionProj::Secured(inner) => inner.poll_next(cx),
            ConnectionProj::Mock(inner) => inner.poll_next(cx),
        }
    }
}

impl Sink<String> for Connection {
    type Error = error::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.project() {
            ConnectionProj::Unsecured(inner) => inner.poll_ready(cx),
            #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
            ConnectionProj::Secured(inner) => inner.poll_ready(cx),
            ConnectionProj::Mock(inner) => inner.poll_ready(cx),
        }
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        match self.project() {
            ConnectionProj::Unsecured(inner) => inner.start_send(item),
            #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
            ConnectionProj::Secured(inner) => inner.start_send(item),
            ConnectionProj::Mock(inner) => inner.start_send(item),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.project() {
            ConnectionProj::Unsecured(inner) => inner.poll_flush(cx),
            #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
            ConnectionProj::Secured(inner) => inner.poll_flush(cx),
            ConnectionProj::Mock(inner) => inner.poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.project() {
            ConnectionProj::Unsecured(inner) => inner.poll_close(cx),
            #[cfg(any(feature = "tls-native", feature = "tls-rust"))]
            ConnectionProj::Secured(inner) => inner.poll_close(cx),
            ConnectionProj::Mock(inner) => inner.poll_close(cx),
        }
    }
}
