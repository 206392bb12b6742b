//! Gateway - TCP/TLS listener that accepts WebSocket clients.
//!
//! The Gateway binds to sockets, performs the WebSocket upgrade (capturing
//! the user id from the request URI), and spawns a Connection task for each
//! client. Supports both plaintext (`ws`) and TLS (`wss`) listeners.

use crate::config::TlsConfig;
use crate::network::connection::{Connection, ConnectionSettings};
use crate::session::SessionManager;
use crate::telemetry::spans;
use http::{StatusCode, Uri};
use rustls_pemfile::{certs, private_key};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::pki_types::CertificateDer;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{Instrument, error, info, instrument, warn};

/// The Gateway accepts incoming TCP/TLS connections and spawns handlers.
pub struct Gateway {
    plaintext_listener: TcpListener,
    tls_listener: Option<(TcpListener, TlsAcceptor)>,
    manager: Arc<SessionManager>,
    settings: ConnectionSettings,
}

impl Gateway {
    /// Bind the gateway to the specified addresses.
    pub async fn bind(
        addr: SocketAddr,
        tls_config: Option<TlsConfig>,
        manager: Arc<SessionManager>,
        settings: ConnectionSettings,
    ) -> anyhow::Result<Self> {
        let plaintext_listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");

        let tls_listener = if let Some(tls_cfg) = tls_config {
            let tls_acceptor = Self::load_tls(&tls_cfg)?;
            let listener = TcpListener::bind(tls_cfg.address).await?;
            info!(address = %tls_cfg.address, "Secure WebSocket listener bound");
            Some((listener, tls_acceptor))
        } else {
            None
        };

        Ok(Self {
            plaintext_listener,
            tls_listener,
            manager,
            settings,
        })
    }

    /// Load TLS certificates and create TlsAcceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let Some(key) = private_key(key_reader)? else {
            anyhow::bail!("No private keys found in {}", config.key_path);
        };

        // Explicit provider: more than one rustls backend may be compiled in.
        let tls_config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Address of the plaintext listener.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.plaintext_listener.local_addr()
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        if let Some((tls_listener, tls_acceptor)) = self.tls_listener {
            let manager = Arc::clone(&self.manager);
            let settings = self.settings;

            tokio::spawn(
                async move {
                    loop {
                        match tls_listener.accept().await {
                            Ok((stream, addr)) => {
                                let manager = Arc::clone(&manager);
                                let acceptor = tls_acceptor.clone();

                                tokio::spawn(
                                    async move {
                                        match acceptor.accept(stream).await {
                                            Ok(tls_stream) => {
                                                serve(tls_stream, addr, manager, settings).await
                                            }
                                            Err(e) => warn!(error = %e, "TLS handshake failed"),
                                        }
                                    }
                                    .instrument(spans::connection(&addr.to_string(), true)),
                                );
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to accept TLS connection");
                            }
                        }
                    }
                }
                .in_current_span(),
            );
        }

        loop {
            match self.plaintext_listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%addr, error = %e, "Failed to set TCP_NODELAY");
                    }
                    let manager = Arc::clone(&self.manager);
                    let settings = self.settings;
                    tokio::spawn(
                        serve::<TcpStream>(stream, addr, manager, settings)
                            .instrument(spans::connection(&addr.to_string(), false)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Upgrade a stream to WebSocket and run its connection.
async fn serve<S>(
    stream: S,
    addr: SocketAddr,
    manager: Arc<SessionManager>,
    settings: ConnectionSettings,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut user_id = None;
    let capture = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match extract_user_id(req.uri()) {
            Some(id) => {
                user_id = Some(id);
                Ok(response)
            }
            None => {
                let mut rejection = ErrorResponse::new(Some(
                    "expected /ws/{userId} or /ws?userId=".to_string(),
                ));
                *rejection.status_mut() = StatusCode::BAD_REQUEST;
                Err(rejection)
            }
        }
    };

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(settings.max_message_bytes);
    ws_config.max_frame_size = Some(settings.max_message_bytes);

    let ws = match accept_hdr_async_with_config(stream, capture, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let Some(user_id) = user_id else {
        return;
    };

    info!(%addr, user_id = %user_id, "WebSocket handshake successful");
    let connection = Connection::new(user_id, addr, ws, manager, settings);
    if let Err(e) = connection.run().await {
        error!(%addr, error = %e, "Connection error");
    }
    info!(%addr, "Connection closed");
}

/// Pull the user id out of `/ws/{userId}` or `/ws?userId=...`.
///
/// The identifier is taken verbatim; it is an opaque key into the directory.
fn extract_user_id(uri: &Uri) -> Option<String> {
    let path = uri.path().trim_end_matches('/');

    if let Some(id) = path.strip_prefix("/ws/") {
        return (!id.is_empty() && !id.contains('/')).then(|| id.to_string());
    }
    if path != "/ws" {
        return None;
    }

    uri.query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("userId="))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
