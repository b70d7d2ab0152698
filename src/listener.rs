//! Relay listener
//!
//! Accepts TCP connections, optionally terminates TLS, and spawns a
//! connection handler per peer. All handlers share one Registry.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::config::{RelayConfig, REGISTRY_BUFFER_SIZE};
use crate::error::Result;
use crate::handler::{handle_connection, ConnectionOptions};
use crate::registry::{Registry, RegistryHandle};
use crate::tls;

/// A bound relay, ready to accept connections
pub struct RelayServer {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    registry: RegistryHandle,
    options: ConnectionOptions,
}

impl RelayServer {
    /// Validate the configuration, load TLS material, bind the socket and
    /// start the Registry
    ///
    /// Every failure here is a startup failure; nothing is left running.
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        let allocator = config.allocator()?;
        let tls = config.tls.as_ref().map(tls::load_acceptor).transpose()?;

        let listener = TcpListener::bind(config.bind_addr()).await?;
        let (registry, _) = Registry::new(allocator).spawn(REGISTRY_BUFFER_SIZE);

        Ok(Self {
            listener,
            tls,
            registry,
            options: ConnectionOptions::from(config),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the Registry serving this listener
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Accept connections until the process exits
    pub async fn run(self) -> Result<()> {
        self.log_listening();
        self.accept_loop().await
    }

    /// Accept connections until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.log_listening();
        tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    fn log_listening(&self) {
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        match self.listener.local_addr() {
            Ok(addr) => info!("Relay listening on {}://{}{}", scheme, addr, self.options.path),
            Err(e) => warn!("Relay listening, local address unknown: {}", e),
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    self.spawn_connection(stream, addr);
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let options = self.options.clone();
        let tls = self.tls.clone();

        tokio::spawn(async move {
            let peer = addr.to_string();
            let result = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => handle_connection(stream, peer, registry, options).await,
                    Err(e) => {
                        warn!("TLS handshake with {} failed: {}", addr, e);
                        return;
                    }
                },
                None => handle_connection(stream, peer, registry, options).await,
            };

            if let Err(e) = result {
                warn!("Connection from {} ended with error: {}", addr, e);
            }
        });
    }
}
