//! TCP server accepting connections for the configured protocol.
//!
//! Every accepted connection is handed to its own Tokio task, so a slow or
//! idle peer never holds up the accept loop or any other connection.

use crate::config::{Config, ConnectionLimits, ProtocolType};
use crate::protocols::{echo, prime};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, debug_span, error, info, Instrument};

/// Listen backlog passed to `listen(2)`.
const BACKLOG: i32 = 1024;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    protocol: ProtocolType,
    limits: ConnectionLimits,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let addr = config.listen;
        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(address = %addr, protocol = ?config.protocol, "Server listening");

        Ok(Server {
            listener,
            protocol: config.protocol,
            limits: config.connection_limits(),
        })
    }

    /// Address the listener is bound to.
    #[cfg(test)]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    ///
    /// Failed accepts are logged and the loop continues.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        debug!(peer = %peer, "New connection");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let protocol = self.protocol;
        let limits = self.limits;
        let span = debug_span!("conn", peer = %peer);

        tokio::spawn(
            async move {
                let result = match protocol {
                    ProtocolType::Echo => echo::handle_connection(stream, limits).await,
                    ProtocolType::Prime => prime::handle_connection(stream, limits).await,
                };

                match result {
                    Ok(()) => debug!("Connection closed"),
                    Err(e) => debug!(error = %e, "Connection error"),
                }
            }
            .instrument(span),
        );
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
