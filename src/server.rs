//! TCP server for repeat protocol connections.
//!
//! Accepts incoming connections and runs each one in its own task. Sessions
//! share nothing, so a failing connection never affects the accept loop or
//! any other client.

use std::io;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::protocols::repeat;

/// Server instance
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Failure here is fatal to the caller; binding is not retried.
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        info!(address = %listener.local_addr()?, "Server listening");
        Ok(Server { listener })
    }

    /// Address the listener is actually bound to.
    #[cfg(test)]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    tokio::spawn(async move {
                        repeat::handle_connection(stream).await;
                        debug!(peer = %addr, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Bind to `host:port` and serve until the process exits.
pub async fn start(host: &str, port: u16) -> io::Result<()> {
    Server::bind(host, port).await?.run().await;
    Ok(())
}
