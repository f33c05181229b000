use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

use super::connection::handle_connection;
use super::state::{GuardedLiveConnections, ServerState};

/// Pause before accepting again after a failed accept, such as running out of file
/// descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and runs one task per connection.
pub struct ChordServer {
    listener: TcpListener,
    state: ServerState,
}

impl ChordServer {
    pub async fn bind<A: ToSocketAddrs>(addr: A, state: ServerState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind server socket")?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn live_connections(&self) -> GuardedLiveConnections {
        self.state.live_connections.clone()
    }

    /// Serves until `shutdown` resolves. Connections already accepted keep running.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!("Accepted connection from {}", peer);
                    let guard = self.state.live_connections.enter();
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        handle_connection(stream, peer, state).await;
                    });
                }
                Err(err) => back_off_after_accept_error(&err).await,
            }
        }
    }
}

async fn back_off_after_accept_error(err: &std::io::Error) {
    error!(
        "Failed to accept connection: {}, retrying in {:?}",
        err, ACCEPT_ERROR_BACKOFF
    );
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn run_server<A: ToSocketAddrs>(addr: A, state: ServerState) -> Result<()> {
    let server = ChordServer::bind(addr, state).await?;
    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
}
