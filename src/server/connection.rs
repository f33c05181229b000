use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::protocol::{accept_handshake, FramedChannel, ProtocolError, ServerKeyPair};

use super::dispatcher::{dispatch, Flow};
use super::session::ConnectionSession;
use super::state::ServerState;

/// Serves one accepted connection from handshake to close.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, state: ServerState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match serve(stream, &state).await {
        Ok(()) => info!("Connection from {} closed", peer),
        Err(err) if is_disconnect(&err) => info!("Client {} disconnected", peer),
        Err(err) => error!("Connection from {} failed: {:#}", peer, err),
    }
}

fn is_disconnect(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ProtocolError>()
        .map(ProtocolError::is_disconnect)
        .unwrap_or(false)
}

async fn serve<S>(stream: S, state: &ServerState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut channel = FramedChannel::new(stream, state.config.max_frame_len);

    let bits = state.config.rsa_key_bits;
    let keypair = tokio::task::spawn_blocking(move || ServerKeyPair::generate(bits)).await??;
    let cipher = accept_handshake(&mut channel, &keypair).await?;
    drop(keypair);
    debug!("Handshake complete");

    let mut session = ConnectionSession::new(cipher);
    loop {
        let message = channel.read_message().await?;
        if dispatch(state, &mut session, &mut channel, message).await? == Flow::Close {
            break;
        }
    }

    if let Err(err) = channel.shutdown().await {
        debug!("Shutdown after terminate failed: {}", err);
    }
    Ok(())
}
