//! Client half of the protocol.

use std::path::Path;

use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::chords::ChordEvent;
use crate::protocol::message::{SigninRequest, SignupRequest, PROCESS_AUDIO_FAILED};
use crate::protocol::{
    initiate_handshake, Command, FramedChannel, MessageType, ProtocolError, ProtocolResult,
    SessionCipher, DEFAULT_MAX_FRAME_LEN,
};

/// An authenticated-channel connection to a chord server.
pub struct ChordClient {
    channel: FramedChannel<TcpStream>,
    cipher: SessionCipher,
}

impl ChordClient {
    /// Connects and runs the key exchange.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let mut channel = FramedChannel::new(stream, DEFAULT_MAX_FRAME_LEN);
        let cipher = initiate_handshake(&mut channel).await?;
        debug!("Connected, session key established");
        Ok(Self { channel, cipher })
    }

    pub async fn send_telemetry(&mut self, action: &str) -> ProtocolResult<()> {
        self.send_command(&Command::Telemetry(action.to_string())).await
    }

    pub async fn sign_up(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
        favorite_animal: &str,
    ) -> ProtocolResult<String> {
        self.send_command(&Command::Signup(SignupRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            favorite_animal: favorite_animal.to_string(),
        }))
        .await?;
        self.read_response().await
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> ProtocolResult<String> {
        self.send_command(&Command::Signin(SigninRequest {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await?;
        self.read_response().await
    }

    pub async fn set_tempo(&mut self, bpm: u32) -> ProtocolResult<()> {
        self.send_command(&Command::SetTempo(bpm)).await
    }

    pub async fn open_file(&mut self, path: &Path) -> ProtocolResult<()> {
        self.send_command(&Command::OpenFile(path.to_path_buf()))
            .await
    }

    /// Asks the server to analyze the selected file and waits for the timeline.
    ///
    /// An empty list means there was nothing to analyze. A track whose every segment
    /// failed is reported as [`ProtocolError::AnalysisFailed`].
    pub async fn process_audio(&mut self) -> ProtocolResult<Vec<ChordEvent>> {
        self.send_command(&Command::ProcessAudio).await?;
        let response = self.read_response().await?;
        if response == PROCESS_AUDIO_FAILED {
            return Err(ProtocolError::AnalysisFailed(response));
        }
        serde_json::from_str(&response).map_err(|e| {
            ProtocolError::MalformedResponse(format!("invalid chord timeline: {}", e))
        })
    }

    /// Sends terminate and closes the connection.
    pub async fn terminate(mut self) -> ProtocolResult<()> {
        self.send_command(&Command::Terminate).await?;
        self.channel.shutdown().await
    }

    /// Sends an arbitrary type and text, for exercising the server with unexpected input.
    pub async fn send_raw(&mut self, message_type: u32, text: &str) -> ProtocolResult<()> {
        let sealed = self.cipher.seal(text.as_bytes())?;
        self.channel.write_message(message_type, &sealed).await
    }

    /// Reads and decrypts one response frame.
    pub async fn read_response(&mut self) -> ProtocolResult<String> {
        let frame = self.channel.read_frame().await?;
        self.cipher.open_text(&frame)
    }

    async fn send_command(&mut self, command: &Command) -> ProtocolResult<()> {
        let message_type: MessageType = command.message_type();
        self.send_raw(message_type.code(), &command.to_payload())
            .await
    }
}
