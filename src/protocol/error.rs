use thiserror::Error;

/// Failures of the wire layer. Every variant is fatal to the connection it happened on.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server could not analyze the audio: {0}")]
    AnalysisFailed(String),
}

impl ProtocolError {
    /// True when the peer simply went away, as opposed to misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::ConnectionClosed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
