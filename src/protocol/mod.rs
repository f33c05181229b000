//! Wire protocol: framing, handshake, session encryption and the command set.

pub mod cipher;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod message;

pub use cipher::{SessionCipher, SessionKey};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FramedChannel, RawMessage, DEFAULT_MAX_FRAME_LEN};
pub use handshake::{accept_handshake, initiate_handshake, ServerKeyPair, DEFAULT_RSA_KEY_BITS};
pub use message::{AuthOutcome, Command, CommandError, MessageType};
