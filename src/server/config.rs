use crate::protocol::{DEFAULT_MAX_FRAME_LEN, DEFAULT_RSA_KEY_BITS};

/// Per-connection protocol settings shared by every handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Size of the RSA keypair generated for each connection's handshake.
    pub rsa_key_bits: usize,
    /// Largest accepted frame payload, in bytes.
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
