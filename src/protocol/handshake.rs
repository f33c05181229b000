//! RSA key exchange that establishes the session key.
//!
//! 1. server -> client: length-prefixed PEM (SubjectPublicKeyInfo) public key
//! 2. client -> server: length-prefixed RSA-OAEP(SHA-256) encryption of a 32-byte AES key

use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::cipher::{SessionCipher, SessionKey};
use super::error::{ProtocolError, ProtocolResult};
use super::framing::FramedChannel;

pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// OAEP with SHA-256 needs at least 2 * 32 + 2 bytes of overhead on top of the
/// 32-byte payload, 1024 bits leaves room for that.
pub const MIN_RSA_KEY_BITS: usize = 1024;

pub const MAX_RSA_KEY_BITS: usize = 8192;

/// Wrapped keys are exactly one RSA block.
const MAX_WRAPPED_KEY_LEN: usize = MAX_RSA_KEY_BITS / 8;

/// Connection-scoped RSA keypair.
pub struct ServerKeyPair {
    private_key: RsaPrivateKey,
    public_key_pem: String,
}

impl ServerKeyPair {
    /// Generates a fresh keypair with public exponent 65537. CPU heavy, keep it off
    /// the async reactor.
    pub fn generate(bits: usize) -> ProtocolResult<Self> {
        if !(MIN_RSA_KEY_BITS..=MAX_RSA_KEY_BITS).contains(&bits) {
            return Err(ProtocolError::Crypto(format!(
                "RSA key size {} is outside {}..={}",
                bits, MIN_RSA_KEY_BITS, MAX_RSA_KEY_BITS
            )));
        }
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| ProtocolError::Crypto(e.to_string()))?;
        let public_key_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ProtocolError::Crypto(e.to_string()))?;
        Ok(Self {
            private_key,
            public_key_pem,
        })
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> ProtocolResult<SessionKey> {
        let key = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| ProtocolError::Handshake(format!("could not decrypt session key: {}", e)))?;
        SessionKey::from_slice(&key)
    }
}

/// Client side of step 2: encrypts `key` under the server's PEM public key.
pub fn wrap_session_key(public_key_pem: &str, key: &SessionKey) -> ProtocolResult<Vec<u8>> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| ProtocolError::Handshake(format!("invalid server public key: {}", e)))?;
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| ProtocolError::Crypto(e.to_string()))
}

/// Runs the server half of the handshake and returns the session cipher.
pub async fn accept_handshake<S>(
    channel: &mut FramedChannel<S>,
    keypair: &ServerKeyPair,
) -> ProtocolResult<SessionCipher>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel
        .write_frame(keypair.public_key_pem().as_bytes())
        .await?;

    let len = channel.read_u32().await? as usize;
    if len == 0 || len > MAX_WRAPPED_KEY_LEN {
        return Err(ProtocolError::Handshake(format!(
            "invalid wrapped key length {}",
            len
        )));
    }
    let wrapped = channel.read_exact(len).await?;
    let key = keypair.unwrap_session_key(&wrapped)?;
    debug!("Session key negotiated");
    Ok(SessionCipher::new(key))
}

/// Runs the client half of the handshake with a freshly generated session key.
pub async fn initiate_handshake<S>(channel: &mut FramedChannel<S>) -> ProtocolResult<SessionCipher>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pem_bytes = channel.read_frame().await?;
    let pem = String::from_utf8(pem_bytes)
        .map_err(|_| ProtocolError::Handshake("public key is not valid PEM text".to_string()))?;

    let key = SessionKey::generate();
    let wrapped = wrap_session_key(&pem, &key)?;
    channel.write_frame(&wrapped).await?;
    Ok(SessionCipher::new(key))
}
