//! Symmetric session encryption.
//!
//! AES-256 in full-block CFB mode with a fresh random IV per message. Sealed blobs are
//! `iv (16 bytes) || ciphertext`. There is no authentication tag: the wire format has
//! none, so tampering with a frame is not detected at this layer.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;

use super::error::{ProtocolError, ProtocolResult};

type Aes256CfbEnc = cfb_mode::Encryptor<aes::Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<aes::Aes256>;

pub const SESSION_KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

/// The 256-bit key negotiated during the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        let bytes: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|_| {
            ProtocolError::Handshake(format!(
                "session key must be {} bytes, got {}",
                SESSION_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Seals and opens payloads for one connection.
#[derive(Clone, Debug)]
pub struct SessionCipher {
    key: SessionKey,
}

impl SessionCipher {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    pub fn seal(&self, plaintext: &[u8]) -> ProtocolResult<Vec<u8>> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let mut buf = plaintext.to_vec();
        Aes256CfbEnc::new_from_slices(self.key.as_bytes(), &iv)
            .map_err(|e| ProtocolError::Crypto(e.to_string()))?
            .encrypt(&mut buf);

        let mut sealed = Vec::with_capacity(IV_LEN + buf.len());
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&buf);
        Ok(sealed)
    }

    pub fn open(&self, blob: &[u8]) -> ProtocolResult<Vec<u8>> {
        if blob.len() < IV_LEN {
            return Err(ProtocolError::Crypto(format!(
                "sealed payload of {} bytes is shorter than the IV",
                blob.len()
            )));
        }
        let (iv, ciphertext) = blob.split_at(IV_LEN);

        let mut buf = ciphertext.to_vec();
        Aes256CfbDec::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|e| ProtocolError::Crypto(e.to_string()))?
            .decrypt(&mut buf);
        Ok(buf)
    }

    pub fn open_text(&self, blob: &[u8]) -> ProtocolResult<String> {
        Ok(String::from_utf8(self.open(blob)?)?)
    }
}
