/*!
Frame sealing with ChaCha20-Poly1305.

The frame header travels in the clear and is bound to the payload as
associated data. The nonce is built from the sequence number and frame
type, so a key must never seal two frames with the same pair.
*/

use crate::{
    constants::sizes,
    error::{Error, Result},
    types::MessageType,
};

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};

/// Cipher handles symmetric sealing and opening of frame payloads
pub struct Cipher {
    cipher: ChaCha20Poly1305,
}

impl Cipher {
    /// Create a new Cipher with the given key
    pub fn new(key: &[u8; sizes::chacha::KEY_SIZE]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Seal `plaintext`, authenticating `aad` alongside it
    pub fn seal(&self, nonce: &Nonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|_| Error::Crypto("encryption failed".into()))
    }

    /// Open a sealed payload; any tag mismatch is an authentication failure
    pub fn open(&self, nonce: &Nonce, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(nonce, Payload { msg: sealed, aad })
            .map_err(|_| Error::AuthenticationFailed)
    }

    /// Create a nonce from sequence number and frame type
    pub fn create_nonce(seq_num: u32, msg_type: MessageType) -> Nonce {
        let mut nonce = [0u8; sizes::chacha::NONCE_SIZE];

        // First 4 bytes: sequence number
        nonce[0..4].copy_from_slice(&seq_num.to_be_bytes());

        // 5th byte: frame type, remaining bytes stay zero
        nonce[4] = msg_type.as_u8();

        *Nonce::from_slice(&nonce)
    }
}
