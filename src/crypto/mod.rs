/*!
Cryptographic functionality for the protocol engines.

This module provides ephemeral key agreement, long-term signatures,
key derivation and the frame cipher.
*/

pub mod auth;
pub mod cipher;
pub mod kdf;
pub mod key_exchange;

// Re-export commonly used items
pub use auth::{Authentication, KeyPair, PublicKey, Signature};
pub use cipher::Cipher;
pub use key_exchange::{EphemeralKeyPair, KeyExchange, SharedSecret};
