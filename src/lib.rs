/*!
# Secure Protocol

Message-driven engines for two secure communication primitives:

- **Secure Session**: a mutually authenticated, forward-secure handshake
  between two parties holding long-term Ed25519 keys, followed by a
  wrap/unwrap transport under the negotiated keys.
- **Secure Comparator**: a zero-knowledge comparison that tells two parties
  whether they hold the same secret and nothing more.

## Overview

- X25519 ephemeral key agreement with Ed25519 signatures
- HKDF-SHA256 key schedule and HMAC-SHA256 key confirmation
- ChaCha20-Poly1305 sealed frames with replay detection
- Socialist Millionaires' Protocol over Ristretto255 with Schnorr proofs
- Key material wiped on drop via `zeroize`

Neither engine performs I/O. Callers feed inbound frames and deliver the
frames the engines produce over any transport.
*/

pub mod error;
pub mod constants;
pub mod types;
pub mod config;
pub mod security;
pub mod crypto;
pub mod header;
pub mod frame;
pub mod session;
pub mod comparator;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use constants::{VERSION, sizes};
pub use types::MessageType;
pub use config::{ComparatorConfig, SessionConfig};
pub use crypto::{KeyPair, PublicKey};
pub use header::FrameHeader;
pub use frame::{Frame, FrameKey, FrameOpener, FrameSealer};
pub use session::{
    PeerKeyResolver, Role, SecureSession, SessionState, StateObserver, Unwrapped, resolver_fn,
};
pub use comparator::{ComparatorState, SecureComparator};
