/*!
Constants for the secure protocol engines.

This module contains the wire version, frame and key sizes, and the
domain-separation labels fed into every key derivation and proof.
*/

/// Protocol version
pub const VERSION: u8 = 0x01;

/// Default upper bound for a single frame payload (64KB)
pub const DEFAULT_MAX_PAYLOAD: usize = 65536;

/// Size constants for the protocol
pub mod sizes {
    /// Size of the frame header in bytes
    pub const HEADER_SIZE: usize = 10;

    /// X25519 constants
    pub mod x25519 {
        /// Size of an X25519 public key in bytes
        pub const PUBLIC_KEY_BYTES: usize = 32;

        /// Size of an X25519 shared secret in bytes
        pub const SHARED_SECRET_BYTES: usize = 32;
    }

    /// Ed25519 constants
    pub mod ed25519 {
        /// Size of an Ed25519 public key in bytes
        pub const PUBLIC_KEY_BYTES: usize = 32;

        /// Size of an Ed25519 private key in bytes
        pub const SECRET_KEY_BYTES: usize = 32;

        /// Size of an Ed25519 signature in bytes
        pub const SIGNATURE_BYTES: usize = 64;
    }

    /// ChaCha20-Poly1305 constants
    pub mod chacha {
        /// Size of ChaCha20-Poly1305 authentication tag in bytes
        pub const TAG_SIZE: usize = 16;

        /// Size of ChaCha20-Poly1305 nonce in bytes
        pub const NONCE_SIZE: usize = 12;

        /// Size of ChaCha20-Poly1305 key in bytes
        pub const KEY_SIZE: usize = 32;
    }

    /// Size of an HMAC-SHA256 key confirmation tag
    pub const MAC_SIZE: usize = 32;

    /// Size of an encoded Ristretto255 element or scalar
    pub const GROUP_ELEMENT_SIZE: usize = 32;
}

/// Domain-separation labels for key derivation, frame keys and hashing
pub mod labels {
    /// Session identifier derivation
    pub const SESSION_ID: &[u8] = b"secure session unique identifier";

    /// Master key derivation
    pub const MASTER_KEY: &[u8] = b"secure session master key";

    /// Key used by the initiator to send (and the responder to receive)
    pub const INITIATOR_KEY: &[u8] = b"secure session initiator key";

    /// Key used by the responder to send (and the initiator to receive)
    pub const RESPONDER_KEY: &[u8] = b"secure session responder key";

    /// Initial sequence number of the initiator direction
    pub const INITIATOR_SEQUENCE: &[u8] = b"secure session initiator initial sequence number";

    /// Initial sequence number of the responder direction
    pub const RESPONDER_SEQUENCE: &[u8] = b"secure session responder initial sequence number";

    /// Public key for handshake frames
    pub const HANDSHAKE_FRAME_KEY: &[u8] = b"secure session handshake frame";

    /// Public key for comparator frames
    pub const COMPARATOR_FRAME_KEY: &[u8] = b"secure comparator frame";

    /// Hash prefix for the comparator secret
    pub const COMPARATOR_SECRET: &[u8] = b"secure comparator secret";
}
