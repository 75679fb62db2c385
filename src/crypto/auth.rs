/*!
Long-term identity keys and signatures.

Parties authenticate the handshake with Ed25519 signatures over the
ephemeral keys and identities. The private half of a `KeyPair` never
leaves this module in serialized form.
*/

use crate::{
    constants::sizes,
    error::{Error, Result},
};

use ed25519_dalek::{
    Signature as Ed25519Signature, Signer, SigningKey, VerifyingKey,
};
use rand::{RngCore, rngs::OsRng};
use std::fmt;
use zeroize::Zeroizing;

/// Long-term Ed25519 key pair of a party
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; sizes::ed25519::SECRET_KEY_BYTES]);
        OsRng.fill_bytes(&mut seed[..]);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Build a key pair from a 32-byte private seed
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: Zeroizing<[u8; sizes::ed25519::SECRET_KEY_BYTES]> =
            Zeroizing::new(bytes.try_into().map_err(|_| Error::InvalidKey)?);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Public half of this key pair
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Long-term Ed25519 public key of a party
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse a public key, rejecting encodings that are not curve points
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: &[u8; sizes::ed25519::PUBLIC_KEY_BYTES] =
            bytes.try_into().map_err(|_| Error::InvalidKey)?;
        VerifyingKey::from_bytes(raw)
            .map(PublicKey)
            .map_err(|_| Error::InvalidKey)
    }

    /// Encoded public key
    pub fn to_bytes(&self) -> [u8; sizes::ed25519::PUBLIC_KEY_BYTES] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(self.0.as_bytes()).finish()
    }
}

/// Detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; sizes::ed25519::SIGNATURE_BYTES]);

impl Signature {
    /// Signature bytes as sent on the wire
    pub fn to_bytes(&self) -> [u8; sizes::ed25519::SIGNATURE_BYTES] {
        self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Authentication handler for digital signatures
pub struct Authentication;

impl Authentication {
    /// Sign a message with a long-term key
    pub fn sign(key_pair: &KeyPair, message: &[u8]) -> Signature {
        Signature(key_pair.signing_key.sign(message).to_bytes())
    }

    /// Verify a detached signature.
    ///
    /// Malformed and mismatching signatures both yield `VerificationFailed`.
    pub fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature =
            Ed25519Signature::from_slice(signature).map_err(|_| Error::VerificationFailed)?;
        public_key
            .0
            .verify_strict(message, &signature)
            .map_err(|_| Error::VerificationFailed)
    }
}
