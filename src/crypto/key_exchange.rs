/*!
Ephemeral key agreement for the secure session handshake.

Every handshake generates a fresh X25519 key pair on each side. The private
halves live in zeroizing containers and are dropped as soon as the session
keys have been derived.
*/

use crate::{
    constants::sizes,
    error::{Error, Result},
};

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// X25519 key pair generated for a single handshake
pub struct EphemeralKeyPair {
    secret: Zeroizing<StaticSecret>,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Public half as sent on the wire
    pub fn public_bytes(&self) -> [u8; sizes::x25519::PUBLIC_KEY_BYTES] {
        self.public.to_bytes()
    }

    #[cfg(test)]
    pub(crate) fn from_private(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = X25519PublicKey::from(&secret);
        Self {
            secret: Zeroizing::new(secret),
            public,
        }
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public.as_bytes())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Output of the Diffie-Hellman step, wiped on drop
pub struct SharedSecret(Zeroizing<[u8; sizes::x25519::SHARED_SECRET_BYTES]>);

impl SharedSecret {
    /// Raw shared secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

/// KeyExchange handles the X25519 key agreement
pub struct KeyExchange;

impl KeyExchange {
    /// Generate a new ephemeral key pair
    pub fn generate_ephemeral() -> EphemeralKeyPair {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        EphemeralKeyPair {
            secret: Zeroizing::new(secret),
            public,
        }
    }

    /// Parse a peer's ephemeral public key
    pub fn parse_public_key(bytes: &[u8]) -> Result<[u8; sizes::x25519::PUBLIC_KEY_BYTES]> {
        bytes.try_into().map_err(|_| Error::InvalidKey)
    }

    /// Compute the shared secret with a peer's ephemeral public key.
    ///
    /// Low-order peer keys produce a non-contributory result and are rejected
    /// with `InvalidKey`.
    pub fn derive_shared_secret(
        local: &EphemeralKeyPair,
        remote_public: &[u8],
    ) -> Result<SharedSecret> {
        let remote = X25519PublicKey::from(Self::parse_public_key(remote_public)?);
        let shared = local.secret.diffie_hellman(&remote);

        if !shared.was_contributory() {
            return Err(Error::InvalidKey);
        }

        Ok(SharedSecret(Zeroizing::new(shared.to_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x25519_key_exchange() {
        let alice = KeyExchange::generate_ephemeral();
        let bob = KeyExchange::generate_ephemeral();

        let alice_shared = KeyExchange::derive_shared_secret(&alice, &bob.public_bytes()).unwrap();
        let bob_shared = KeyExchange::derive_shared_secret(&bob, &alice.public_bytes()).unwrap();

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_rfc7748_vector() {
        let alice_private: [u8; 32] = [
            0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
            0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
            0x1d, 0xb9, 0x2c, 0x2a,
        ];
        let bob_public: [u8; 32] = [
            0xde, 0x9e, 0xdb, 0x7d, 0x7b, 0x7d, 0xc1, 0xb4, 0xd3, 0x5b, 0x61, 0xc2, 0xec, 0xe4,
            0x35, 0x37, 0x3f, 0x83, 0x43, 0xc8, 0x5b, 0x78, 0x67, 0x4d, 0xad, 0xfc, 0x7e, 0x14,
            0x6f, 0x88, 0x2b, 0x4f,
        ];
        let expected: [u8; 32] = [
            0x4a, 0x5d, 0x9d, 0x5b, 0xa4, 0xce, 0x2d, 0xe1, 0x72, 0x8e, 0x3b, 0xf4, 0x80, 0x35,
            0x0f, 0x25, 0xe0, 0x7e, 0x21, 0xc9, 0x47, 0xd1, 0x9e, 0x33, 0x76, 0xf0, 0x9b, 0x3c,
            0x1e, 0x16, 0x17, 0x42,
        ];

        let alice = EphemeralKeyPair::from_private(alice_private);
        let shared = KeyExchange::derive_shared_secret(&alice, &bob_public).unwrap();
        assert_eq!(shared.as_bytes(), &expected[..]);
    }

    #[test]
    fn test_low_order_key_rejected() {
        let alice = KeyExchange::generate_ephemeral();
        let result = KeyExchange::derive_shared_secret(&alice, &[0u8; 32]);
        assert!(matches!(result, Err(Error::InvalidKey)));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let alice = KeyExchange::generate_ephemeral();
        let result = KeyExchange::derive_shared_secret(&alice, &[9u8; 31]);
        assert!(matches!(result, Err(Error::InvalidKey)));
    }
}
