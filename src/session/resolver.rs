/*!
Peer public key lookup.

The session engine does not store peer keys. Whenever a handshake frame
names a peer identity, the engine asks the resolver it was built with for
that peer's long-term public key.
*/

use crate::crypto::PublicKey;
use std::{collections::HashMap, sync::Arc};

/// Maps a peer identity to its long-term public key.
///
/// Called synchronously from `unwrap`. Implementations shared between
/// engines must tolerate concurrent calls.
pub trait PeerKeyResolver {
    /// Return the public key for `identity`, or `None` if the peer is unknown
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey>;
}

/// Resolver backed by a closure
pub struct FnResolver<F>(F);

/// Build a resolver from a closure
pub fn resolver_fn<F>(f: F) -> FnResolver<F>
where
    F: Fn(&[u8]) -> Option<PublicKey>,
{
    FnResolver(f)
}

impl<F> PeerKeyResolver for FnResolver<F>
where
    F: Fn(&[u8]) -> Option<PublicKey>,
{
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey> {
        (self.0)(identity)
    }
}

impl PeerKeyResolver for HashMap<Vec<u8>, PublicKey> {
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey> {
        self.get(identity).copied()
    }
}

impl<T: PeerKeyResolver + ?Sized> PeerKeyResolver for &T {
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey> {
        (**self).resolve(identity)
    }
}

impl<T: PeerKeyResolver + ?Sized> PeerKeyResolver for Arc<T> {
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey> {
        (**self).resolve(identity)
    }
}

impl<T: PeerKeyResolver + ?Sized> PeerKeyResolver for Box<T> {
    fn resolve(&self, identity: &[u8]) -> Option<PublicKey> {
        (**self).resolve(identity)
    }
}
