/*!
Secure Session: a mutually authenticated, forward-secure channel.

Two parties holding long-term Ed25519 keys run a four-frame handshake
(ConnectRequest, ConnectReply, KeyProposal, KeyConfirmation) over ephemeral
X25519 keys, then exchange Data frames sealed under per-direction keys.

```
use secure_protocol::{KeyPair, SecureSession, Unwrapped};
use std::collections::HashMap;

let alice_keys = KeyPair::generate();
let bob_keys = KeyPair::generate();

let mut alice_peers = HashMap::new();
alice_peers.insert(b"bob".to_vec(), bob_keys.public_key());
let mut bob_peers = HashMap::new();
bob_peers.insert(b"alice".to_vec(), alice_keys.public_key());

let mut alice = SecureSession::new("alice", alice_keys, alice_peers)?;
let mut bob = SecureSession::new("bob", bob_keys, bob_peers)?;

let mut to_bob = alice.connect_request()?;
loop {
    let to_alice = match bob.unwrap(&to_bob)? {
        Unwrapped::Reply(frame) => frame,
        _ => break,
    };
    match alice.unwrap(&to_alice)? {
        Unwrapped::Reply(frame) => to_bob = frame,
        _ => break,
    }
}
assert!(alice.is_established() && bob.is_established());

let frame = alice.wrap(b"hello")?;
assert_eq!(bob.unwrap(&frame)?, Unwrapped::Data(b"hello".to_vec()));
# Ok::<(), secure_protocol::Error>(())
```
*/

pub mod engine;
pub(crate) mod handshake;
pub mod resolver;
pub mod state;

// Re-export commonly used items
pub use engine::{SecureSession, StateObserver, Unwrapped};
pub use resolver::{FnResolver, PeerKeyResolver, resolver_fn};
pub use state::{Role, SessionState, StateManager};
