/*!
Secure Comparator: zero-knowledge comparison of a shared secret.

Two parties learn whether they hold the same secret and nothing more.

```
use secure_protocol::SecureComparator;

let mut alice = SecureComparator::new(b"correct horse battery staple")?;
let mut bob = SecureComparator::new(b"correct horse")?;
bob.append_secret(b" battery staple")?;

let mut to_bob = alice.begin_compare()?;
while !alice.is_compare_complete() {
    let to_alice = bob.proceed_compare(&to_bob)?.expect("responder always replies");
    match alice.proceed_compare(&to_alice)? {
        Some(frame) => to_bob = frame,
        None => break,
    }
}

assert!(alice.is_match()?);
assert!(bob.is_match()?);
# Ok::<(), secure_protocol::Error>(())
```
*/

pub mod engine;
mod proof;

pub use engine::{ComparatorState, SecureComparator};
