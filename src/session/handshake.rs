/*!
Handshake payloads and the session key schedule.

Handshake frames are sealed under a well-known frame key; everything
that makes them trustworthy is inside the payload:

- ConnectRequest: `id_len (u32) | id | eph (32) | sig (64)`
- ConnectReply: `id_len (u32) | id | eph (32) | sig (64)`
- KeyProposal: `sig (64) | mac (32)`
- KeyConfirmation: `mac (32)`
*/

use crate::{
    constants::{labels, sizes},
    crypto::{SharedSecret, kdf},
    error::Result,
    format_err,
};

use bytes::{Buf, BufMut, BytesMut};

/// Sequence numbers carried by the four handshake frames
pub(crate) mod step {
    pub const CONNECT_REQUEST: u32 = 1;
    pub const CONNECT_REPLY: u32 = 2;
    pub const KEY_PROPOSAL: u32 = 3;
    pub const KEY_CONFIRMATION: u32 = 4;
}

/// Initial sequence numbers are kept below 2^31 so a direction always has
/// room for at least 2^31 frames.
const SEQUENCE_MASK: u32 = 0x7FFF_FFFF;

/// Identity and signed ephemeral key announced by either side
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hello {
    pub identity: Vec<u8>,
    pub ephemeral: [u8; sizes::x25519::PUBLIC_KEY_BYTES],
    pub signature: [u8; sizes::ed25519::SIGNATURE_BYTES],
}

impl Hello {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(
            4 + self.identity.len()
                + sizes::x25519::PUBLIC_KEY_BYTES
                + sizes::ed25519::SIGNATURE_BYTES,
        );
        buf.put_u32(self.identity.len() as u32);
        buf.put_slice(&self.identity);
        buf.put_slice(&self.ephemeral);
        buf.put_slice(&self.signature);
        buf.to_vec()
    }

    pub fn decode(payload: &[u8], max_identity_len: usize) -> Result<Self> {
        let mut buf = payload;
        if buf.remaining() < 4 {
            return format_err!("handshake payload too short");
        }

        let identity_len = buf.get_u32() as usize;
        if identity_len == 0 || identity_len > max_identity_len {
            return format_err!("invalid identity length: {}", identity_len);
        }
        let expected = identity_len + sizes::x25519::PUBLIC_KEY_BYTES + sizes::ed25519::SIGNATURE_BYTES;
        if buf.remaining() != expected {
            return format_err!(
                "handshake payload length mismatch: expected {}, got {}",
                expected,
                buf.remaining()
            );
        }

        let identity = buf[..identity_len].to_vec();
        buf.advance(identity_len);

        let mut ephemeral = [0u8; sizes::x25519::PUBLIC_KEY_BYTES];
        buf.copy_to_slice(&mut ephemeral);

        let mut signature = [0u8; sizes::ed25519::SIGNATURE_BYTES];
        buf.copy_to_slice(&mut signature);

        Ok(Self {
            identity,
            ephemeral,
            signature,
        })
    }
}

/// Initiator's transcript signature and key confirmation tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyProposal {
    pub signature: [u8; sizes::ed25519::SIGNATURE_BYTES],
    pub mac: [u8; sizes::MAC_SIZE],
}

impl KeyProposal {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(sizes::ed25519::SIGNATURE_BYTES + sizes::MAC_SIZE);
        buf.put_slice(&self.signature);
        buf.put_slice(&self.mac);
        buf.to_vec()
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != sizes::ed25519::SIGNATURE_BYTES + sizes::MAC_SIZE {
            return format_err!("key proposal has {} bytes", payload.len());
        }
        let mut buf = payload;
        let mut signature = [0u8; sizes::ed25519::SIGNATURE_BYTES];
        buf.copy_to_slice(&mut signature);
        let mut mac = [0u8; sizes::MAC_SIZE];
        buf.copy_to_slice(&mut mac);
        Ok(Self { signature, mac })
    }
}

/// Responder's key confirmation tag
pub(crate) fn decode_confirmation(payload: &[u8]) -> Result<[u8; sizes::MAC_SIZE]> {
    payload
        .try_into()
        .or_else(|_| format_err!("key confirmation has {} bytes", payload.len()))
}

/// `a_eph | b_eph | len(a_id) | a_id | len(b_id) | b_id`
///
/// The initiator signs the transcript with itself first; the responder
/// signs it with itself first. The initiator-first form also seeds the
/// session id.
pub(crate) fn transcript(
    first_ephemeral: &[u8],
    second_ephemeral: &[u8],
    first_identity: &[u8],
    second_identity: &[u8],
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(
        first_ephemeral.len() + second_ephemeral.len() + 8 + first_identity.len() + second_identity.len(),
    );
    buf.put_slice(first_ephemeral);
    buf.put_slice(second_ephemeral);
    buf.put_u32(first_identity.len() as u32);
    buf.put_slice(first_identity);
    buf.put_u32(second_identity.len() as u32);
    buf.put_slice(second_identity);
    buf.to_vec()
}

/// Keys negotiated by the handshake, wiped on drop
pub(crate) struct SessionKeys {
    pub session_id: u32,
    pub master: kdf::DerivedKey,
    pub initiator_key: kdf::DerivedKey,
    pub responder_key: kdf::DerivedKey,
    pub initiator_sequence: u32,
    pub responder_sequence: u32,
}

impl SessionKeys {
    /// Run the key schedule for a handshake.
    ///
    /// `initiator_transcript` is the initiator-first transcript.
    pub fn derive(shared: &SharedSecret, initiator_transcript: &[u8]) -> Result<Self> {
        let session_id = kdf::derive_u32(initiator_transcript, None, &[labels::SESSION_ID])?;
        let sid = session_id.to_be_bytes();

        let master = kdf::derive_key(shared.as_bytes(), Some(&sid[..]), &[labels::MASTER_KEY])?;

        let initiator_key = kdf::derive_key(&master[..], None, &[labels::INITIATOR_KEY, &sid])?;
        let responder_key = kdf::derive_key(&master[..], None, &[labels::RESPONDER_KEY, &sid])?;
        let initiator_sequence =
            kdf::derive_u32(&master[..], None, &[labels::INITIATOR_SEQUENCE, &sid])? & SEQUENCE_MASK;
        let responder_sequence =
            kdf::derive_u32(&master[..], None, &[labels::RESPONDER_SEQUENCE, &sid])? & SEQUENCE_MASK;

        Ok(Self {
            session_id,
            master,
            initiator_key,
            responder_key,
            initiator_sequence,
            responder_sequence,
        })
    }

    /// Key confirmation tag over the peer's ephemeral key
    pub fn confirmation_mac(&self, peer_ephemeral: &[u8]) -> Result<[u8; sizes::MAC_SIZE]> {
        kdf::hmac_sha256(&self.master[..], &[peer_ephemeral, &self.session_id.to_be_bytes()])
    }

    /// Check a confirmation tag computed over our own ephemeral key
    pub fn verify_confirmation(&self, own_ephemeral: &[u8], mac: &[u8]) -> Result<()> {
        kdf::verify_hmac(
            &self.master[..],
            &[own_ephemeral, &self.session_id.to_be_bytes()],
            mac,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyExchange;
    use crate::error::Error;

    #[test]
    fn test_hello_encoding() {
        let hello = Hello {
            identity: b"alice".to_vec(),
            ephemeral: [1u8; 32],
            signature: [2u8; 64],
        };
        let bytes = hello.encode();
        assert_eq!(bytes.len(), 4 + 5 + 32 + 64);
        assert_eq!(Hello::decode(&bytes, 1024).unwrap(), hello);
    }

    #[test]
    fn test_hello_rejects_bad_lengths() {
        let hello = Hello {
            identity: b"alice".to_vec(),
            ephemeral: [1u8; 32],
            signature: [2u8; 64],
        };
        let bytes = hello.encode();

        assert!(matches!(
            Hello::decode(&bytes[..bytes.len() - 1], 1024),
            Err(Error::MalformedFrame(_))
        ));
        assert!(matches!(Hello::decode(&bytes, 4), Err(Error::MalformedFrame(_))));
        assert!(matches!(Hello::decode(&[0, 0], 1024), Err(Error::MalformedFrame(_))));

        let mut empty_id = vec![0u8, 0, 0, 0];
        empty_id.extend_from_slice(&[0u8; 96]);
        assert!(matches!(Hello::decode(&empty_id, 1024), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_key_proposal_encoding() {
        let proposal = KeyProposal {
            signature: [3u8; 64],
            mac: [4u8; 32],
        };
        let bytes = proposal.encode();
        assert_eq!(KeyProposal::decode(&bytes).unwrap(), proposal);
        assert!(KeyProposal::decode(&bytes[1..]).is_err());
    }

    #[test]
    fn test_confirmation_decoding() {
        assert_eq!(decode_confirmation(&[9u8; 32]).unwrap(), [9u8; 32]);
        assert!(matches!(decode_confirmation(&[9u8; 33]), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_transcript_is_unambiguous() {
        let a = transcript(&[1; 32], &[2; 32], b"ab", b"c");
        let b = transcript(&[1; 32], &[2; 32], b"a", b"bc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_both_sides_derive_same_keys() {
        let a = KeyExchange::generate_ephemeral();
        let b = KeyExchange::generate_ephemeral();
        let t = transcript(&a.public_bytes(), &b.public_bytes(), b"alice", b"bob");

        let ka = SessionKeys::derive(
            &KeyExchange::derive_shared_secret(&a, &b.public_bytes()).unwrap(),
            &t,
        )
        .unwrap();
        let kb = SessionKeys::derive(
            &KeyExchange::derive_shared_secret(&b, &a.public_bytes()).unwrap(),
            &t,
        )
        .unwrap();

        assert_eq!(ka.session_id, kb.session_id);
        assert_eq!(*ka.initiator_key, *kb.initiator_key);
        assert_eq!(*ka.responder_key, *kb.responder_key);
        assert_ne!(*ka.initiator_key, *ka.responder_key);
        assert_eq!(ka.initiator_sequence, kb.initiator_sequence);
        assert!(ka.initiator_sequence <= SEQUENCE_MASK);
        assert!(ka.responder_sequence <= SEQUENCE_MASK);

        let mac = ka.confirmation_mac(&b.public_bytes()).unwrap();
        assert!(kb.verify_confirmation(&b.public_bytes(), &mac).is_ok());
        assert_eq!(
            kb.verify_confirmation(&a.public_bytes(), &mac),
            Err(Error::AuthenticationFailed)
        );
    }
}
