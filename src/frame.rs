/*!
Frame codec.

Every message of both engines travels as a frame: a 10-byte header
followed by the payload sealed under ChaCha20-Poly1305 with the header as
associated data. `FrameSealer` and `FrameOpener` add per-direction
sequence numbering and the replay guard on top of `encode`/`decode`.
*/

use crate::{
    constants::{DEFAULT_MAX_PAYLOAD, sizes},
    crypto::Cipher,
    error::{Error, Result},
    format_err,
    header::FrameHeader,
    types::MessageType,
};

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Symmetric key a frame is sealed under
#[derive(Clone)]
pub struct FrameKey(Zeroizing<[u8; sizes::chacha::KEY_SIZE]>);

impl FrameKey {
    /// Wrap a secret 32-byte key
    pub fn new(key: [u8; sizes::chacha::KEY_SIZE]) -> Self {
        Self(Zeroizing::new(key))
    }

    /// Well-known key derived from a protocol label.
    ///
    /// Frames sealed under a public key only get integrity protection;
    /// their authenticity must come from what they carry.
    pub fn public(label: &[u8]) -> Self {
        let digest = Sha256::digest(label);
        let mut key = [0u8; sizes::chacha::KEY_SIZE];
        key.copy_from_slice(&digest);
        Self::new(key)
    }

    fn cipher(&self) -> Cipher {
        Cipher::new(&self.0)
    }
}

impl fmt::Debug for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameKey([REDACTED])")
    }
}

/// A decoded and authenticated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type
    pub msg_type: MessageType,
    /// Sequence number
    pub sequence: u32,
    /// Opened payload
    pub payload: Vec<u8>,
}

/// Seal `payload` into a wire frame
pub fn encode(
    msg_type: MessageType,
    sequence: u32,
    payload: &[u8],
    key: &FrameKey,
) -> Result<Vec<u8>> {
    let sealed_len = payload.len() + sizes::chacha::TAG_SIZE;
    let payload_len = u32::try_from(sealed_len)
        .map_err(|_| Error::InvalidParameter("payload too large for a frame".into()))?;

    let header = FrameHeader::new(msg_type, sequence, payload_len).to_bytes();
    let nonce = Cipher::create_nonce(sequence, msg_type);
    let sealed = key.cipher().seal(&nonce, &header, payload)?;

    let mut frame = Vec::with_capacity(sizes::HEADER_SIZE + sealed.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&sealed);
    Ok(frame)
}

/// Parse and authenticate a wire frame with the default payload limit
pub fn decode(bytes: &[u8], key: &FrameKey) -> Result<Frame> {
    decode_bounded(bytes, key, DEFAULT_MAX_PAYLOAD)
}

/// Parse and authenticate a wire frame.
///
/// Structural checks run first; the payload is only returned once its tag
/// has verified.
pub fn decode_bounded(bytes: &[u8], key: &FrameKey, max_payload_len: usize) -> Result<Frame> {
    if bytes.len() < sizes::HEADER_SIZE + sizes::chacha::TAG_SIZE {
        return format_err!("frame too short: {} bytes", bytes.len());
    }

    let header = FrameHeader::from_bytes(bytes)?;
    let payload_len = header.payload_len as usize;

    if payload_len < sizes::chacha::TAG_SIZE {
        return format_err!("payload shorter than the authentication tag");
    }
    if payload_len > max_payload_len {
        return format_err!("oversized payload: {} bytes", payload_len);
    }
    if bytes.len() - sizes::HEADER_SIZE != payload_len {
        return format_err!(
            "length mismatch: header says {}, got {}",
            payload_len,
            bytes.len() - sizes::HEADER_SIZE
        );
    }

    let nonce = Cipher::create_nonce(header.seq_num, header.msg_type);
    let payload = key.cipher().open(
        &nonce,
        &bytes[..sizes::HEADER_SIZE],
        &bytes[sizes::HEADER_SIZE..],
    )?;

    Ok(Frame {
        msg_type: header.msg_type,
        sequence: header.seq_num,
        payload,
    })
}

/// Outbound half of a direction: assigns strictly increasing sequences
#[derive(Debug)]
pub struct FrameSealer {
    key: FrameKey,
    next_sequence: Option<u32>,
    max_payload_len: usize,
}

impl FrameSealer {
    /// Create a sealer whose first frame carries `first_sequence`
    pub fn new(key: FrameKey, first_sequence: u32, max_payload_len: usize) -> Self {
        Self {
            key,
            next_sequence: Some(first_sequence),
            max_payload_len,
        }
    }

    /// Sequence the next frame will carry, `None` once exhausted
    pub fn next_sequence(&self) -> Option<u32> {
        self.next_sequence
    }

    /// Seal the next frame of this direction
    pub fn seal(&mut self, msg_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() + sizes::chacha::TAG_SIZE > self.max_payload_len {
            return Err(Error::InvalidParameter(format!(
                "payload of {} bytes exceeds the frame limit",
                payload.len()
            )));
        }

        let sequence = self.next_sequence.ok_or(Error::SequenceExhausted)?;
        let frame = encode(msg_type, sequence, payload, &self.key)?;
        self.next_sequence = sequence.checked_add(1);
        Ok(frame)
    }
}

/// Inbound half of a direction: authenticates frames and rejects replays
#[derive(Debug)]
pub struct FrameOpener {
    key: FrameKey,
    last_accepted: Option<u32>,
    max_payload_len: usize,
}

impl FrameOpener {
    /// Create an opener that accepts sequences from `first_sequence` on
    pub fn new(key: FrameKey, first_sequence: u32, max_payload_len: usize) -> Self {
        Self {
            key,
            last_accepted: first_sequence.checked_sub(1),
            max_payload_len,
        }
    }

    /// Highest sequence accepted so far
    pub fn last_accepted(&self) -> Option<u32> {
        self.last_accepted
    }

    /// Authenticate a frame and check that its sequence is fresh.
    ///
    /// A replayed frame is reported as `ReplayDetected` and leaves the
    /// opener unchanged.
    pub fn open(&mut self, bytes: &[u8]) -> Result<Frame> {
        let frame = decode_bounded(bytes, &self.key, self.max_payload_len)?;

        if let Some(last) = self.last_accepted {
            if frame.sequence <= last {
                return Err(Error::ReplayDetected {
                    sequence: frame.sequence,
                });
            }
        }

        self.last_accepted = Some(frame.sequence);
        Ok(frame)
    }
}
