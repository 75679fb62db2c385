/*!
Secure comparator engine.

Implements the Socialist Millionaires' Protocol over Ristretto255. The
side that calls `begin_compare` sends step 1; the peer answers with step 2;
the exchange ends after step 4 with both sides knowing whether the secrets
matched and nothing else.

| step | sender    | contents                                           |
|------|-----------|----------------------------------------------------|
| 1    | initiator | `G2a, proof, G3a, proof`                           |
| 2    | responder | `G2b, proof, G3b, proof, Pb, Qb, proof`            |
| 3    | initiator | `Pa, Qa, proof, Ra, proof`                         |
| 4    | responder | `Rb, proof`                                        |

Every element and scalar takes 32 bytes on the wire.
*/

use super::proof::{
    DlogProof, DoubleBaseProof, EqualLogProof, hash_to_scalar, random_scalar,
};
use crate::{
    config::ComparatorConfig,
    constants::{labels, sizes::GROUP_ELEMENT_SIZE},
    error::{Error, Result},
    format_err,
    frame::{self, FrameKey},
    header::FrameHeader,
    protocol_err,
    security::constant_time::{constant_time_eq, constant_time_is_zero},
    types::MessageType,
};

use bytes::{Buf, BufMut, BytesMut};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as G,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Comparison progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparatorState {
    /// Nothing sent or received yet
    Idle,
    /// Step 1 sent, waiting for step 2
    Began,
    /// Exchange in progress
    Proceeding,
    /// Both parties hold the same secret
    Matched,
    /// The secrets differ
    NotMatched,
    /// A frame was malformed, out of order or failed verification
    Error,
}

impl ComparatorState {
    /// Whether the comparison has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComparatorState::Matched | ComparatorState::NotMatched | ComparatorState::Error
        )
    }
}

impl fmt::Display for ComparatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Proof positions, one per proof in the exchange
mod position {
    pub const G2_INITIATOR: u8 = 1;
    pub const G3_INITIATOR: u8 = 2;
    pub const G2_RESPONDER: u8 = 3;
    pub const G3_RESPONDER: u8 = 4;
    pub const PQ_RESPONDER: u8 = 5;
    pub const PQ_INITIATOR: u8 = 6;
    pub const R_INITIATOR: u8 = 7;
    pub const R_RESPONDER: u8 = 8;
}

/// Secret scalars of one side
#[derive(Zeroize, ZeroizeOnDrop)]
struct Exponents {
    /// Hash of the shared secret
    secret: Scalar,
    /// Exponent contributed to g2
    g2: Scalar,
    /// Exponent contributed to g3
    g3: Scalar,
    /// Blinding exponent of P and Q
    pq: Scalar,
}

impl Exponents {
    fn random(secret: Scalar) -> Self {
        Self {
            secret,
            g2: random_scalar(),
            g3: random_scalar(),
            pq: random_scalar(),
        }
    }
}

/// Public values accumulated during the exchange
#[derive(Default)]
struct Shared {
    g2: RistrettoPoint,
    g3: RistrettoPoint,
    own_g3: RistrettoPoint,
    peer_g3: RistrettoPoint,
    own_p: RistrettoPoint,
    own_q: RistrettoPoint,
    /// `Pa - Pb`
    p_diff: RistrettoPoint,
    /// `Qa - Qb`
    q_diff: RistrettoPoint,
}

/// Reads fixed-size group elements and scalars from a step payload
struct StepReader<'a> {
    buf: &'a [u8],
}

impl<'a> StepReader<'a> {
    fn new(payload: &'a [u8], elements: usize) -> Result<Self> {
        if payload.len() != elements * GROUP_ELEMENT_SIZE {
            return format_err!(
                "comparator step has {} bytes, expected {}",
                payload.len(),
                elements * GROUP_ELEMENT_SIZE
            );
        }
        Ok(Self { buf: payload })
    }

    fn bytes(&mut self) -> [u8; GROUP_ELEMENT_SIZE] {
        let mut out = [0u8; GROUP_ELEMENT_SIZE];
        self.buf.copy_to_slice(&mut out);
        out
    }

    /// Decode a non-identity group element
    fn point(&mut self) -> Result<RistrettoPoint> {
        let encoded = self.bytes();
        if constant_time_is_zero(&encoded) {
            return Err(Error::VerificationFailed);
        }
        match CompressedRistretto(encoded).decompress() {
            Some(point) => Ok(point),
            None => format_err!("invalid group element"),
        }
    }

    /// Decode a canonical scalar
    fn scalar(&mut self) -> Result<Scalar> {
        match Option::<Scalar>::from(Scalar::from_canonical_bytes(self.bytes())) {
            Some(scalar) => Ok(scalar),
            None => format_err!("non-canonical scalar"),
        }
    }

    fn dlog_proof(&mut self) -> Result<DlogProof> {
        Ok(DlogProof {
            c: self.scalar()?,
            s: self.scalar()?,
        })
    }

    fn double_base_proof(&mut self) -> Result<DoubleBaseProof> {
        Ok(DoubleBaseProof {
            c: self.scalar()?,
            s1: self.scalar()?,
            s2: self.scalar()?,
        })
    }

    fn equal_log_proof(&mut self) -> Result<EqualLogProof> {
        Ok(EqualLogProof {
            c: self.scalar()?,
            s: self.scalar()?,
        })
    }
}

/// Builds a step payload
struct StepWriter {
    buf: BytesMut,
}

impl StepWriter {
    fn new(elements: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(elements * GROUP_ELEMENT_SIZE),
        }
    }

    fn point(mut self, point: &RistrettoPoint) -> Self {
        self.buf.put_slice(point.compress().as_bytes());
        self
    }

    fn scalar(mut self, scalar: &Scalar) -> Self {
        self.buf.put_slice(scalar.as_bytes());
        self
    }

    fn dlog_proof(self, proof: &DlogProof) -> Self {
        self.scalar(&proof.c).scalar(&proof.s)
    }

    fn double_base_proof(self, proof: &DoubleBaseProof) -> Self {
        self.scalar(&proof.c).scalar(&proof.s1).scalar(&proof.s2)
    }

    fn equal_log_proof(self, proof: &EqualLogProof) -> Self {
        self.scalar(&proof.c).scalar(&proof.s)
    }

    fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// One party of a secret comparison
pub struct SecureComparator {
    config: ComparatorConfig,
    state: ComparatorState,
    secret: Zeroizing<Vec<u8>>,
    exponents: Option<Exponents>,
    shared: Shared,
    expected_step: u32,
    frame_key: FrameKey,
}

impl SecureComparator {
    /// Step 1 byte length
    pub const STEP1_LEN: usize = 6 * GROUP_ELEMENT_SIZE;
    /// Step 2 byte length
    pub const STEP2_LEN: usize = 11 * GROUP_ELEMENT_SIZE;
    /// Step 3 byte length
    pub const STEP3_LEN: usize = 8 * GROUP_ELEMENT_SIZE;
    /// Step 4 byte length
    pub const STEP4_LEN: usize = 3 * GROUP_ELEMENT_SIZE;

    /// Create a comparator holding `secret`
    pub fn new(secret: &[u8]) -> Result<Self> {
        Self::with_config(secret, ComparatorConfig::default())
    }

    /// Create a comparator with a custom configuration
    pub fn with_config(secret: &[u8], config: ComparatorConfig) -> Result<Self> {
        config.validate()?;
        if secret.is_empty() {
            return Err(Error::InvalidParameter("secret must not be empty".into()));
        }
        if secret.len() > config.max_secret_len {
            return Err(Error::InvalidParameter(format!(
                "secret longer than {} bytes",
                config.max_secret_len
            )));
        }

        Ok(Self {
            config,
            state: ComparatorState::Idle,
            secret: Zeroizing::new(secret.to_vec()),
            exponents: None,
            shared: Shared::default(),
            expected_step: 1,
            frame_key: FrameKey::public(labels::COMPARATOR_FRAME_KEY),
        })
    }

    /// Extend the secret; only possible before the exchange starts.
    ///
    /// Appending `b"456"` to `b"123"` compares equal to `b"123456"`.
    pub fn append_secret(&mut self, more: &[u8]) -> Result<()> {
        if self.state != ComparatorState::Idle || self.exponents.is_some() {
            return protocol_err!("secret can only be extended before the comparison starts");
        }
        if self.secret.len() + more.len() > self.config.max_secret_len {
            return Err(Error::InvalidParameter(format!(
                "secret longer than {} bytes",
                self.config.max_secret_len
            )));
        }
        self.secret.extend_from_slice(more);
        Ok(())
    }

    /// Current state
    pub fn state(&self) -> ComparatorState {
        self.state
    }

    /// Whether the exchange is over, including when it ended in `Error`
    pub fn is_compare_complete(&self) -> bool {
        self.state.is_terminal()
    }

    /// Result of the comparison
    pub fn is_match(&self) -> Result<bool> {
        match self.state {
            ComparatorState::Matched => Ok(true),
            ComparatorState::NotMatched => Ok(false),
            ComparatorState::Error => Err(Error::ProtocolError),
            _ => Err(Error::NotReady),
        }
    }

    /// Start the comparison and produce the step 1 frame
    pub fn begin_compare(&mut self) -> Result<Vec<u8>> {
        if self.state != ComparatorState::Idle {
            return protocol_err!("cannot begin a comparison in state {}", self.state);
        }

        let exponents = Exponents::random(self.take_secret());
        let g2_public = exponents.g2 * G;
        let g3_public = exponents.g3 * G;

        let payload = StepWriter::new(6)
            .point(&g2_public)
            .dlog_proof(&DlogProof::prove(&exponents.g2, &g2_public, position::G2_INITIATOR))
            .point(&g3_public)
            .dlog_proof(&DlogProof::prove(&exponents.g3, &g3_public, position::G3_INITIATOR))
            .finish();
        let frame = frame::encode(MessageType::CompareStep, 1, &payload, &self.frame_key)?;

        self.shared.own_g3 = g3_public;
        self.exponents = Some(exponents);
        self.expected_step = 2;
        self.set_state(ComparatorState::Began);
        Ok(frame)
    }

    /// Consume the peer's frame and produce the next one, if any.
    ///
    /// Returns `None` once the initiator has processed the final step.
    /// Any failure moves the comparator to `Error`.
    pub fn proceed_compare(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.state.is_terminal() {
            return protocol_err!("comparison already finished in state {}", self.state);
        }

        match self.process(bytes) {
            Ok(reply) => Ok(reply),
            Err(error) => {
                log::warn!(
                    "secure comparator failed at step {}: {}",
                    self.expected_step,
                    error
                );
                self.wipe();
                self.set_state(ComparatorState::Error);
                Err(error)
            }
        }
    }

    /// Wipe the secret and all exponents; the comparator becomes unusable
    pub fn destroy(&mut self) {
        self.wipe();
        if !self.state.is_terminal() {
            self.set_state(ComparatorState::Error);
        }
    }

    fn set_state(&mut self, to: ComparatorState) {
        log::debug!("secure comparator state {} -> {}", self.state, to);
        self.state = to;
    }

    fn take_secret(&mut self) -> Scalar {
        let x = hash_to_scalar(&[labels::COMPARATOR_SECRET, &self.secret[..]]);
        self.secret.zeroize();
        x
    }

    fn wipe(&mut self) {
        self.secret.zeroize();
        self.exponents = None;
    }

    fn exponents(&self) -> Result<&Exponents> {
        self.exponents
            .as_ref()
            .ok_or_else(|| Error::ProtocolViolation("comparison not started".into()))
    }

    fn process(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let header = FrameHeader::from_bytes(bytes)?;
        if header.msg_type != MessageType::CompareStep {
            return protocol_err!("unexpected {} frame", header.msg_type);
        }

        let frame = frame::decode(bytes, &self.frame_key)?;
        if frame.sequence != self.expected_step {
            return protocol_err!(
                "step {} out of order, expected {}",
                frame.sequence,
                self.expected_step
            );
        }

        match frame.sequence {
            1 => self.responder_step2(&frame.payload).map(Some),
            2 => self.initiator_step3(&frame.payload).map(Some),
            3 => self.responder_step4(&frame.payload).map(Some),
            4 => self.initiator_finish(&frame.payload).map(|()| None),
            other => protocol_err!("unknown step {}", other),
        }
    }

    /// Responder: verify step 1, answer with step 2
    fn responder_step2(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut reader = StepReader::new(payload, 6)?;
        let peer_g2 = reader.point()?;
        reader.dlog_proof()?.verify(&peer_g2, position::G2_INITIATOR)?;
        let peer_g3 = reader.point()?;
        reader.dlog_proof()?.verify(&peer_g3, position::G3_INITIATOR)?;

        let exponents = Exponents::random(self.take_secret());
        let g2_public = exponents.g2 * G;
        let g3_public = exponents.g3 * G;
        let g2 = exponents.g2 * peer_g2;
        let g3 = exponents.g3 * peer_g3;

        let p = exponents.pq * g3;
        let q = exponents.pq * G + exponents.secret * g2;

        let payload = StepWriter::new(11)
            .point(&g2_public)
            .dlog_proof(&DlogProof::prove(&exponents.g2, &g2_public, position::G2_RESPONDER))
            .point(&g3_public)
            .dlog_proof(&DlogProof::prove(&exponents.g3, &g3_public, position::G3_RESPONDER))
            .point(&p)
            .point(&q)
            .double_base_proof(&DoubleBaseProof::prove(
                &exponents.pq,
                &exponents.secret,
                &g2,
                &g3,
                &p,
                &q,
                position::PQ_RESPONDER,
            ))
            .finish();
        let frame = frame::encode(MessageType::CompareStep, 2, &payload, &self.frame_key)?;

        self.shared = Shared {
            g2,
            g3,
            own_g3: g3_public,
            peer_g3,
            own_p: p,
            own_q: q,
            ..Shared::default()
        };
        self.exponents = Some(exponents);
        self.expected_step = 3;
        self.set_state(ComparatorState::Proceeding);
        Ok(frame)
    }

    /// Initiator: verify step 2, answer with step 3
    fn initiator_step3(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut reader = StepReader::new(payload, 11)?;
        let peer_g2 = reader.point()?;
        reader.dlog_proof()?.verify(&peer_g2, position::G2_RESPONDER)?;
        let peer_g3 = reader.point()?;
        reader.dlog_proof()?.verify(&peer_g3, position::G3_RESPONDER)?;
        let peer_p = reader.point()?;
        let peer_q = reader.point()?;
        let pq_proof = reader.double_base_proof()?;

        let exponents = self.exponents()?;
        let g2 = exponents.g2 * peer_g2;
        let g3 = exponents.g3 * peer_g3;
        pq_proof.verify(&g2, &g3, &peer_p, &peer_q, position::PQ_RESPONDER)?;

        let p = exponents.pq * g3;
        let q = exponents.pq * G + exponents.secret * g2;
        let q_diff = q - peer_q;
        let r = exponents.g3 * q_diff;

        let payload = StepWriter::new(8)
            .point(&p)
            .point(&q)
            .double_base_proof(&DoubleBaseProof::prove(
                &exponents.pq,
                &exponents.secret,
                &g2,
                &g3,
                &p,
                &q,
                position::PQ_INITIATOR,
            ))
            .point(&r)
            .equal_log_proof(&EqualLogProof::prove(
                &exponents.g3,
                &self.shared.own_g3,
                &q_diff,
                &r,
                position::R_INITIATOR,
            ))
            .finish();
        let frame = frame::encode(MessageType::CompareStep, 3, &payload, &self.frame_key)?;

        self.shared.g2 = g2;
        self.shared.g3 = g3;
        self.shared.peer_g3 = peer_g3;
        self.shared.own_p = p;
        self.shared.own_q = q;
        self.shared.p_diff = p - peer_p;
        self.shared.q_diff = q_diff;
        self.expected_step = 4;
        self.set_state(ComparatorState::Proceeding);
        Ok(frame)
    }

    /// Responder: verify step 3, answer with step 4 and decide
    fn responder_step4(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut reader = StepReader::new(payload, 8)?;
        let peer_p = reader.point()?;
        let peer_q = reader.point()?;
        reader.double_base_proof()?.verify(
            &self.shared.g2,
            &self.shared.g3,
            &peer_p,
            &peer_q,
            position::PQ_INITIATOR,
        )?;

        let q_diff = peer_q - self.shared.own_q;
        let peer_r = reader.point()?;
        reader.equal_log_proof()?.verify(
            &self.shared.peer_g3,
            &q_diff,
            &peer_r,
            position::R_INITIATOR,
        )?;

        let exponents = self.exponents()?;
        let r = exponents.g3 * q_diff;
        let payload = StepWriter::new(3)
            .point(&r)
            .equal_log_proof(&EqualLogProof::prove(
                &exponents.g3,
                &self.shared.own_g3,
                &q_diff,
                &r,
                position::R_RESPONDER,
            ))
            .finish();
        let frame = frame::encode(MessageType::CompareStep, 4, &payload, &self.frame_key)?;

        let r_ab = exponents.g3 * peer_r;
        self.shared.q_diff = q_diff;
        self.shared.p_diff = peer_p - self.shared.own_p;
        self.finish(&r_ab);
        Ok(frame)
    }

    /// Initiator: verify step 4 and decide
    fn initiator_finish(&mut self, payload: &[u8]) -> Result<()> {
        let mut reader = StepReader::new(payload, 3)?;
        let peer_r = reader.point()?;
        reader.equal_log_proof()?.verify(
            &self.shared.peer_g3,
            &self.shared.q_diff,
            &peer_r,
            position::R_RESPONDER,
        )?;

        let r_ab = self.exponents()?.g3 * peer_r;
        self.finish(&r_ab);
        Ok(())
    }

    /// Compare `Rab` with `Pa - Pb` and enter the terminal state
    fn finish(&mut self, r_ab: &RistrettoPoint) {
        let matched = constant_time_eq(
            r_ab.compress().as_bytes(),
            self.shared.p_diff.compress().as_bytes(),
        );
        self.wipe();
        self.set_state(if matched {
            ComparatorState::Matched
        } else {
            ComparatorState::NotMatched
        });
    }
}

impl fmt::Debug for SecureComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureComparator")
            .field("state", &self.state)
            .field("expected_step", &self.expected_step)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(a: &mut SecureComparator, b: &mut SecureComparator) {
        let step1 = a.begin_compare().unwrap();
        let step2 = b.proceed_compare(&step1).unwrap().unwrap();
        let step3 = a.proceed_compare(&step2).unwrap().unwrap();
        let step4 = b.proceed_compare(&step3).unwrap().unwrap();
        assert_eq!(a.proceed_compare(&step4).unwrap(), None);
    }

    #[test]
    fn test_matching_secrets() {
        let mut a = SecureComparator::new(b"shared secret").unwrap();
        let mut b = SecureComparator::new(b"shared secret").unwrap();
        run(&mut a, &mut b);

        assert_eq!(a.state(), ComparatorState::Matched);
        assert_eq!(b.state(), ComparatorState::Matched);
        assert_eq!(a.is_match(), Ok(true));
        assert_eq!(b.is_match(), Ok(true));
    }

    #[test]
    fn test_different_secrets() {
        let mut a = SecureComparator::new(b"shared secret").unwrap();
        let mut b = SecureComparator::new(b"shared secreT").unwrap();
        run(&mut a, &mut b);

        assert_eq!(a.is_match(), Ok(false));
        assert_eq!(b.is_match(), Ok(false));
    }

    #[test]
    fn test_frame_sizes() {
        let mut a = SecureComparator::new(b"s").unwrap();
        let mut b = SecureComparator::new(b"s").unwrap();
        let overhead = crate::constants::sizes::HEADER_SIZE + crate::constants::sizes::chacha::TAG_SIZE;

        let step1 = a.begin_compare().unwrap();
        assert_eq!(step1.len(), overhead + SecureComparator::STEP1_LEN);
        let step2 = b.proceed_compare(&step1).unwrap().unwrap();
        assert_eq!(step2.len(), overhead + SecureComparator::STEP2_LEN);
        let step3 = a.proceed_compare(&step2).unwrap().unwrap();
        assert_eq!(step3.len(), overhead + SecureComparator::STEP3_LEN);
        let step4 = b.proceed_compare(&step3).unwrap().unwrap();
        assert_eq!(step4.len(), overhead + SecureComparator::STEP4_LEN);
    }

    #[test]
    fn test_not_ready_before_completion() {
        let mut a = SecureComparator::new(b"secret").unwrap();
        assert_eq!(a.is_match(), Err(Error::NotReady));
        a.begin_compare().unwrap();
        assert_eq!(a.state(), ComparatorState::Began);
        assert_eq!(a.is_match(), Err(Error::NotReady));
        assert!(!a.is_compare_complete());
    }

    #[test]
    fn test_begin_twice() {
        let mut a = SecureComparator::new(b"secret").unwrap();
        a.begin_compare().unwrap();
        assert!(matches!(a.begin_compare(), Err(Error::ProtocolViolation(_))));
        assert_eq!(a.state(), ComparatorState::Began);
    }

    #[test]
    fn test_append_after_start_rejected() {
        let mut a = SecureComparator::new(b"secret").unwrap();
        a.begin_compare().unwrap();
        assert!(matches!(a.append_secret(b"more"), Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_forged_proof_detected() {
        let mut a = SecureComparator::new(b"secret").unwrap();
        let mut b = SecureComparator::new(b"secret").unwrap();
        let step1 = a.begin_compare().unwrap();

        // rebuild step 1 with a proof bound to the wrong position
        let g2 = random_scalar() * G;
        let g3_exp = random_scalar();
        let g3 = g3_exp * G;
        let payload = StepWriter::new(6)
            .point(&g2)
            .dlog_proof(&DlogProof::prove(&g3_exp, &g2, position::G2_INITIATOR))
            .point(&g3)
            .dlog_proof(&DlogProof::prove(&g3_exp, &g3, position::G3_INITIATOR))
            .finish();
        let forged = frame::encode(
            MessageType::CompareStep,
            1,
            &payload,
            &FrameKey::public(labels::COMPARATOR_FRAME_KEY),
        )
        .unwrap();
        assert_ne!(forged, step1);

        assert_eq!(b.proceed_compare(&forged), Err(Error::VerificationFailed));
        assert_eq!(b.state(), ComparatorState::Error);
        assert_eq!(b.is_match(), Err(Error::ProtocolError));
        assert!(b.is_compare_complete());
    }

    #[test]
    fn test_identity_point_rejected() {
        let mut b = SecureComparator::new(b"secret").unwrap();
        let payload = vec![0u8; SecureComparator::STEP1_LEN];
        let frame = frame::encode(
            MessageType::CompareStep,
            1,
            &payload,
            &FrameKey::public(labels::COMPARATOR_FRAME_KEY),
        )
        .unwrap();

        assert_eq!(b.proceed_compare(&frame), Err(Error::VerificationFailed));
        assert_eq!(b.state(), ComparatorState::Error);
    }

    #[test]
    fn test_destroy() {
        let mut a = SecureComparator::new(b"secret").unwrap();
        a.destroy();
        assert!(a.is_compare_complete());
        assert_eq!(a.is_match(), Err(Error::ProtocolError));
        assert!(matches!(a.begin_compare(), Err(Error::ProtocolViolation(_))));
    }
}
