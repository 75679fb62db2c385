/*!
Secure session engine.

`SecureSession` drives the four-frame handshake and then wraps and unwraps
application data under the negotiated keys. It never performs I/O: every
call consumes at most one inbound frame and produces at most one outbound
frame for the caller to deliver.
*/

use super::{
    handshake::{self, Hello, KeyProposal, SessionKeys, step},
    resolver::PeerKeyResolver,
    state::{Role, SessionState, StateManager},
};
use crate::{
    config::SessionConfig,
    constants::labels,
    crypto::{Authentication, EphemeralKeyPair, KeyExchange, KeyPair, PublicKey},
    error::{Error, Result},
    frame::{self, FrameKey, FrameOpener, FrameSealer},
    header::FrameHeader,
    invalid_state_err, protocol_err,
    types::MessageType,
};

use std::fmt;

/// Callback invoked with the new state after every transition
pub type StateObserver = Box<dyn FnMut(SessionState) + Send>;

/// Outcome of feeding a frame to `SecureSession::unwrap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    /// Application plaintext
    Data(Vec<u8>),
    /// Handshake frame to send back to the peer
    Reply(Vec<u8>),
    /// Control frame consumed, nothing to deliver
    NoPayload,
}

/// Per-handshake secrets, dropped once the session is established
struct Handshake {
    ephemeral: EphemeralKeyPair,
    peer_key: Option<PublicKey>,
    peer_ephemeral: Option<[u8; 32]>,
    keys: Option<SessionKeys>,
}

impl Handshake {
    fn new(ephemeral: EphemeralKeyPair) -> Self {
        Self {
            ephemeral,
            peer_key: None,
            peer_ephemeral: None,
            keys: None,
        }
    }
}

struct Transport {
    sealer: FrameSealer,
    opener: FrameOpener,
}

fn missing_context() -> Error {
    Error::ProtocolViolation("handshake context missing".into())
}

/// One endpoint of a mutually authenticated session
pub struct SecureSession<R: PeerKeyResolver> {
    identity: Vec<u8>,
    key_pair: KeyPair,
    resolver: R,
    config: SessionConfig,
    state: StateManager,
    observer: Option<StateObserver>,
    handshake_key: FrameKey,
    handshake: Option<Handshake>,
    transport: Option<Transport>,
    /// Highest handshake step this endpoint has sent or accepted
    completed_step: u32,
    remote_identity: Option<Vec<u8>>,
    session_id: Option<u32>,
}

impl<R: PeerKeyResolver> SecureSession<R> {
    /// Create a session endpoint with the default configuration
    pub fn new(identity: impl Into<Vec<u8>>, key_pair: KeyPair, resolver: R) -> Result<Self> {
        Self::with_config(identity, key_pair, resolver, SessionConfig::default())
    }

    /// Create a session endpoint with a custom configuration
    pub fn with_config(
        identity: impl Into<Vec<u8>>,
        key_pair: KeyPair,
        resolver: R,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let identity = identity.into();
        if identity.is_empty() {
            return Err(Error::InvalidParameter("identity must not be empty".into()));
        }
        if identity.len() > config.max_identity_len {
            return Err(Error::InvalidParameter(format!(
                "identity longer than {} bytes",
                config.max_identity_len
            )));
        }

        Ok(Self {
            identity,
            key_pair,
            resolver,
            config,
            state: StateManager::new(),
            observer: None,
            handshake_key: FrameKey::public(labels::HANDSHAKE_FRAME_KEY),
            handshake: None,
            transport: None,
            completed_step: 0,
            remote_identity: None,
            session_id: None,
        })
    }

    /// Register a callback for state changes, replacing any previous one
    pub fn set_state_observer<F>(&mut self, observer: F)
    where
        F: FnMut(SessionState) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Builder form of `set_state_observer`
    pub fn with_state_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(SessionState) + Send + 'static,
    {
        self.set_state_observer(observer);
        self
    }

    /// Our own identity
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Role in the handshake, once known
    pub fn role(&self) -> Option<Role> {
        self.state.role()
    }

    /// Whether data can be wrapped and unwrapped
    pub fn is_established(&self) -> bool {
        self.state.can_transfer_data()
    }

    /// Identity of the peer, once its signature has verified
    pub fn remote_peer_id(&self) -> Option<&[u8]> {
        self.remote_identity.as_deref()
    }

    /// Identifier both sides derived for this session
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Start the handshake as initiator
    pub fn connect_request(&mut self) -> Result<Vec<u8>> {
        self.ensure_usable()?;
        if !self.state.can_connect() {
            return invalid_state_err!(SessionState::Idle, self.state.state());
        }

        let ephemeral = KeyExchange::generate_ephemeral();
        let ephemeral_public = ephemeral.public_bytes();
        let signature = Authentication::sign(&self.key_pair, &ephemeral_public);

        let hello = Hello {
            identity: self.identity.clone(),
            ephemeral: ephemeral_public,
            signature: signature.to_bytes(),
        };
        let frame = frame::encode(
            MessageType::ConnectRequest,
            step::CONNECT_REQUEST,
            &hello.encode(),
            &self.handshake_key,
        )?;

        self.handshake = Some(Handshake::new(ephemeral));
        self.completed_step = step::CONNECT_REQUEST;
        self.set_state(SessionState::SentRequest)?;
        Ok(frame)
    }

    /// Seal application data for the peer
    pub fn wrap(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.ensure_usable()?;
        if !self.state.can_transfer_data() {
            return invalid_state_err!(SessionState::Established, self.state.state());
        }

        let transport = self.transport.as_mut().ok_or_else(missing_context)?;
        transport.sealer.seal(MessageType::Data, plaintext)
    }

    /// Process a frame from the peer.
    ///
    /// Any failure except a replayed frame moves the session to `Failed`;
    /// later calls then report `SessionFailed`. A handshake frame for a step
    /// this endpoint already completed counts as a replay.
    pub fn unwrap(&mut self, bytes: &[u8]) -> Result<Unwrapped> {
        self.ensure_usable()?;

        let result = self.check_handshake_replay(bytes).and_then(|()| {
            if self.state.can_transfer_data() {
                self.receive(bytes)
            } else {
                self.handshake_step(bytes)
            }
        });

        match result {
            Err(Error::ReplayDetected { sequence }) => {
                log::warn!("secure session rejected replayed frame {}", sequence);
                Err(Error::ReplayDetected { sequence })
            }
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
            ok => ok,
        }
    }

    /// Emit an authenticated Close frame and close the session
    pub fn close(&mut self) -> Result<Vec<u8>> {
        self.ensure_usable()?;
        if !self.state.can_transfer_data() {
            return invalid_state_err!(SessionState::Established, self.state.state());
        }

        let transport = self.transport.as_mut().ok_or_else(missing_context)?;
        let frame = transport.sealer.seal(MessageType::Close, &[])?;

        self.wipe();
        self.set_state(SessionState::Closed)?;
        Ok(frame)
    }

    /// Wipe all key material and close the session without notifying the peer
    pub fn destroy(&mut self) {
        self.wipe();
        if !self.state.state().is_terminal() {
            if let Err(error) = self.set_state(SessionState::Closed) {
                log::warn!("secure session could not close: {}", error);
            }
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state.state() {
            SessionState::Failed => Err(Error::SessionFailed),
            SessionState::Closed => Err(Error::SessionClosed),
            _ => Ok(()),
        }
    }

    fn set_state(&mut self, to: SessionState) -> Result<()> {
        let from = self.state.state();
        self.state.transition_to(to)?;
        log::debug!("secure session state {} -> {}", from, to);
        if let Some(observer) = self.observer.as_mut() {
            observer(to);
        }
        Ok(())
    }

    fn fail(&mut self, error: &Error) {
        log::warn!(
            "secure session failed in state {}: {}",
            self.state.state(),
            error
        );
        self.wipe();
        if !self.state.state().is_terminal() {
            if let Err(error) = self.set_state(SessionState::Failed) {
                log::warn!("secure session could not enter Failed: {}", error);
            }
        }
    }

    fn wipe(&mut self) {
        self.handshake = None;
        self.transport = None;
    }

    fn resolve_peer(&self, identity: &[u8]) -> Result<PublicKey> {
        self.resolver.resolve(identity).ok_or(Error::UnknownPeer)
    }

    /// Authentic handshake frame at or below the completed step
    fn check_handshake_replay(&self, bytes: &[u8]) -> Result<()> {
        let header = FrameHeader::from_bytes(bytes)?;
        if !header.msg_type.is_handshake() || header.seq_num > self.completed_step {
            return Ok(());
        }

        frame::decode_bounded(bytes, &self.handshake_key, self.config.max_payload_len)?;
        Err(Error::ReplayDetected {
            sequence: header.seq_num,
        })
    }

    fn receive(&mut self, bytes: &[u8]) -> Result<Unwrapped> {
        let header = FrameHeader::from_bytes(bytes)?;
        if !matches!(header.msg_type, MessageType::Data | MessageType::Close) {
            return protocol_err!(
                "unexpected {} frame in state {}",
                header.msg_type,
                self.state.state()
            );
        }

        let transport = self.transport.as_mut().ok_or_else(missing_context)?;
        let frame = transport.opener.open(bytes)?;

        match frame.msg_type {
            MessageType::Data => Ok(Unwrapped::Data(frame.payload)),
            MessageType::Close => {
                self.wipe();
                self.set_state(SessionState::Closed)?;
                Ok(Unwrapped::NoPayload)
            }
            other => protocol_err!("unexpected {} frame", other),
        }
    }

    fn handshake_step(&mut self, bytes: &[u8]) -> Result<Unwrapped> {
        let header = FrameHeader::from_bytes(bytes)?;
        if self.state.expected_handshake_frame() != Some(header.msg_type) {
            return protocol_err!(
                "unexpected {} frame in state {}",
                header.msg_type,
                self.state.state()
            );
        }

        let frame =
            frame::decode_bounded(bytes, &self.handshake_key, self.config.max_payload_len)?;

        let expected_sequence = match frame.msg_type {
            MessageType::ConnectRequest => step::CONNECT_REQUEST,
            MessageType::ConnectReply => step::CONNECT_REPLY,
            MessageType::KeyProposal => step::KEY_PROPOSAL,
            _ => step::KEY_CONFIRMATION,
        };
        if frame.sequence != expected_sequence {
            return protocol_err!(
                "{} frame carries step {}, expected {}",
                frame.msg_type,
                frame.sequence,
                expected_sequence
            );
        }

        let outcome = match frame.msg_type {
            MessageType::ConnectRequest => self.accept_connect_request(&frame.payload)?,
            MessageType::ConnectReply => self.process_connect_reply(&frame.payload)?,
            MessageType::KeyProposal => self.process_key_proposal(&frame.payload)?,
            MessageType::KeyConfirmation => self.process_key_confirmation(&frame.payload)?,
            other => return protocol_err!("unexpected {} frame during handshake", other),
        };

        // the accepted step and the reply to it, if any
        self.completed_step = (frame.sequence + 1).min(step::KEY_CONFIRMATION);
        Ok(outcome)
    }

    /// Responder: Idle -> ReceivedRequest
    fn accept_connect_request(&mut self, payload: &[u8]) -> Result<Unwrapped> {
        let request = Hello::decode(payload, self.config.max_identity_len)?;
        let peer_key = self.resolve_peer(&request.identity)?;
        Authentication::verify(&peer_key, &request.ephemeral, &request.signature)?;

        let ephemeral = KeyExchange::generate_ephemeral();
        let ephemeral_public = ephemeral.public_bytes();
        let shared = KeyExchange::derive_shared_secret(&ephemeral, &request.ephemeral)?;
        let keys = SessionKeys::derive(
            &shared,
            &handshake::transcript(
                &request.ephemeral,
                &ephemeral_public,
                &request.identity,
                &self.identity,
            ),
        )?;

        let reply_transcript = handshake::transcript(
            &ephemeral_public,
            &request.ephemeral,
            &self.identity,
            &request.identity,
        );
        let reply = Hello {
            identity: self.identity.clone(),
            ephemeral: ephemeral_public,
            signature: Authentication::sign(&self.key_pair, &reply_transcript).to_bytes(),
        };
        let frame = frame::encode(
            MessageType::ConnectReply,
            step::CONNECT_REPLY,
            &reply.encode(),
            &self.handshake_key,
        )?;

        self.session_id = Some(keys.session_id);
        self.remote_identity = Some(request.identity);
        self.handshake = Some(Handshake {
            ephemeral,
            peer_key: Some(peer_key),
            peer_ephemeral: Some(request.ephemeral),
            keys: Some(keys),
        });
        self.set_state(SessionState::ReceivedRequest)?;
        Ok(Unwrapped::Reply(frame))
    }

    /// Initiator: SentRequest -> NegotiatingKeys
    fn process_connect_reply(&mut self, payload: &[u8]) -> Result<Unwrapped> {
        let reply = Hello::decode(payload, self.config.max_identity_len)?;
        let peer_key = self.resolve_peer(&reply.identity)?;

        let mut context = self.handshake.take().ok_or_else(missing_context)?;
        let own_ephemeral = context.ephemeral.public_bytes();

        let reply_transcript = handshake::transcript(
            &reply.ephemeral,
            &own_ephemeral,
            &reply.identity,
            &self.identity,
        );
        Authentication::verify(&peer_key, &reply_transcript, &reply.signature)?;

        let shared = KeyExchange::derive_shared_secret(&context.ephemeral, &reply.ephemeral)?;
        let proposal_transcript = handshake::transcript(
            &own_ephemeral,
            &reply.ephemeral,
            &self.identity,
            &reply.identity,
        );
        let keys = SessionKeys::derive(&shared, &proposal_transcript)?;

        let proposal = KeyProposal {
            signature: Authentication::sign(&self.key_pair, &proposal_transcript).to_bytes(),
            mac: keys.confirmation_mac(&reply.ephemeral)?,
        };
        let frame = frame::encode(
            MessageType::KeyProposal,
            step::KEY_PROPOSAL,
            &proposal.encode(),
            &self.handshake_key,
        )?;

        self.session_id = Some(keys.session_id);
        self.remote_identity = Some(reply.identity);
        context.peer_key = Some(peer_key);
        context.peer_ephemeral = Some(reply.ephemeral);
        context.keys = Some(keys);
        self.handshake = Some(context);
        self.set_state(SessionState::NegotiatingKeys)?;
        Ok(Unwrapped::Reply(frame))
    }

    /// Responder: ReceivedRequest -> NegotiatingKeys -> Established
    fn process_key_proposal(&mut self, payload: &[u8]) -> Result<Unwrapped> {
        let proposal = KeyProposal::decode(payload)?;

        let context = self.handshake.take().ok_or_else(missing_context)?;
        let peer_key = context.peer_key.as_ref().ok_or_else(missing_context)?;
        let peer_ephemeral = context.peer_ephemeral.ok_or_else(missing_context)?;
        let keys = context.keys.as_ref().ok_or_else(missing_context)?;
        let own_ephemeral = context.ephemeral.public_bytes();

        let remote_identity = self.remote_identity.as_deref().ok_or_else(missing_context)?;
        let proposal_transcript = handshake::transcript(
            &peer_ephemeral,
            &own_ephemeral,
            remote_identity,
            &self.identity,
        );
        Authentication::verify(peer_key, &proposal_transcript, &proposal.signature)?;
        self.set_state(SessionState::NegotiatingKeys)?;

        keys.verify_confirmation(&own_ephemeral, &proposal.mac)?;
        let mac = keys.confirmation_mac(&peer_ephemeral)?;
        let frame = frame::encode(
            MessageType::KeyConfirmation,
            step::KEY_CONFIRMATION,
            &mac,
            &self.handshake_key,
        )?;

        self.establish(Role::Responder, keys)?;
        Ok(Unwrapped::Reply(frame))
    }

    /// Initiator: NegotiatingKeys -> Established
    fn process_key_confirmation(&mut self, payload: &[u8]) -> Result<Unwrapped> {
        let mac = handshake::decode_confirmation(payload)?;

        let context = self.handshake.take().ok_or_else(missing_context)?;
        let keys = context.keys.as_ref().ok_or_else(missing_context)?;
        keys.verify_confirmation(&context.ephemeral.public_bytes(), &mac)?;

        self.establish(Role::Initiator, keys)?;
        Ok(Unwrapped::NoPayload)
    }

    fn establish(&mut self, role: Role, keys: &SessionKeys) -> Result<()> {
        let (send_key, send_sequence, receive_key, receive_sequence) = match role {
            Role::Initiator => (
                &keys.initiator_key,
                keys.initiator_sequence,
                &keys.responder_key,
                keys.responder_sequence,
            ),
            Role::Responder => (
                &keys.responder_key,
                keys.responder_sequence,
                &keys.initiator_key,
                keys.initiator_sequence,
            ),
        };

        let max_payload_len = self.config.max_payload_len;
        self.transport = Some(Transport {
            sealer: FrameSealer::new(FrameKey::new(**send_key), send_sequence, max_payload_len),
            opener: FrameOpener::new(
                FrameKey::new(**receive_key),
                receive_sequence,
                max_payload_len,
            ),
        });
        self.set_state(SessionState::Established)
    }
}

impl<R: PeerKeyResolver> Drop for SecureSession<R> {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl<R: PeerKeyResolver> fmt::Debug for SecureSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("state", &self.state.state())
            .field("role", &self.state.role())
            .field("session_id", &self.session_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Peers = HashMap<Vec<u8>, PublicKey>;

    fn pair() -> (SecureSession<Peers>, SecureSession<Peers>) {
        let alice_keys = KeyPair::generate();
        let bob_keys = KeyPair::generate();

        let mut alice_peers = HashMap::new();
        alice_peers.insert(b"bob".to_vec(), bob_keys.public_key());
        let mut bob_peers = HashMap::new();
        bob_peers.insert(b"alice".to_vec(), alice_keys.public_key());

        (
            SecureSession::new("alice", alice_keys, alice_peers).unwrap(),
            SecureSession::new("bob", bob_keys, bob_peers).unwrap(),
        )
    }

    fn reply(result: Result<Unwrapped>) -> Vec<u8> {
        match result.unwrap() {
            Unwrapped::Reply(frame) => frame,
            other => panic!("expected a reply, got {:?}", other),
        }
    }

    fn establish(alice: &mut SecureSession<Peers>, bob: &mut SecureSession<Peers>) {
        let request = alice.connect_request().unwrap();
        let connect_reply = reply(bob.unwrap(&request));
        let proposal = reply(alice.unwrap(&connect_reply));
        let confirmation = reply(bob.unwrap(&proposal));
        assert_eq!(alice.unwrap(&confirmation).unwrap(), Unwrapped::NoPayload);
    }

    #[test]
    fn test_handshake_states() {
        let (mut alice, mut bob) = pair();

        let request = alice.connect_request().unwrap();
        assert_eq!(alice.state(), SessionState::SentRequest);
        assert_eq!(alice.role(), Some(Role::Initiator));

        let connect_reply = reply(bob.unwrap(&request));
        assert_eq!(bob.state(), SessionState::ReceivedRequest);
        assert_eq!(bob.remote_peer_id(), Some(&b"alice"[..]));

        let proposal = reply(alice.unwrap(&connect_reply));
        assert_eq!(alice.state(), SessionState::NegotiatingKeys);
        assert_eq!(alice.remote_peer_id(), Some(&b"bob"[..]));

        let confirmation = reply(bob.unwrap(&proposal));
        assert!(bob.is_established());

        assert_eq!(alice.unwrap(&confirmation).unwrap(), Unwrapped::NoPayload);
        assert!(alice.is_established());
        assert_eq!(alice.session_id(), bob.session_id());
        assert!(alice.session_id().is_some());
    }

    #[test]
    fn test_wrap_unwrap() {
        let (mut alice, mut bob) = pair();
        establish(&mut alice, &mut bob);

        let frame = alice.wrap(b"hello bob").unwrap();
        assert_eq!(
            bob.unwrap(&frame).unwrap(),
            Unwrapped::Data(b"hello bob".to_vec())
        );

        let frame = bob.wrap(b"hello alice").unwrap();
        assert_eq!(
            alice.unwrap(&frame).unwrap(),
            Unwrapped::Data(b"hello alice".to_vec())
        );
    }

    #[test]
    fn test_second_connect_request_is_invalid_state() {
        let (mut alice, _) = pair();
        alice.connect_request().unwrap();

        assert!(matches!(alice.connect_request(), Err(Error::InvalidState { .. })));
        assert_eq!(alice.state(), SessionState::SentRequest);
    }

    #[test]
    fn test_wrap_before_established() {
        let (mut alice, _) = pair();
        assert!(matches!(alice.wrap(b"early"), Err(Error::InvalidState { .. })));
        assert_eq!(alice.state(), SessionState::Idle);
    }

    #[test]
    fn test_empty_identity_rejected() {
        let result = SecureSession::new(Vec::<u8>::new(), KeyPair::generate(), Peers::new());
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_observer_sees_every_transition() {
        let (alice, mut bob) = pair();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut alice = alice.with_state_observer(move |state| sink.lock().unwrap().push(state));

        establish(&mut alice, &mut bob);
        alice.destroy();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionState::SentRequest,
                SessionState::NegotiatingKeys,
                SessionState::Established,
                SessionState::Closed,
            ]
        );
    }

    #[test]
    fn test_duplicate_connect_request_is_replay() {
        let (mut alice, mut bob) = pair();

        let request = alice.connect_request().unwrap();
        let connect_reply = reply(bob.unwrap(&request));
        assert!(matches!(
            bob.unwrap(&request),
            Err(Error::ReplayDetected { sequence: 1 })
        ));
        assert_eq!(bob.state(), SessionState::ReceivedRequest);

        let proposal = reply(alice.unwrap(&connect_reply));
        let confirmation = reply(bob.unwrap(&proposal));
        assert_eq!(alice.unwrap(&confirmation).unwrap(), Unwrapped::NoPayload);
        assert!(alice.is_established() && bob.is_established());
    }

    #[test]
    fn test_destroy() {
        let (mut alice, mut bob) = pair();
        establish(&mut alice, &mut bob);

        alice.destroy();
        assert_eq!(alice.state(), SessionState::Closed);
        assert_eq!(alice.wrap(b"x"), Err(Error::SessionClosed));
    }

    #[test]
    fn test_debug_output() {
        let (alice, _) = pair();
        let debug = format!("{:?}", alice);
        assert!(debug.contains("alice"));
        assert!(debug.contains("Idle"));
    }
}
