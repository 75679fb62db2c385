/*!
Session state management.

This module defines session states and the state machine for session
progression. The engine asks the `StateManager` which frames and calls are
allowed before acting, and moves it forward only after a step succeeded.
*/

use crate::{error::Result, invalid_state_err, types::MessageType};
use std::fmt;

/// Session state for tracking handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Nothing sent or received yet
    Idle,
    /// ConnectRequest sent (initiator)
    SentRequest,
    /// ConnectRequest accepted and ConnectReply sent (responder)
    ReceivedRequest,
    /// Keys derived, waiting for key confirmation
    NegotiatingKeys,
    /// Session established and ready for data transfer
    Established,
    /// A protocol step failed; key material wiped
    Failed,
    /// Session closed; key material wiped
    Closed,
}

impl SessionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::SentRequest => write!(f, "SentRequest"),
            SessionState::ReceivedRequest => write!(f, "ReceivedRequest"),
            SessionState::NegotiatingKeys => write!(f, "NegotiatingKeys"),
            SessionState::Established => write!(f, "Established"),
            SessionState::Failed => write!(f, "Failed"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Endpoint role in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the ConnectRequest
    Initiator,
    /// Answered a ConnectRequest
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "Initiator"),
            Role::Responder => write!(f, "Responder"),
        }
    }
}

/// Session state manager
///
/// Handles state transitions and validation of operations
/// based on the current session state.
#[derive(Debug, Clone, Copy)]
pub struct StateManager {
    state: SessionState,
    role: Option<Role>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a new state manager in `Idle`
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            role: None,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Role, fixed by the first handshake step
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Check if the session is in the given state
    pub fn is_state(&self, state: SessionState) -> bool {
        self.state == state
    }

    /// Check if sending a ConnectRequest is allowed
    pub fn can_connect(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Check if data transfer is allowed
    pub fn can_transfer_data(&self) -> bool {
        self.state == SessionState::Established
    }

    /// The handshake frame this endpoint is waiting for, if any
    pub fn expected_handshake_frame(&self) -> Option<MessageType> {
        match (self.state, self.role) {
            (SessionState::Idle, _) => Some(MessageType::ConnectRequest),
            (SessionState::SentRequest, _) => Some(MessageType::ConnectReply),
            (SessionState::ReceivedRequest, _) => Some(MessageType::KeyProposal),
            (SessionState::NegotiatingKeys, Some(Role::Initiator)) => {
                Some(MessageType::KeyConfirmation)
            }
            _ => None,
        }
    }

    /// Check whether `from -> to` is a legal edge of the state machine
    pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
        use SessionState::*;
        match (from, to) {
            (Idle, SentRequest) | (Idle, ReceivedRequest) => true,
            (SentRequest, NegotiatingKeys) | (ReceivedRequest, NegotiatingKeys) => true,
            (NegotiatingKeys, Established) => true,
            (from, Failed) | (from, Closed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move to `to`, recording the role on the first handshake step
    pub fn transition_to(&mut self, to: SessionState) -> Result<()> {
        if !Self::is_valid_transition(self.state, to) {
            return invalid_state_err!(format!("a state leading to {}", to), self.state);
        }

        match to {
            SessionState::SentRequest => self.role = Some(Role::Initiator),
            SessionState::ReceivedRequest => self.role = Some(Role::Responder),
            _ => {}
        }
        self.state = to;
        Ok(())
    }
}
