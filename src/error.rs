/*!
Error handling for the secure protocol engines.

Errors never carry key material, secrets or intermediate protocol values.
Cryptographic failures are reported with fixed messages so that the error
text cannot be used as an oracle.
*/

use std::io;
use thiserror::Error;

/// Result type for the protocol engines
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the protocol engines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or wrong-curve key material
    #[error("Invalid key")]
    InvalidKey,

    /// Signature or zero-knowledge proof did not verify
    #[error("Verification failed")]
    VerificationFailed,

    /// Frame could not be parsed
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame authentication tag or key confirmation MAC did not verify
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Frame sequence is not newer than the last accepted one
    #[error("Replay detected: sequence {sequence}")]
    ReplayDetected {
        /// Sequence number carried by the rejected frame
        sequence: u32,
    },

    /// The peer key resolver does not know the presented identity
    #[error("Unknown peer")]
    UnknownPeer,

    /// The session previously failed and cannot be used any more
    #[error("Session failed")]
    SessionFailed,

    /// The session has been closed
    #[error("Session closed")]
    SessionClosed,

    /// A frame arrived that is not valid at this point of the protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The comparison completed with an error, no result is available
    #[error("Comparison ended with a protocol error")]
    ProtocolError,

    /// The comparison has not reached a result yet
    #[error("Comparison result not ready")]
    NotReady,

    /// Local API misuse: the call is not valid in the current state
    #[error("Invalid state: expected {expected}, but was {actual}")]
    InvalidState {
        expected: String,
        actual: String,
    },

    /// Invalid argument supplied by the caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unsupported wire protocol version
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The 32-bit sequence space of a direction is used up
    #[error("Sequence numbers exhausted")]
    SequenceExhausted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal cryptographic failure (limited details)
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

impl Error {
    /// Whether this error was caused by what the peer sent, as opposed to
    /// local misuse of the API.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey
                | Error::VerificationFailed
                | Error::MalformedFrame(_)
                | Error::AuthenticationFailed
                | Error::ReplayDetected { .. }
                | Error::UnknownPeer
                | Error::ProtocolViolation(_)
                | Error::ProtocolError
                | Error::UnsupportedVersion(_)
        )
    }
}

/// Create a protocol violation error
#[macro_export]
macro_rules! protocol_err {
    ($msg:expr) => {
        Err($crate::error::Error::ProtocolViolation($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::error::Error::ProtocolViolation(format!($fmt, $($arg)*)))
    };
}

/// Create a malformed frame error
#[macro_export]
macro_rules! format_err {
    ($msg:expr) => {
        Err($crate::error::Error::MalformedFrame($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::error::Error::MalformedFrame(format!($fmt, $($arg)*)))
    };
}

/// Create an invalid state error
#[macro_export]
macro_rules! invalid_state_err {
    ($expected:expr, $actual:expr) => {
        Err($crate::error::Error::InvalidState {
            expected: $expected.to_string(),
            actual: $actual.to_string(),
        })
    };
}

/// Convert from Error to io::Error (for callers embedding the engines in I/O code)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::InvalidKey
            | Error::MalformedFrame(_)
            | Error::ReplayDetected { .. }
            | Error::ProtocolViolation(_)
            | Error::ProtocolError
            | Error::UnsupportedVersion(_) => io::ErrorKind::InvalidData,
            Error::VerificationFailed | Error::AuthenticationFailed | Error::UnknownPeer => {
                io::ErrorKind::PermissionDenied
            }
            Error::SessionFailed | Error::SessionClosed => io::ErrorKind::NotConnected,
            Error::NotReady => io::ErrorKind::WouldBlock,
            Error::InvalidState { .. } | Error::InvalidParameter(_) | Error::InvalidConfig(_) => {
                io::ErrorKind::InvalidInput
            }
            Error::SequenceExhausted | Error::Crypto(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, error)
    }
}
