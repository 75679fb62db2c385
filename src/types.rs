/*!
Common types used by both protocol engines.
*/

use std::fmt;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Frame type tags
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum MessageType {
    /// Handshake step 1: identity, ephemeral key, signature
    ConnectRequest = 0x01,
    /// Handshake step 2: identity, ephemeral key, transcript signature
    ConnectReply = 0x02,
    /// Handshake step 3: transcript signature and key confirmation MAC
    KeyProposal = 0x03,
    /// Handshake step 4: key confirmation MAC
    KeyConfirmation = 0x04,
    /// Application data
    Data = 0x10,
    /// Session close notification
    Close = 0x11,
    /// One step of the comparator exchange
    CompareStep = 0x20,
}

impl MessageType {
    /// Convert a u8 value to a MessageType
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(MessageType::ConnectRequest),
            0x02 => Some(MessageType::ConnectReply),
            0x03 => Some(MessageType::KeyProposal),
            0x04 => Some(MessageType::KeyConfirmation),
            0x10 => Some(MessageType::Data),
            0x11 => Some(MessageType::Close),
            0x20 => Some(MessageType::CompareStep),
            _ => None,
        }
    }

    /// Get the u8 value of this MessageType
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Whether this frame belongs to the session handshake
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            MessageType::ConnectRequest
                | MessageType::ConnectReply
                | MessageType::KeyProposal
                | MessageType::KeyConfirmation
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversion() {
        for t in [
            MessageType::ConnectRequest,
            MessageType::ConnectReply,
            MessageType::KeyProposal,
            MessageType::KeyConfirmation,
            MessageType::Data,
            MessageType::Close,
            MessageType::CompareStep,
        ] {
            assert_eq!(MessageType::from_u8(t.as_u8()), Some(t));
        }

        assert_eq!(MessageType::from_u8(0x00), None);
        assert_eq!(MessageType::from_u8(0x05), None);
        assert_eq!(MessageType::from_u8(0xFF), None);
    }

    #[test]
    fn test_handshake_classification() {
        assert!(MessageType::ConnectRequest.is_handshake());
        assert!(MessageType::KeyConfirmation.is_handshake());
        assert!(!MessageType::Data.is_handshake());
        assert!(!MessageType::CompareStep.is_handshake());
    }
}
