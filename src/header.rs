/*!
Frame header implementation.
*/

use crate::{
    constants::{VERSION, sizes::HEADER_SIZE},
    error::{Error, Result},
    format_err,
    types::MessageType,
};
use byteorder::{BigEndian, ByteOrder};

/// Frame header (10 bytes)
///
/// The header has the following format:
/// - Version (1 byte): Protocol version, currently 0x01
/// - Frame Type (1 byte): see `MessageType`
/// - Sequence Number (4 bytes, big-endian)
/// - Payload Length (4 bytes, big-endian): sealed payload length, tag included
///
/// The encoded header is the associated data of the payload seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version
    pub version: u8,
    /// Frame type
    pub msg_type: MessageType,
    /// Sequence number
    pub seq_num: u32,
    /// Payload length
    pub payload_len: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(msg_type: MessageType, seq_num: u32, payload_len: u32) -> Self {
        Self {
            version: VERSION,
            msg_type,
            seq_num,
            payload_len,
        }
    }

    /// Convert the header to bytes (10 bytes)
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[1] = self.msg_type.as_u8();
        BigEndian::write_u32(&mut bytes[2..6], self.seq_num);
        BigEndian::write_u32(&mut bytes[6..10], self.payload_len);
        bytes
    }

    /// Parse a header from the front of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return format_err!("header too short");
        }

        let version = bytes[0];
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let msg_type = match MessageType::from_u8(bytes[1]) {
            Some(t) => t,
            None => return format_err!("unknown frame type: {}", bytes[1]),
        };

        let seq_num = BigEndian::read_u32(&bytes[2..6]);
        let payload_len = BigEndian::read_u32(&bytes[6..10]);

        Ok(Self {
            version,
            msg_type,
            seq_num,
            payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_serialization() {
        let header = FrameHeader::new(MessageType::Data, 42, 100);
        let bytes = header.to_bytes();
        let parsed = FrameHeader::from_bytes(&bytes).unwrap();

        assert_eq!(header, parsed);
        assert_eq!(parsed.version, VERSION);
        assert_eq!(parsed.msg_type, MessageType::Data);
        assert_eq!(parsed.seq_num, 42);
        assert_eq!(parsed.payload_len, 100);
    }

    #[test]
    fn test_header_layout() {
        let bytes = FrameHeader::new(MessageType::Close, 0x01020304, 0x0A0B0C0D).to_bytes();
        assert_eq!(bytes, [VERSION, 0x11, 1, 2, 3, 4, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_header_invalid_version() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = 0xFF;
        bytes[1] = MessageType::Data.as_u8();

        assert_eq!(
            FrameHeader::from_bytes(&bytes),
            Err(Error::UnsupportedVersion(0xFF))
        );
    }

    #[test]
    fn test_header_invalid_type() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = VERSION;
        bytes[1] = 0x42;

        let result = FrameHeader::from_bytes(&bytes);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_header_too_short() {
        let bytes = [0u8; 5];
        let result = FrameHeader::from_bytes(&bytes);
        assert!(matches!(result, Err(Error::MalformedFrame(_))));
    }
}
