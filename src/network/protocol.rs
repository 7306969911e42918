//! Election Protocol
//!
//! Defines the wire protocol for communication between nodes.

use serde::{Deserialize, Serialize};

use crate::state::{ElectionPhase, NodeId};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol messages for node communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    // ========== Requests ==========
    /// Lower-ranked node contesting for coordinator
    Election { invoker_id: NodeId },

    /// Winner announcing itself
    NewCoordinator { coordinator_id: NodeId },

    /// Liveness probe sent to the coordinator
    HandleCommunication { node_id: NodeId },

    /// Operator status query
    StatusRequest,

    // ========== Replies ==========
    /// Positive reply
    Ok,

    /// Election request declined (invoker does not rank below us)
    NotOk,

    /// Acknowledgment with no content
    Ack,

    /// Status reply
    StatusResponse {
        node_id: NodeId,
        coordinator_id: NodeId,
        phase: ElectionPhase,
        members: usize,
    },

    /// Request could not be served
    Error { message: String },
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Election { .. } => "Election",
            Message::NewCoordinator { .. } => "NewCoordinator",
            Message::HandleCommunication { .. } => "HandleCommunication",
            Message::StatusRequest => "StatusRequest",
            Message::Ok => "Ok",
            Message::NotOk => "NotOk",
            Message::Ack => "Ack",
            Message::StatusResponse { .. } => "StatusResponse",
            Message::Error { .. } => "Error",
        }
    }

    /// Whether this message is a request a server should answer
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Message::Election { .. }
                | Message::NewCoordinator { .. }
                | Message::HandleCommunication { .. }
                | Message::StatusRequest
        )
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            checksum: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = Message::StatusResponse {
            node_id: 3,
            coordinator_id: 5,
            phase: ElectionPhase::ElectionInProgress,
            members: 5,
        };

        let bytes = msg.serialize().unwrap();
        let restored = Message::deserialize(&bytes).unwrap();
        assert_eq!(restored, msg);
        assert_eq!(restored.type_name(), "StatusResponse");
        assert!(!restored.is_request());
    }

    #[test]
    fn test_requests_are_classified() {
        assert!(Message::Election { invoker_id: 1 }.is_request());
        assert!(Message::NewCoordinator { coordinator_id: 4 }.is_request());
        assert!(Message::HandleCommunication { node_id: 2 }.is_request());
        assert!(!Message::Ok.is_request());
        assert!(!Message::Ack.is_request());
    }

    #[test]
    fn test_frame_header() {
        let data = b"election from 2";
        let header = FrameHeader::new(data);
        let restored = FrameHeader::from_bytes(&header.to_bytes());

        assert_eq!(header, restored);
        assert_eq!(restored.length as usize, data.len());
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(Message::deserialize(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }
}
