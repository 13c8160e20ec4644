//! DCP change-stream records
//!
//! Plain data decoded by the stream codec and published upward as
//! [`super::ResponseEvent::Dcp`].

use serde::{Deserialize, Serialize};

/// Which side of the stream this client opens as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    Producer,
    /// Pull data from the server
    Consumer,
}

impl ConnectionType {
    /// On-wire representation
    pub fn flags(self) -> u32 {
        match self {
            Self::Producer => 0,
            Self::Consumer => 1,
        }
    }
}

/// Document created or updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationMessage {
    pub total_body_length: u32,
    pub partition: u16,
    pub key: String,
    pub content: Vec<u8>,
    pub expiration: u32,
    pub by_sequence_number: u64,
    pub revision_sequence_number: u64,
    pub flags: u32,
    pub lock_time: u32,
    pub cas: u64,
    pub bucket: String,
}

/// Document removed or expired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMessage {
    pub total_body_length: u32,
    pub partition: u16,
    pub key: String,
    pub cas: u64,
    pub by_sequence_number: u64,
    pub revision_sequence_number: u64,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DcpEvent {
    Mutation(MutationMessage),
    Remove(RemoveMessage),
}

impl DcpEvent {
    pub fn partition(&self) -> u16 {
        match self {
            Self::Mutation(m) => m.partition,
            Self::Remove(r) => r.partition,
        }
    }

    pub fn by_sequence_number(&self) -> u64 {
        match self {
            Self::Mutation(m) => m.by_sequence_number,
            Self::Remove(r) => r.by_sequence_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_flags() {
        assert_eq!(ConnectionType::Producer.flags(), 0);
        assert_eq!(ConnectionType::Consumer.flags(), 1);
    }

    #[test]
    fn test_event_accessors() {
        let event = DcpEvent::Remove(RemoveMessage {
            total_body_length: 0,
            partition: 42,
            key: "user::1".to_string(),
            cas: 99,
            by_sequence_number: 1001,
            revision_sequence_number: 3,
            bucket: "travel".to_string(),
        });

        assert_eq!(event.partition(), 42);
        assert_eq!(event.by_sequence_number(), 1001);
    }
}
