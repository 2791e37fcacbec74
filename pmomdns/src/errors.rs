use pmoutils::ByteReaderError;
use thiserror::Error;

use crate::records::RecordType;

#[derive(Debug, Error)]
pub enum MdnsError {
    #[error("Truncated or malformed packet: {0}")]
    Decode(#[from] ByteReaderError),
    #[error("Packet carries no answer record")]
    NoAnswers,
    #[error("Flags {0:#06x} do not describe a standard reply")]
    NotAReply(u16),
    #[error("Compression pointer to offset {offset} does not point backwards")]
    BadPointer { offset: usize },
    #[error("Reserved label type {0:#04x}")]
    ReservedLabelType(u8),
    #[error("Domain name longer than 255 bytes")]
    NameTooLong,
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("{rtype} record data is malformed: {reason}")]
    BadRecord {
        rtype: RecordType,
        reason: &'static str,
    },
    #[error("mDNS socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mDNS collector thread panicked")]
    CollectorPanicked,
}
