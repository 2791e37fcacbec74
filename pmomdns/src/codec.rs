//! DNS wire format as used by mDNS.
//!
//! Only what a PTR discovery round needs: building a one-question query and
//! decoding the replies, compressed names included.

use pmoutils::ByteReader;

use crate::MdnsError;
use crate::records::{MdnsRecord, RecordType, join_labels};

pub const HEADER_LEN: usize = 12;

/// Longest label: a length byte with one of the top two bits set is read back
/// as a compression pointer or a reserved label type.
pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_LEN: usize = 255;

pub const POINTER_MASK: u8 = 0xC0;

pub const FLAG_RESPONSE: u16 = 0x8000;
pub const FLAG_RECURSION_DESIRED: u16 = 0x0100;
const OPCODE_MASK: u16 = 0x7800;
const RCODE_MASK: u16 = 0x000F;

pub const CLASS_IN: u16 = 1;
/// mDNS reuses the top bit of the class field as "cache flush".
const CLASS_MASK: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// Header of a one-question query with recursion desired.
    pub fn query(id: u16) -> Self {
        Self {
            id,
            flags: FLAG_RECURSION_DESIRED,
            qdcount: 1,
            ..Default::default()
        }
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, MdnsError> {
        Ok(Self {
            id: reader.read_u16_be()?,
            flags: reader.read_u16_be()?,
            qdcount: reader.read_u16_be()?,
            ancount: reader.read_u16_be()?,
            nscount: reader.read_u16_be()?,
            arcount: reader.read_u16_be()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        for field in [
            self.id,
            self.flags,
            self.qdcount,
            self.ancount,
            self.nscount,
            self.arcount,
        ] {
            out.extend_from_slice(&field.to_be_bytes());
        }
    }

    /// QR set, standard query opcode, no error.
    pub fn is_standard_reply(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
            && self.flags & OPCODE_MASK == 0
            && self.flags & RCODE_MASK == 0
    }

    fn record_count(&self) -> usize {
        self.ancount as usize + self.nscount as usize + self.arcount as usize
    }
}

/// A reply packet, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResponse {
    pub header: DnsHeader,
    /// Name of the first question, or of the first answer when the reply
    /// carries no question section (the usual mDNS case).
    pub query_name: String,
    pub query_type: RecordType,
    /// Answer, authority and additional records, in packet order.
    pub records: Vec<MdnsRecord>,
}

/// Appends `name` as length-prefixed labels ended by the root label.
pub fn encode_name(name: &str, out: &mut Vec<u8>) -> Result<(), MdnsError> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(MdnsError::InvalidName {
            name: name.to_string(),
            reason: "empty name",
        });
    }

    let start = out.len();
    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(MdnsError::InvalidName {
                name: name.to_string(),
                reason: "empty label",
            });
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(MdnsError::InvalidName {
                name: name.to_string(),
                reason: "label longer than 63 bytes",
            });
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);

    if out.len() - start > MAX_NAME_LEN {
        out.truncate(start);
        return Err(MdnsError::NameTooLong);
    }
    Ok(())
}

/// Builds a PTR/IN query for `name`.
pub fn build_query(name: &str, transaction_id: u16) -> Result<Vec<u8>, MdnsError> {
    let mut packet = Vec::with_capacity(HEADER_LEN + name.len() + 6);
    DnsHeader::query(transaction_id).write(&mut packet);
    encode_name(name, &mut packet)?;
    packet.extend_from_slice(&RecordType::Ptr.code().to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(packet)
}

/// Decodes a reply packet.
///
/// Fails with [`MdnsError::NoAnswers`] when the answer count is zero and,
/// if `validate_flags` is set, with [`MdnsError::NotAReply`] when the flags
/// do not describe a standard reply.
pub fn decode_response(packet: &[u8], validate_flags: bool) -> Result<DecodedResponse, MdnsError> {
    let mut reader = ByteReader::new(packet);
    let header = DnsHeader::read(&mut reader)?;

    if header.ancount == 0 {
        return Err(MdnsError::NoAnswers);
    }
    if validate_flags && !header.is_standard_reply() {
        return Err(MdnsError::NotAReply(header.flags));
    }

    let mut question = None;
    for _ in 0..header.qdcount {
        let name = read_name(&mut reader)?;
        let qtype = RecordType::from(reader.read_u16_be()?);
        reader.skip(2)?; // qclass
        question.get_or_insert((join_labels(&name), qtype));
    }

    let mut records = Vec::with_capacity(header.record_count());
    for _ in 0..header.record_count() {
        records.push(read_record(&mut reader)?);
    }

    let (query_name, query_type) = match question {
        Some(question) => question,
        None => {
            let first = &records[0];
            (first.name.clone(), first.rtype)
        }
    };

    Ok(DecodedResponse {
        header,
        query_name,
        query_type,
        records,
    })
}

fn read_record(reader: &mut ByteReader<'_>) -> Result<MdnsRecord, MdnsError> {
    let name = join_labels(&read_name(reader)?);
    let rtype = RecordType::from(reader.read_u16_be()?);
    let class = reader.read_u16_be()? & CLASS_MASK;
    reader.skip(4)?; // ttl
    let rdlen = reader.read_u16_be()? as usize;
    let data_start = reader.position();
    let raw = reader.read_bytes(rdlen)?;

    let data = match rtype {
        RecordType::Ptr | RecordType::Cname => {
            let mut rdata = ByteReader::at(reader.buffer(), data_start)?;
            encode_labels(&read_name(&mut rdata)?)
        }
        RecordType::Srv if rdlen > 6 => {
            let mut rdata = ByteReader::at(reader.buffer(), data_start)?;
            let mut data = rdata.read_bytes(6)?.to_vec();
            data.extend_from_slice(&encode_labels(&read_name(&mut rdata)?));
            data
        }
        _ => raw.to_vec(),
    };

    if class != CLASS_IN {
        tracing::trace!("{} record {} has class {}", rtype, name, class);
    }

    Ok(MdnsRecord { name, rtype, data })
}

/// Reads a possibly compressed name starting at the reader position and
/// leaves the reader just after it.
///
/// Each compression pointer must target an offset strictly before the start
/// of the segment holding it, so following pointers always terminates.
pub fn read_name(reader: &mut ByteReader<'_>) -> Result<Vec<Vec<u8>>, MdnsError> {
    let packet = reader.buffer();
    let mut cursor = reader.clone();
    let mut segment_start = cursor.position();
    let mut resume_at = None;
    let mut labels = Vec::new();
    let mut encoded_len = 1;

    loop {
        let len = cursor.read_u8()?;
        match len & POINTER_MASK {
            0x00 if len == 0 => break,
            0x00 => {
                encoded_len += len as usize + 1;
                if encoded_len > MAX_NAME_LEN {
                    return Err(MdnsError::NameTooLong);
                }
                labels.push(cursor.read_bytes(len as usize)?.to_vec());
            }
            POINTER_MASK => {
                let low = cursor.read_u8()?;
                let offset = (((len & !POINTER_MASK) as usize) << 8) | low as usize;
                if offset >= segment_start {
                    return Err(MdnsError::BadPointer { offset });
                }
                resume_at.get_or_insert(cursor.position());
                segment_start = offset;
                cursor = ByteReader::at(packet, offset)?;
            }
            _ => return Err(MdnsError::ReservedLabelType(len)),
        }
    }

    reader.seek(resume_at.unwrap_or(cursor.position()))?;
    Ok(labels)
}

fn encode_labels(labels: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    for label in labels {
        out.push(label.len() as u8);
        out.extend_from_slice(label);
    }
    out.push(0);
    out
}
