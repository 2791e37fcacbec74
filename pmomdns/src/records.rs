//! Resource record types and their type-specific parsers.
//!
//! [`MdnsRecord::data`] is stored decompressed by the codec, so every parser
//! here works on the record bytes alone, without the surrounding packet.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use pmoutils::ByteReader;

use crate::MdnsError;
use crate::codec::POINTER_MASK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Cname,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Other(u16),
}

impl RecordType {
    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Cname => 5,
            RecordType::Ptr => 12,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Other(code) => code,
        }
    }
}

impl From<u16> for RecordType {
    fn from(code: u16) -> Self {
        match code {
            1 => RecordType::A,
            5 => RecordType::Cname,
            12 => RecordType::Ptr,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            other => RecordType::Other(other),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Cname => f.write_str("CNAME"),
            RecordType::Ptr => f.write_str("PTR"),
            RecordType::Txt => f.write_str("TXT"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Srv => f.write_str("SRV"),
            RecordType::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// One decoded resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnsRecord {
    pub name: String,
    pub rtype: RecordType,
    pub data: Vec<u8>,
}

/// Service location carried by an SRV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// A record: 4 raw bytes.
pub fn parse_a(data: &[u8]) -> Result<Ipv4Addr, MdnsError> {
    let octets: [u8; 4] = data.try_into().map_err(|_| MdnsError::BadRecord {
        rtype: RecordType::A,
        reason: "address is not 4 bytes long",
    })?;
    Ok(Ipv4Addr::from(octets))
}

/// PTR record: the pointed domain name, dotted.
pub fn parse_ptr(data: &[u8]) -> Result<String, MdnsError> {
    let labels = read_plain_labels(&mut ByteReader::new(data))?;
    Ok(join_labels(&labels))
}

/// First label of a PTR target, i.e. the service instance name
/// (`Chromecast-1234` in `Chromecast-1234._googlecast._tcp.local`).
pub fn parse_ptr_instance(data: &[u8]) -> Result<String, MdnsError> {
    let labels = read_plain_labels(&mut ByteReader::new(data))?;
    labels
        .first()
        .map(|label| String::from_utf8_lossy(label).into_owned())
        .ok_or(MdnsError::BadRecord {
            rtype: RecordType::Ptr,
            reason: "empty name",
        })
}

/// SRV record: priority, weight, port (network order), then the target host.
pub fn parse_srv(data: &[u8]) -> Result<SrvRecord, MdnsError> {
    let mut reader = ByteReader::new(data);
    let priority = reader.read_u16_be()?;
    let weight = reader.read_u16_be()?;
    let port = reader.read_u16_be()?;
    let labels = read_plain_labels(&mut reader)?;
    Ok(SrvRecord {
        priority,
        weight,
        port,
        target: join_labels(&labels),
    })
}

/// TXT record: `{len}{key=value}` chunks, split on the first `=`.
///
/// A chunk without `=` is a boolean attribute and maps to an empty value.
pub fn parse_txt(data: &[u8]) -> Result<HashMap<String, String>, MdnsError> {
    let mut reader = ByteReader::new(data);
    let mut entries = HashMap::new();

    while !reader.is_empty() {
        let chunk = reader.read_length_prefixed()?;
        if chunk.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(chunk);
        match text.split_once('=') {
            Some((key, value)) => entries.insert(key.to_string(), value.to_string()),
            None => entries.insert(text.into_owned(), String::new()),
        };
    }

    Ok(entries)
}

/// Reads uncompressed labels until the root label.
///
/// A trailing compression pointer ends the name (it cannot be resolved
/// without the original packet), as does the end of the data.
fn read_plain_labels(reader: &mut ByteReader<'_>) -> Result<Vec<Vec<u8>>, MdnsError> {
    let mut labels = Vec::new();

    while !reader.is_empty() {
        let len = reader.read_u8()?;
        if len == 0 {
            break;
        }
        if len & POINTER_MASK == POINTER_MASK {
            reader.skip(1)?;
            break;
        }
        if len & POINTER_MASK != 0 {
            return Err(MdnsError::ReservedLabelType(len));
        }
        labels.push(reader.read_bytes(len as usize)?.to_vec());
    }

    Ok(labels)
}

pub(crate) fn join_labels(labels: &[Vec<u8>]) -> String {
    labels
        .iter()
        .map(|label| String::from_utf8_lossy(label))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txt_key_values() {
        let txt = parse_txt(b"\x03a=1\x03b=2").unwrap();
        assert_eq!(txt.len(), 2);
        assert_eq!(txt["a"], "1");
        assert_eq!(txt["b"], "2");
    }

    #[test]
    fn test_txt_splits_on_first_equal_only() {
        let txt = parse_txt(b"\x0efn=Salon=TV 4K\x04flag\x00").unwrap();
        assert_eq!(txt["fn"], "Salon=TV 4K");
        assert_eq!(txt["flag"], "");
    }

    #[test]
    fn test_txt_truncated_chunk() {
        assert!(matches!(
            parse_txt(b"\x03a=1\x08b=2"),
            Err(MdnsError::Decode(_))
        ));
    }

    #[test]
    fn test_srv_port_and_target() {
        let mut data = vec![0x00, 0x00, 0x00, 0x00, 0x1F, 0x90];
        data.extend_from_slice(b"\x08cast-abc\x05local\x00");

        let srv = parse_srv(&data).unwrap();
        assert_eq!(srv.port, 8080);
        assert_eq!(srv.target, "cast-abc.local");
    }

    #[test]
    fn test_srv_too_short() {
        assert!(parse_srv(&[0x00, 0x01, 0x1F]).is_err());
    }

    #[test]
    fn test_a_record() {
        assert_eq!(
            parse_a(&[192, 168, 1, 42]).unwrap().to_string(),
            "192.168.1.42"
        );
        assert!(parse_a(&[192, 168, 1]).is_err());
    }

    #[test]
    fn test_ptr_strips_trailing_pointer() {
        // "Salon" suivi d'un pointeur vers "_googlecast._tcp.local" dans le paquet d'origine
        let data = b"\x05Salon\xc0\x0c";
        assert_eq!(parse_ptr(data).unwrap(), "Salon");
        assert_eq!(parse_ptr_instance(data).unwrap(), "Salon");
    }

    #[test]
    fn test_ptr_full_name() {
        let data = b"\x0fChromecast-1234\x0b_googlecast\x04_tcp\x05local\x00";
        assert_eq!(
            parse_ptr(data).unwrap(),
            "Chromecast-1234._googlecast._tcp.local"
        );
        assert_eq!(parse_ptr_instance(data).unwrap(), "Chromecast-1234");
    }

    #[test]
    fn test_record_type_codes() {
        for code in [1u16, 5, 12, 16, 28, 33, 47] {
            assert_eq!(RecordType::from(code).code(), code);
        }
        assert_eq!(RecordType::from(47), RecordType::Other(47));
    }
}
