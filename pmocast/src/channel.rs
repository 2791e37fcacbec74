//! `CastMessage` et trames du canal Cast.
//!
//! Une trame est `{longueur u32 big-endian}{CastMessage sérialisé}`. Le
//! message est un protobuf à sept champs, encodé à la main :
//!
//! | champ | nom              | type    |
//! |-------|------------------|---------|
//! | 1     | protocol_version | varint  |
//! | 2     | source_id        | string  |
//! | 3     | destination_id   | string  |
//! | 4     | namespace        | string  |
//! | 5     | payload_type     | varint (0 = STRING, 1 = BINARY) |
//! | 6     | payload_utf8     | string  |
//! | 7     | payload_binary   | bytes   |

use pmoutils::ByteReader;
use serde_json::Value;

use crate::CastError;

/// Taille maximale d'un message, en-tête de longueur exclu
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// CASTV2_1_0
pub const PROTOCOL_VERSION: u64 = 0;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

const PAYLOAD_STRING: u64 = 0;
const PAYLOAD_BINARY: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastPayload {
    Utf8(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMessage {
    pub protocol_version: u64,
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload: CastPayload,
}

impl CastMessage {
    /// Message texte portant `payload` sérialisé en JSON.
    pub fn json(source_id: &str, destination_id: &str, namespace: &str, payload: &Value) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            source_id: source_id.to_string(),
            destination_id: destination_id.to_string(),
            namespace: namespace.to_string(),
            payload: CastPayload::Utf8(payload.to_string()),
        }
    }

    /// Parse le payload en JSON, qu'il soit texte ou binaire.
    pub fn payload_json(&self) -> Result<Value, CastError> {
        let value = match &self.payload {
            CastPayload::Utf8(text) => serde_json::from_str(text)?,
            CastPayload::Binary(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(value)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint_field(&mut out, 1, self.protocol_version);
        write_bytes_field(&mut out, 2, self.source_id.as_bytes());
        write_bytes_field(&mut out, 3, self.destination_id.as_bytes());
        write_bytes_field(&mut out, 4, self.namespace.as_bytes());
        match &self.payload {
            CastPayload::Utf8(text) => {
                write_varint_field(&mut out, 5, PAYLOAD_STRING);
                write_bytes_field(&mut out, 6, text.as_bytes());
            }
            CastPayload::Binary(bytes) => {
                write_varint_field(&mut out, 5, PAYLOAD_BINARY);
                write_bytes_field(&mut out, 7, bytes);
            }
        }
        out
    }

    /// Décode un message. Les champs inconnus sont sautés.
    pub fn decode(bytes: &[u8]) -> Result<Self, CastError> {
        let mut reader = ByteReader::new(bytes);
        let mut protocol_version = PROTOCOL_VERSION;
        let mut source_id = String::new();
        let mut destination_id = String::new();
        let mut namespace = String::new();
        let mut payload_type = PAYLOAD_STRING;
        let mut payload_utf8 = String::new();
        let mut payload_binary = Vec::new();

        while !reader.is_empty() {
            let key = read_varint(&mut reader)?;
            let field = key >> 3;
            let wire_type = (key & 0x07) as u8;

            match (field, wire_type) {
                (1, WIRE_VARINT) => protocol_version = read_varint(&mut reader)?,
                (5, WIRE_VARINT) => payload_type = read_varint(&mut reader)?,
                (_, WIRE_VARINT) => {
                    read_varint(&mut reader)?;
                }
                (_, WIRE_LEN) => {
                    let len = read_varint(&mut reader)?;
                    let len = usize::try_from(len)
                        .map_err(|_| CastError::Decode(format!("field {field} too long")))?;
                    let value = reader.read_bytes(len).map_err(decode_error)?;
                    match field {
                        2 => source_id = utf8(value, "source_id")?,
                        3 => destination_id = utf8(value, "destination_id")?,
                        4 => namespace = utf8(value, "namespace")?,
                        6 => payload_utf8 = utf8(value, "payload_utf8")?,
                        7 => payload_binary = value.to_vec(),
                        _ => {}
                    }
                }
                (_, WIRE_FIXED64) => reader.skip(8).map_err(decode_error)?,
                (_, WIRE_FIXED32) => reader.skip(4).map_err(decode_error)?,
                (_, other) => {
                    return Err(CastError::Decode(format!(
                        "unsupported wire type {other} for field {field}"
                    )));
                }
            }
        }

        let payload = if payload_type == PAYLOAD_BINARY {
            CastPayload::Binary(payload_binary)
        } else {
            CastPayload::Utf8(payload_utf8)
        };

        Ok(Self {
            protocol_version,
            source_id,
            destination_id,
            namespace,
            payload,
        })
    }
}

/// Encode `message` dans une trame prête à écrire.
pub fn encode_frame(message: &CastMessage) -> Result<Vec<u8>, CastError> {
    let body = message.encode();
    if body.len() > MAX_FRAME_LEN {
        return Err(CastError::FrameTooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reconstitue les trames d'un flux lu par morceaux.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Octets restants d'une trame trop grande, jetés à mesure qu'ils arrivent
    skip: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Octets reçus mais pas encore consommés
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Prochain message complet, `None` s'il manque encore des octets.
    ///
    /// Une trame illisible est consommée avant que l'erreur ne soit renvoyée,
    /// la suivante reste décodable. Une trame annoncée au-delà de
    /// [`MAX_FRAME_LEN`] est signalée une fois puis sautée sans être gardée en
    /// mémoire.
    pub fn next_frame(&mut self) -> Result<Option<CastMessage>, CastError> {
        if self.skip > 0 {
            let dropped = self.skip.min(self.buf.len());
            self.buf.drain(..dropped);
            self.skip -= dropped;
            if self.skip > 0 {
                return Ok(None);
            }
        }

        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_FRAME_LEN {
            self.buf.drain(..4);
            self.skip = len;
            return Err(CastError::FrameTooLarge(len));
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buf.drain(..4 + len).skip(4).collect();
        CastMessage::decode(&frame).map(Some)
    }
}

fn write_varint_field(out: &mut Vec<u8>, field_number: u64, value: u64) {
    write_varint(out, field_number << 3);
    write_varint(out, value);
}

fn write_bytes_field(out: &mut Vec<u8>, field_number: u64, value: &[u8]) {
    write_varint(out, (field_number << 3) | WIRE_LEN as u64);
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(reader: &mut ByteReader<'_>) -> Result<u64, CastError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = reader.read_u8().map_err(decode_error)?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CastError::Decode("varint longer than 10 bytes".to_string()))
}

fn utf8(bytes: &[u8], field: &str) -> Result<String, CastError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CastError::Decode(format!("{field} is not valid UTF-8")))
}

fn decode_error(err: pmoutils::ByteReaderError) -> CastError {
    CastError::Decode(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces;
    use serde_json::json;

    #[test]
    fn test_encode_matches_protobuf_layout() {
        let msg = CastMessage::json("s", "r", "n", &json!({"a": 1}));
        let bytes = msg.encode();

        assert_eq!(
            bytes,
            [
                0x08, 0x00, // protocol_version
                0x12, 0x01, b's', // source_id
                0x1a, 0x01, b'r', // destination_id
                0x22, 0x01, b'n', // namespace
                0x28, 0x00, // payload_type
                0x32, 0x07, b'{', b'"', b'a', b'"', b':', b'1', b'}', // payload_utf8
            ]
        );
    }

    #[test]
    fn test_decode_binary_payload_and_unknown_fields() {
        let mut bytes = Vec::new();
        write_varint_field(&mut bytes, 1, 0);
        write_bytes_field(&mut bytes, 2, b"receiver-0");
        write_bytes_field(&mut bytes, 3, b"sender-0");
        write_bytes_field(&mut bytes, 4, namespaces::RECEIVER.as_bytes());
        write_varint_field(&mut bytes, 5, PAYLOAD_BINARY);
        write_bytes_field(&mut bytes, 7, br#"{"requestId":7}"#);
        // champs inconnus : varint, fixed32, fixed64
        write_varint_field(&mut bytes, 9, 300);
        bytes.extend_from_slice(&[(10 << 3) | 5, 1, 2, 3, 4]);
        bytes.extend_from_slice(&[(11 << 3) | 1, 1, 2, 3, 4, 5, 6, 7, 8]);

        let msg = CastMessage::decode(&bytes).unwrap();
        assert_eq!(msg.source_id, "receiver-0");
        assert_eq!(msg.namespace, namespaces::RECEIVER);
        assert_eq!(msg.payload, CastPayload::Binary(br#"{"requestId":7}"#.to_vec()));
        assert_eq!(msg.payload_json().unwrap()["requestId"], 7);
    }

    #[test]
    fn test_decode_rejects_truncated_field() {
        let mut bytes = CastMessage::json("s", "r", "n", &json!({})).encode();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(CastMessage::decode(&bytes), Err(CastError::Decode(_))));

        // wire type 3 (start group) non supporté
        assert!(matches!(
            CastMessage::decode(&[(2 << 3) | 3]),
            Err(CastError::Decode(_))
        ));
    }

    #[test]
    fn test_varint_multi_byte() {
        let mut out = Vec::new();
        write_varint(&mut out, 300);
        assert_eq!(out, [0xAC, 0x02]);
        assert_eq!(read_varint(&mut ByteReader::new(&out)).unwrap(), 300);
    }

    #[test]
    fn test_frame_decoder_handles_partial_reads() {
        let first = CastMessage::json(
            namespaces::SENDER_ID,
            namespaces::RECEIVER_ID,
            namespaces::HEARTBEAT,
            &json!({"type": "PING"}),
        );
        let second = CastMessage::json(
            namespaces::SENDER_ID,
            namespaces::RECEIVER_ID,
            namespaces::RECEIVER,
            &json!({"type": "GET_STATUS", "requestId": 2}),
        );
        let mut stream = encode_frame(&first).unwrap();
        stream.extend(encode_frame(&second).unwrap());

        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for chunk in stream.chunks(5) {
            decoder.extend(chunk);
            while let Some(msg) = decoder.next_frame().unwrap() {
                decoded.push(msg);
            }
        }

        assert_eq!(decoded, vec![first, second]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_frame_decoder_skips_bad_frame() {
        let good = CastMessage::json("a", "b", "c", &json!({"ok": true}));
        let mut stream = vec![0, 0, 0, 1, 0xFF];
        stream.extend(encode_frame(&good).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&stream);

        assert!(decoder.next_frame().is_err());
        assert_eq!(decoder.next_frame().unwrap(), Some(good));
    }

    #[test]
    fn test_oversized_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&((MAX_FRAME_LEN as u32 + 1).to_be_bytes()));
        assert!(matches!(
            decoder.next_frame(),
            Err(CastError::FrameTooLarge(_))
        ));
        assert_eq!(decoder.buffered(), 0);

        let big = CastMessage {
            protocol_version: PROTOCOL_VERSION,
            source_id: String::new(),
            destination_id: String::new(),
            namespace: String::new(),
            payload: CastPayload::Binary(vec![0; MAX_FRAME_LEN]),
        };
        assert!(matches!(encode_frame(&big), Err(CastError::FrameTooLarge(_))));
    }

    #[test]
    fn test_stream_resyncs_after_oversized_frame() {
        let good = CastMessage::json("a", "b", "c", &json!({"type": "PONG"}));
        let oversized = MAX_FRAME_LEN + 10;
        let mut stream = (oversized as u32).to_be_bytes().to_vec();
        stream.extend(vec![0xAB; oversized]);
        stream.extend(encode_frame(&good).unwrap());

        let mut decoder = FrameDecoder::new();
        let mut errors = 0;
        let mut decoded = Vec::new();
        for chunk in stream.chunks(4096) {
            decoder.extend(chunk);
            loop {
                match decoder.next_frame() {
                    Ok(Some(msg)) => decoded.push(msg),
                    Ok(None) => break,
                    Err(CastError::FrameTooLarge(len)) => {
                        assert_eq!(len, oversized);
                        errors += 1;
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            assert!(decoder.buffered() <= 4096);
        }

        assert_eq!(errors, 1);
        assert_eq!(decoded, vec![good]);
        assert_eq!(decoder.buffered(), 0);
    }
}
