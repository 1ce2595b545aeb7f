//! On-disk framing of rollup records
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, whole frame)
//! +------------------+
//! | Node ID          | (length-prefixed string)
//! +------------------+
//! | Period Key       | (length-prefixed string)
//! +------------------+
//! | Payload          | (length-prefixed JSON bytes)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of everything above)
//! +------------------+
//! ```

use std::io::{self, Read};

use crc32fast::Hasher;

use crate::rollup::RollupKey;

/// length + 3 length prefixes + checksum
pub const MIN_FRAME_SIZE: usize = 4 + 4 + 4 + 4 + 4;

pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// One framed rollup record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub key: RollupKey,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(key: RollupKey, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(
            12 + self.key.node_id.len() + self.key.period.len() + self.payload.len(),
        );
        push_prefixed(&mut body, self.key.node_id.as_bytes());
        push_prefixed(&mut body, self.key.period.as_bytes());
        push_prefixed(&mut body, &self.payload);

        let frame_len = (4 + body.len() + 4) as u32;
        let mut frame = Vec::with_capacity(frame_len as usize);
        frame.extend_from_slice(&frame_len.to_le_bytes());
        frame.extend_from_slice(&body);
        let checksum = compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame
    }

    /// Parse one complete frame, verifying length and checksum.
    pub fn deserialize(data: &[u8]) -> io::Result<Self> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(invalid("frame too short"));
        }
        let frame_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if frame_len != data.len() {
            return Err(invalid(format!(
                "frame length {} does not match {} bytes",
                frame_len,
                data.len()
            )));
        }

        let checksum_at = frame_len - 4;
        let stored = u32::from_le_bytes([
            data[checksum_at],
            data[checksum_at + 1],
            data[checksum_at + 2],
            data[checksum_at + 3],
        ]);
        let computed = compute_checksum(&data[..checksum_at]);
        if stored != computed {
            return Err(invalid(format!(
                "checksum mismatch: computed {:08x}, stored {:08x}",
                computed, stored
            )));
        }

        let mut cursor = io::Cursor::new(&data[4..checksum_at]);
        let node_id = read_string(&mut cursor)?;
        let period = read_string(&mut cursor)?;
        let payload = read_prefixed(&mut cursor)?;

        Ok(Self {
            key: RollupKey { node_id, period },
            payload,
        })
    }

    /// Checksum over the payload only, used to short-circuit comparisons
    pub fn payload_checksum(&self) -> u32 {
        compute_checksum(&self.payload)
    }
}

fn push_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_prefixed<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let mut buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    String::from_utf8(read_prefixed(reader)?)
        .map_err(|e| invalid(format!("invalid UTF-8: {}", e)))
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(
            RollupKey {
                node_id: "node-7".into(),
                period: "2026-09-01T00:00:00Z/2026-10-01T00:00:00Z".into(),
            },
            br#"{"team":"1.00"}"#.to_vec(),
        )
    }

    #[test]
    fn test_round_trip() {
        let bytes = frame().serialize();
        assert_eq!(Frame::deserialize(&bytes).unwrap(), frame());
    }

    #[test]
    fn test_detects_bit_flip() {
        let mut bytes = frame().serialize();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        let err = Frame::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = frame().serialize();
        assert!(Frame::deserialize(&bytes[..bytes.len() - 1]).is_err());
        assert!(Frame::deserialize(&bytes[..8]).is_err());
    }

    #[test]
    fn test_checksum_deterministic() {
        assert_eq!(compute_checksum(b"abc"), compute_checksum(b"abc"));
        assert_ne!(compute_checksum(b"abc"), compute_checksum(b"abd"));
    }
}
