//! Pentair frame encoder/decoder.
//!
//! The Pentair RS-485 protocol uses checksummed binary frames on a shared
//! half-duplex bus. This module handles the pure byte-level encoding and
//! decoding of one frame; it performs no I/O and holds no state.
//!
//! # Frame format
//!
//! ```text
//! 0xFF 0x00 0xFF 0xA5 <ver> <dst> <src> <cmd> <len> [<data>...] <ck_hi> <ck_lo>
//! ```
//!
//! - Marker: fixed 4-byte sequence `FF 00 FF A5` (the `A5` doubles as the
//!   first checksummed byte)
//! - `ver`: protocol version, `0x00` in all observed traffic
//! - `dst` / `src`: bus addresses (see [`crate::address`])
//! - `cmd`: command/function identifier (CFI)
//! - `len`: payload length, 0–255
//! - Checksum: 16-bit sum of every byte from the `0xA5` through the last
//!   data byte inclusive, transmitted big-endian. The three leading marker
//!   bytes and the checksum bytes themselves are never summed.

use bytes::{BufMut, BytesMut};

use pumpbus_core::{Error, Result};

/// The 4-byte frame marker. The final `0xA5` starts the checksummed span.
pub const MARKER: [u8; 4] = [0xFF, 0x00, 0xFF, 0xA5];

/// Protocol version byte (`0x00` in all observed traffic).
pub const PROTOCOL_VERSION: u8 = 0x00;

/// Minimum total frame length: marker(4) + header(5) + checksum(2), LEN=0.
pub const MIN_FRAME_LEN: usize = 11;

/// Maximum payload length representable in the LEN byte.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Offset of the `0xA5` lead byte (start of the checksummed span).
const LEAD_IDX: usize = 3;
/// Offset of the version byte.
const VER_IDX: usize = 4;
/// Offset of the destination address byte.
const DST_IDX: usize = 5;
/// Offset of the source address byte.
const SRC_IDX: usize = 6;
/// Offset of the command byte.
const CMD_IDX: usize = 7;
/// Offset of the payload-length byte.
const LEN_IDX: usize = 8;
/// Offset of the first payload byte.
const DATA_IDX: usize = 9;

/// A parsed Pentair frame.
///
/// This is the protocol-level representation of a single bus message,
/// whether it is a command from a controller or a response from a pump.
/// The checksum is not stored — it is recomputed on encode and verified
/// on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version byte.
    pub version: u8,
    /// Destination bus address.
    pub destination: u8,
    /// Source bus address.
    pub source: u8,
    /// Command/function identifier.
    pub command: u8,
    /// Payload bytes (may be empty, at most 255).
    pub data: Vec<u8>,
}

impl Frame {
    /// Construct a frame with the standard version byte.
    ///
    /// Fails with [`Error::PayloadTooLarge`] if `data` exceeds 255 bytes.
    pub fn new(destination: u8, source: u8, command: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(data.len()));
        }
        Ok(Frame {
            version: PROTOCOL_VERSION,
            destination,
            source,
            command,
            data,
        })
    }

    /// Total on-wire length of this frame, marker and checksum included.
    pub fn wire_len(&self) -> usize {
        MIN_FRAME_LEN + self.data.len()
    }

    /// Encode this frame into raw bytes ready for transmission.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(self.destination, self.source, self.command, &self.data)
    }
}

/// Failure modes of [`decode_frame`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer does not begin with the 4-byte frame marker.
    #[error("buffer does not start with the frame marker")]
    MissingMarker,

    /// Fewer bytes are present than the frame declares.
    ///
    /// Not a discard condition — the caller should wait for more bytes.
    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the complete frame occupies (or the 11-byte minimum if
        /// the length byte has not arrived yet).
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The received checksum disagrees with the recomputed one.
    #[error("checksum mismatch: computed {computed:#06X}, received {received:#06X}")]
    ChecksumMismatch {
        /// Checksum recomputed over the frame contents.
        computed: u16,
        /// Checksum carried in the trailing two bytes.
        received: u16,
    },
}

/// Compute the 16-bit frame checksum over a byte span.
///
/// The sum wraps at 16 bits; a maximum-length frame can exceed `0xFFFF`.
pub fn checksum(span: &[u8]) -> u16 {
    span.iter().fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Encode a Pentair frame into raw bytes ready for transmission.
///
/// Produces the full wire format including marker and checksum.
///
/// # Example
///
/// ```
/// use pumpbus_pentair::frame::encode_frame;
///
/// // Status query to pump 1 (0x60) from remote controller 0x20
/// let bytes = encode_frame(0x60, 0x20, 0x07, &[]).unwrap();
/// assert_eq!(
///     bytes,
///     vec![0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x07, 0x00, 0x01, 0x2C]
/// );
/// ```
pub fn encode_frame(destination: u8, source: u8, command: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge(data.len()));
    }

    let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + data.len());
    buf.put_slice(&MARKER);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(destination);
    buf.put_u8(source);
    buf.put_u8(command);
    buf.put_u8(data.len() as u8);
    buf.put_slice(data);

    let sum = checksum(&buf[LEAD_IDX..]);
    buf.put_u16(sum);

    Ok(buf.to_vec())
}

/// Decode one Pentair frame from the start of a buffer.
///
/// The caller must have already located the 4-byte marker at offset 0 —
/// scanning a raw byte stream for frame boundaries is the reassembler's
/// job, not the codec's.
///
/// On success returns the frame and the number of bytes consumed. Extra
/// bytes after the declared length are left untouched and reported through
/// the consumed count.
///
/// # Example
///
/// ```
/// use pumpbus_pentair::frame::decode_frame;
///
/// let buf = [0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x07, 0x00, 0x01, 0x2C];
/// let (frame, consumed) = decode_frame(&buf).unwrap();
/// assert_eq!(frame.destination, 0x60);
/// assert_eq!(frame.command, 0x07);
/// assert_eq!(consumed, 11);
/// ```
pub fn decode_frame(buf: &[u8]) -> std::result::Result<(Frame, usize), DecodeError> {
    if buf.len() < MARKER.len() {
        return Err(DecodeError::Truncated {
            needed: MIN_FRAME_LEN,
            have: buf.len(),
        });
    }
    if buf[..MARKER.len()] != MARKER {
        return Err(DecodeError::MissingMarker);
    }
    if buf.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Truncated {
            needed: MIN_FRAME_LEN,
            have: buf.len(),
        });
    }

    let declared = buf[LEN_IDX] as usize;
    let total = MIN_FRAME_LEN + declared;
    if buf.len() < total {
        return Err(DecodeError::Truncated {
            needed: total,
            have: buf.len(),
        });
    }

    let computed = checksum(&buf[LEAD_IDX..total - 2]);
    let received = u16::from_be_bytes([buf[total - 2], buf[total - 1]]);
    if computed != received {
        return Err(DecodeError::ChecksumMismatch { computed, received });
    }

    let frame = Frame {
        version: buf[VER_IDX],
        destination: buf[DST_IDX],
        source: buf[SRC_IDX],
        command: buf[CMD_IDX],
        data: buf[DATA_IDX..DATA_IDX + declared].to_vec(),
    };

    Ok((frame, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_status_query_golden_vector() {
        // Checksum: A5 + 00 + 60 + 20 + 07 + 00 = 0x012C
        let bytes = encode_frame(0x60, 0x20, 0x07, &[]).unwrap();
        assert_eq!(
            bytes,
            vec![0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x07, 0x00, 0x01, 0x2C]
        );
    }

    #[test]
    fn encode_run_start() {
        let bytes = encode_frame(0x60, 0x20, 0x06, &[0x0A]).unwrap();
        // A5 + 00 + 60 + 20 + 06 + 01 + 0A = 0x0136
        assert_eq!(
            bytes,
            vec![0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x06, 0x01, 0x0A, 0x01, 0x36]
        );
    }

    #[test]
    fn encode_payload_too_large() {
        let data = vec![0u8; 256];
        let result = encode_frame(0x60, 0x20, 0x01, &data);
        assert!(matches!(result, Err(Error::PayloadTooLarge(256))));
    }

    #[test]
    fn encode_max_payload_accepted() {
        let data = vec![0xAB; 255];
        let bytes = encode_frame(0x60, 0x20, 0x01, &data).unwrap();
        assert_eq!(bytes.len(), MIN_FRAME_LEN + 255);
        assert_eq!(bytes[LEN_IDX], 255);
    }

    #[test]
    fn checksum_wraps_at_16_bits() {
        // 255 bytes of 0xFF plus the header sum exceeds 0xFFFF.
        let data = vec![0xFF; 255];
        let bytes = encode_frame(0xFF, 0xFF, 0xFF, &data).unwrap();
        let (frame, _) = decode_frame(&bytes).unwrap();
        assert_eq!(frame.data, data);
    }

    #[test]
    fn frame_new_rejects_oversized_payload() {
        let result = Frame::new(0x60, 0x20, 0x01, vec![0u8; 300]);
        assert!(matches!(result, Err(Error::PayloadTooLarge(300))));
    }

    #[test]
    fn frame_wire_len() {
        let frame = Frame::new(0x60, 0x20, 0x06, vec![0x0A]).unwrap();
        assert_eq!(frame.wire_len(), 12);
    }

    // ---------------------------------------------------------------
    // Round trips
    // ---------------------------------------------------------------

    #[test]
    fn round_trip_empty_payload() {
        let original = Frame::new(0x60, 0x20, 0x07, vec![]).unwrap();
        let encoded = original.encode().unwrap();
        let (decoded, consumed) = decode_frame(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn round_trip_small_payload() {
        let original = Frame::new(0x60, 0x20, 0x01, vec![0x02, 0xC4, 0x05, 0xDC]).unwrap();
        let encoded = original.encode().unwrap();
        let (decoded, consumed) = decode_frame(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn round_trip_every_payload_length() {
        for len in [0usize, 1, 2, 15, 64, 127, 128, 254, 255] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let original = Frame::new(0x0F, 0x61, 0x42, data).unwrap();
            let encoded = original.encode().unwrap();
            let (decoded, consumed) = decode_frame(&encoded).unwrap();
            assert_eq!(decoded, original, "payload length {len}");
            assert_eq!(consumed, encoded.len());
        }
    }

    // ---------------------------------------------------------------
    // Decoding — error paths
    // ---------------------------------------------------------------

    #[test]
    fn decode_missing_marker() {
        let buf = [0x00u8; 16];
        assert_eq!(decode_frame(&buf), Err(DecodeError::MissingMarker));
    }

    #[test]
    fn decode_truncated_header() {
        let buf = [0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60];
        assert_eq!(
            decode_frame(&buf),
            Err(DecodeError::Truncated { needed: 11, have: 6 })
        );
    }

    #[test]
    fn decode_truncated_payload() {
        // Declares 15 data bytes but carries none.
        let mut buf = vec![0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x20, 0x60, 0x07, 0x0F];
        buf.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(
            decode_frame(&buf),
            Err(DecodeError::Truncated { needed: 26, have: 11 })
        );
    }

    #[test]
    fn decode_checksum_mismatch() {
        let mut bytes = encode_frame(0x60, 0x20, 0x07, &[]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode_frame(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn flipping_any_checksummed_byte_fails_checksum() {
        let original = encode_frame(0x60, 0x20, 0x01, &[0x02, 0xC4, 0x05, 0xDC]).unwrap();
        let total = original.len();
        // Every byte from the version byte through the last data byte.
        // (Flipping the LEN byte is covered separately — it changes the
        // declared geometry rather than just the sum.)
        for idx in VER_IDX..total - 2 {
            if idx == LEN_IDX {
                continue;
            }
            let mut corrupted = original.clone();
            corrupted[idx] ^= 0x40;
            assert!(
                matches!(
                    decode_frame(&corrupted),
                    Err(DecodeError::ChecksumMismatch { .. })
                ),
                "flip at index {idx} should fail the checksum"
            );
        }
    }

    #[test]
    fn flipping_len_byte_fails_decode() {
        let original = encode_frame(0x60, 0x20, 0x01, &[0x02, 0xC4, 0x05, 0xDC]).unwrap();

        // Larger declared length: frame appears truncated.
        let mut grown = original.clone();
        grown[LEN_IDX] = 0x40;
        assert!(matches!(
            decode_frame(&grown),
            Err(DecodeError::Truncated { .. })
        ));

        // Smaller declared length: checksum no longer matches the bytes
        // that land in the checksum position.
        let mut shrunk = original;
        shrunk[LEN_IDX] = 0x02;
        assert!(matches!(
            decode_frame(&shrunk),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn flipping_marker_byte_is_missing_marker() {
        let mut bytes = encode_frame(0x60, 0x20, 0x07, &[]).unwrap();
        bytes[1] = 0xFF;
        assert_eq!(decode_frame(&bytes), Err(DecodeError::MissingMarker));
    }

    #[test]
    fn decode_with_trailing_bytes_reports_consumed() {
        let mut bytes = encode_frame(0x60, 0x20, 0x07, &[]).unwrap();
        let frame_len = bytes.len();
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let (frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(frame.command, 0x07);
        assert_eq!(consumed, frame_len);
    }

    #[test]
    fn decode_empty_buffer() {
        assert_eq!(
            decode_frame(&[]),
            Err(DecodeError::Truncated { needed: 11, have: 0 })
        );
    }
}
