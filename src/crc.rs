//! Frame validation: CRC-16-CCITT and message-length selection.
//!
//! This is a deliberately non-table-driven variant of the usual HDLC FCS:
//! computed byte-by-byte with explicit bit twiddling rather than an
//! `FCSTAB` lookup table, to match the exact bit-pattern this frame
//! validation relies on.

use crate::bits;

/// Compute the CRC-16-CCITT variant used by AIS/HDLC: polynomial `0x1021`,
/// initial value `0xFFFF`, final one's-complement, processed byte-wise.
#[must_use]
pub fn crc16(payload: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in payload {
        let mut d: u16 = u16::from(b) ^ (crc & 0xFF);
        d ^= (d << 4) & 0xFF;
        crc = ((d << 8) | (crc >> 8)) ^ (d >> 4) ^ ((d << 3) & 0xFFFF);
    }
    !crc
}

/// Payload length in bytes for a given AIS message ID: message 5 carries a
/// 424-bit payload, everything else in this decoder's repertoire is 168
/// bits.
#[must_use]
pub fn payload_len(msg_id: u32) -> usize {
    if msg_id == 5 { 53 } else { 21 }
}

/// Validate an HDLC-decoded byte string: read the message ID, pick the
/// expected payload length, and check the trailing little-endian CRC.
///
/// Returns the validated payload slice (without the CRC bytes) on success.
#[must_use]
pub fn validate_frame(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 3 {
        return None;
    }
    let msg_id = bits::bits_to_uint(bytes, 0, 6);
    let len = payload_len(msg_id);
    if bytes.len() < len + 2 {
        return None;
    }
    let payload = &bytes[..len];
    let got = crc16(payload);
    // Little-endian 16-bit CRC, read byte-by-byte since it isn't aligned.
    let want = u16::from(bytes[len]) | (u16::from(bytes[len + 1]) << 8);
    if got == want { Some(payload) } else { None }
}
