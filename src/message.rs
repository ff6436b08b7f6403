//! Decode a CRC-validated AIS payload into a human-readable record.
//!
//! Covers ITU-R M.1371-5 message types 1, 2, 3 (Class-A position report),
//! 4 (base station report), and 5 (static/voyage data) -- the subset this
//! receiver supports. Anything else decodes to [`AisMessage::Unknown`].

use crate::bits::{bits_to_ascii, bits_to_uint};

/// A decoded position report (message types 1, 2, 3).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Speed over ground, km/h.
    pub speed_kmh: f64,
    /// Course over ground, degrees.
    pub course_deg: f64,
}

/// A decoded base-station report (message type 4).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseStationReport {
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// UTC year.
    pub year: u32,
    /// UTC month, 1-12.
    pub month: u32,
    /// UTC day of month.
    pub day: u32,
    /// UTC hour.
    pub hour: u32,
    /// UTC minute.
    pub minute: u32,
    /// UTC second.
    pub second: u32,
}

/// A decoded static/voyage data report (message type 5).
#[derive(Debug, Clone, PartialEq)]
pub struct StaticVoyageData {
    /// Call sign, 7 characters.
    pub call_sign: String,
    /// Vessel name, 20 characters.
    pub name: String,
    /// Destination, 20 characters.
    pub destination: String,
}

/// Body of a decoded message, tagged by the message kind it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Message types 1, 2, 3.
    Position(PositionReport),
    /// Message type 4.
    BaseStation(BaseStationReport),
    /// Message type 5.
    StaticVoyage(StaticVoyageData),
    /// Any other message ID: reported but not decoded further.
    Unknown,
}

/// A fully decoded AIS message.
#[derive(Debug, Clone, PartialEq)]
pub struct AisMessage {
    /// 6-bit message type ID.
    pub msg_id: u32,
    /// 30-bit Maritime Mobile Service Identity.
    pub mmsi: u32,
    /// The message-specific body.
    pub body: Body,
}

fn sign_extend(v: u32, bits: usize) -> i64 {
    let half = 1i64 << (bits - 1);
    let full = 1i64 << bits;
    let v = i64::from(v);
    if v >= half { v - full } else { v }
}

fn decode_longitude(payload: &[u8], from_bit: usize) -> f64 {
    let raw = bits_to_uint(payload, from_bit, 28);
    sign_extend(raw, 28) as f64 / 600_000.0
}

fn decode_latitude(payload: &[u8], from_bit: usize) -> f64 {
    let raw = bits_to_uint(payload, from_bit, 27);
    sign_extend(raw, 27) as f64 / 600_000.0
}

fn decode_position(payload: &[u8]) -> PositionReport {
    let speed_raw = bits_to_uint(payload, 50, 10);
    let longitude = decode_longitude(payload, 61);
    let latitude = decode_latitude(payload, 89);
    let course_raw = bits_to_uint(payload, 116, 12);
    PositionReport {
        longitude,
        latitude,
        // Speed field is in tenths of a knot; convert knots -> km/h.
        speed_kmh: f64::from(speed_raw) * 0.1852,
        course_deg: f64::from(course_raw) / 10.0,
    }
}

fn decode_base_station(payload: &[u8]) -> BaseStationReport {
    BaseStationReport {
        longitude: decode_longitude(payload, 79),
        latitude: decode_latitude(payload, 107),
        year: bits_to_uint(payload, 38, 14),
        month: bits_to_uint(payload, 52, 4),
        day: bits_to_uint(payload, 56, 5),
        hour: bits_to_uint(payload, 61, 5),
        minute: bits_to_uint(payload, 66, 6),
        second: bits_to_uint(payload, 72, 6),
    }
}

fn decode_static_voyage(payload: &[u8]) -> StaticVoyageData {
    StaticVoyageData {
        call_sign: bits_to_ascii(payload, 70, 42),
        name: bits_to_ascii(payload, 112, 120),
        destination: bits_to_ascii(payload, 302, 120),
    }
}

/// Decode a validated payload (already CRC-checked and length-selected by
/// [`crate::crc::validate_frame`]) into an [`AisMessage`].
#[must_use]
pub fn decode(payload: &[u8]) -> AisMessage {
    let msg_id = bits_to_uint(payload, 0, 6);
    let mmsi = bits_to_uint(payload, 8, 30);
    let body = match msg_id {
        1 | 2 | 3 => Body::Position(decode_position(payload)),
        4 => Body::BaseStation(decode_base_station(payload)),
        5 => Body::StaticVoyage(decode_static_voyage(payload)),
        _ => Body::Unknown,
    };
    AisMessage { msg_id, mmsi, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_bits(buf: &mut [u8], from_bit: usize, n: usize, v: u32) {
        for i in 0..n {
            let bit = (v >> (n - 1 - i)) & 1;
            let bitpos = from_bit + i;
            let mask = 1u8 << (7 - (bitpos % 8));
            if bit == 1 {
                buf[bitpos / 8] |= mask;
            } else {
                buf[bitpos / 8] &= !mask;
            }
        }
    }

    /// Testable property 2: sign extension for 28- and 27-bit fields.
    #[test]
    fn sign_extension_property() {
        for x in [0u32, 1, (1 << 26), (1 << 27) - 1, 1 << 27, (1 << 28) - 1] {
            let got = sign_extend(x, 28);
            let want = if x < (1 << 27) {
                i64::from(x)
            } else {
                i64::from(x) - (1 << 28)
            };
            assert_eq!(got, want, "x={x}");
        }
        for x in [0u32, 1, (1 << 25), (1 << 26) - 1, 1 << 26, (1 << 27) - 1] {
            let got = sign_extend(x, 27);
            let want = if x < (1 << 26) {
                i64::from(x)
            } else {
                i64::from(x) - (1 << 27)
            };
            assert_eq!(got, want, "x={x}");
        }
    }

    #[test]
    fn decode_message_1() {
        let mut payload = vec![0u8; 21];
        write_bits(&mut payload, 0, 6, 1);
        write_bits(&mut payload, 8, 30, 123_456_789);
        write_bits(&mut payload, 50, 10, 123); // 12.3 kn
        // -74.0 deg * 600000 = -44_400_000, as 28-bit two's complement.
        let lon_raw = ((-44_400_000i64) & 0x0FFF_FFFF) as u32;
        write_bits(&mut payload, 61, 28, lon_raw);
        let lat_raw = (40.7 * 600_000.0) as u32; // north, positive
        write_bits(&mut payload, 89, 27, lat_raw);
        write_bits(&mut payload, 116, 12, 875); // 87.5 deg

        let msg = decode(&payload);
        assert_eq!(msg.msg_id, 1);
        assert_eq!(msg.mmsi, 123_456_789);
        match msg.body {
            Body::Position(p) => {
                assert!((p.longitude - (-74.0)).abs() < 1e-6);
                assert!((p.latitude - 40.7).abs() < 1e-6);
                assert!((p.speed_kmh - 22.7796).abs() < 1e-3);
                assert!((p.course_deg - 87.5).abs() < 1e-9);
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn decode_message_4() {
        let mut payload = vec![0u8; 21];
        write_bits(&mut payload, 0, 6, 4);
        write_bits(&mut payload, 38, 14, 2024);
        write_bits(&mut payload, 52, 4, 1);
        write_bits(&mut payload, 56, 5, 15);
        write_bits(&mut payload, 61, 5, 12);
        write_bits(&mut payload, 66, 6, 34);
        write_bits(&mut payload, 72, 6, 56);
        let msg = decode(&payload);
        match msg.body {
            Body::BaseStation(b) => {
                assert_eq!((b.year, b.month, b.day, b.hour, b.minute, b.second), (2024, 1, 15, 12, 34, 56));
                assert_eq!(b.longitude, 0.0);
                assert_eq!(b.latitude, 0.0);
            }
            _ => panic!("expected BaseStation"),
        }
    }

    #[test]
    fn decode_message_5_call_sign() {
        let mut payload = vec![0u8; 53];
        write_bits(&mut payload, 0, 6, 5);
        // "A" is six-bit value 1 (1+64=65='A').
        write_bits(&mut payload, 70, 6, 1);
        let msg = decode(&payload);
        match msg.body {
            Body::StaticVoyage(s) => assert_eq!(&s.call_sign[0..1], "A"),
            _ => panic!("expected StaticVoyage"),
        }
    }

    #[test]
    fn unknown_message_id() {
        let mut p = vec![0u8; 21];
        write_bits(&mut p, 0, 6, 63);
        assert_eq!(decode(&p).body, Body::Unknown);
    }
}
