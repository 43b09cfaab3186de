// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! AX.25 UI frame codec.
//!
//! Address fields are 7 bytes: six callsign characters shifted left by one
//! bit and space padded, then the SSID byte `HRRSSSSL` (H = has-been-repeated
//! or command bit, R = reserved, set to 1 on encode, L = last address).

use std::fmt;

use aprs_core::{AprsPacket, PathElement};

use crate::error::FrameError;
use crate::tnc2;

pub const CONTROL_UI: u8 = 0x03;
pub const PID_NO_LAYER3: u8 = 0xF0;
pub const MAX_DIGIPEATERS: usize = 8;

const ADDR_LEN: usize = 7;
const SSID_LAST: u8 = 0x01;
const SSID_RESERVED: u8 = 0x60;
const SSID_H_BIT: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Address {
    pub call: String,
    pub ssid: u8,
    /// Has-been-repeated bit on digipeater addresses.
    pub repeated: bool,
    /// Set on the final address of the header.
    pub last: bool,
}

impl Ax25Address {
    /// Parse `CALL` or `CALL-SSID`, uppercasing the callsign.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let text = text.trim().trim_end_matches('*');
        let upper = text.to_ascii_uppercase();
        let (call, ssid) = match upper.split_once('-') {
            Some((call, ssid)) => {
                let ssid: u8 = ssid
                    .parse()
                    .map_err(|_| FrameError::BadCallsign(text.to_string()))?;
                (call.to_string(), ssid)
            }
            None => (upper.clone(), 0),
        };
        if call.is_empty()
            || call.len() > 6
            || ssid > 15
            || !call.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(FrameError::BadCallsign(text.to_string()));
        }
        Ok(Self {
            call,
            ssid,
            repeated: false,
            last: false,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < ADDR_LEN {
            return Err(FrameError::Truncated("address field"));
        }
        let mut call = String::with_capacity(6);
        for &b in &bytes[..6] {
            let ch = b >> 1;
            if ch > b' ' {
                call.push(ch as char);
            }
        }
        if call.is_empty() {
            return Err(FrameError::BadCallsign(call));
        }
        let ssid_byte = bytes[6];
        Ok(Self {
            call,
            ssid: (ssid_byte >> 1) & 0x0F,
            repeated: ssid_byte & SSID_H_BIT != 0,
            last: ssid_byte & SSID_LAST != 0,
        })
    }

    pub fn encode(&self, last: bool) -> [u8; ADDR_LEN] {
        let mut out = [b' ' << 1; ADDR_LEN];
        for (i, b) in self.call.bytes().take(6).enumerate() {
            out[i] = b.to_ascii_uppercase() << 1;
        }
        let mut ssid = SSID_RESERVED | ((self.ssid & 0x0F) << 1);
        if self.repeated {
            ssid |= SSID_H_BIT;
        }
        if last {
            ssid |= SSID_LAST;
        }
        out[6] = ssid;
        out
    }
}

impl fmt::Display for Ax25Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            f.write_str(&self.call)
        } else {
            write!(f, "{}-{}", self.call, self.ssid)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Frame {
    pub destination: Ax25Address,
    pub source: Ax25Address,
    pub digipeaters: Vec<Ax25Address>,
    pub info: Vec<u8>,
}

impl Ax25Frame {
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() < 2 * ADDR_LEN + 2 {
            return Err(FrameError::Truncated("header"));
        }
        let destination = Ax25Address::decode(&frame[..ADDR_LEN])?;
        let source = Ax25Address::decode(&frame[ADDR_LEN..2 * ADDR_LEN])?;

        let mut offset = 2 * ADDR_LEN;
        let mut last = source.last;
        let mut digipeaters = Vec::new();
        while !last {
            if offset + ADDR_LEN > frame.len() {
                return Err(FrameError::Truncated("digipeater list"));
            }
            let digi = Ax25Address::decode(&frame[offset..offset + ADDR_LEN])?;
            last = digi.last;
            digipeaters.push(digi);
            offset += ADDR_LEN;
            if digipeaters.len() > MAX_DIGIPEATERS {
                return Err(FrameError::TooManyDigipeaters(digipeaters.len()));
            }
        }

        if offset + 2 > frame.len() {
            return Err(FrameError::Truncated("control field"));
        }
        let control = frame[offset];
        let pid = frame[offset + 1];
        if control & !0x10 != CONTROL_UI || pid != PID_NO_LAYER3 {
            return Err(FrameError::NotUi { control, pid });
        }

        Ok(Self {
            destination,
            source,
            digipeaters,
            info: frame[offset + 2..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ADDR_LEN * (2 + self.digipeaters.len()) + 2 + self.info.len());
        out.extend_from_slice(&self.destination.encode(false));
        out.extend_from_slice(&self.source.encode(self.digipeaters.is_empty()));
        let n = self.digipeaters.len();
        for (i, digi) in self.digipeaters.iter().enumerate() {
            out.extend_from_slice(&digi.encode(i + 1 == n));
        }
        out.push(CONTROL_UI);
        out.push(PID_NO_LAYER3);
        out.extend_from_slice(&self.info);
        out
    }

    pub fn from_packet(packet: &AprsPacket) -> Result<Self, FrameError> {
        if packet.path.len() > MAX_DIGIPEATERS {
            return Err(FrameError::TooManyDigipeaters(packet.path.len()));
        }
        let digipeaters = packet
            .path
            .iter()
            .map(|elem| {
                let mut addr = Ax25Address::parse(&elem.call)?;
                addr.repeated = elem.digipeated;
                Ok(addr)
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Ok(Self {
            destination: Ax25Address::parse(&packet.destination)?,
            source: Ax25Address::parse(&packet.source)?,
            digipeaters,
            info: packet.report.as_bytes().to_vec(),
        })
    }

    /// Convert to a packet, unwrapping third-party payloads.
    pub fn to_packet(&self) -> AprsPacket {
        let path = self
            .digipeaters
            .iter()
            .map(|d| PathElement::new(d.to_string(), d.repeated))
            .collect();
        let packet = AprsPacket::new(
            self.source.to_string(),
            self.destination.to_string(),
            path,
            info_text(&self.info),
        );
        tnc2::unwrap_third_party(packet)
    }
}

/// UTF-8 if valid, otherwise each byte maps to the code point of the same
/// value so binary Mic-E and Latin-1 comments survive.
fn info_text(info: &[u8]) -> String {
    match std::str::from_utf8(info) {
        Ok(text) => text.to_string(),
        Err(_) => info.iter().map(|&b| b as char).collect(),
    }
}

/// Decode an AX.25 frame straight into a packet.
pub fn decode_packet(frame: &[u8]) -> Result<AprsPacket, FrameError> {
    Ok(Ax25Frame::decode(frame)?.to_packet())
}

pub fn encode_packet(packet: &AprsPacket) -> Result<Vec<u8>, FrameError> {
    Ok(Ax25Frame::from_packet(packet)?.encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trip() {
        let addr = Ax25Address::parse("N0CALL-5").unwrap();
        let bytes = addr.encode(true);
        let decoded = Ax25Address::decode(&bytes).unwrap();
        assert_eq!(decoded.call, "N0CALL");
        assert_eq!(decoded.ssid, 5);
        assert!(decoded.last);
        assert_eq!(decoded.to_string(), "N0CALL-5");
    }

    #[test]
    fn test_address_padding_and_zero_ssid() {
        let addr = Ax25Address::parse("ab1c").unwrap();
        let bytes = addr.encode(false);
        assert_eq!(bytes[4], b' ' << 1);
        assert_eq!(bytes[6], 0x60);
        let decoded = Ax25Address::decode(&bytes).unwrap();
        assert_eq!(decoded.to_string(), "AB1C");
        assert!(!decoded.last);
    }

    #[test]
    fn test_bad_callsigns() {
        assert!(Ax25Address::parse("TOOLONGCALL").is_err());
        assert!(Ax25Address::parse("N0CALL-16").is_err());
        assert!(Ax25Address::parse("N0CALL-X").is_err());
        assert!(Ax25Address::parse("").is_err());
    }

    #[test]
    fn test_frame_round_trip_with_digipeaters() {
        let packet = AprsPacket::new(
            "N0CALL-9",
            "APRS",
            vec![
                PathElement::new("LA1ABC-2", true),
                PathElement::new("WIDE2-1", false),
            ],
            "!4903.50N/07201.75W-Test",
        );
        let bytes = encode_packet(&packet).unwrap();

        // Last flag only on the final address.
        assert_eq!(bytes[13] & SSID_LAST, 0);
        assert_eq!(bytes[20] & SSID_LAST, 0);
        assert_eq!(bytes[27] & SSID_LAST, SSID_LAST);
        assert_eq!(bytes[20] & SSID_H_BIT, SSID_H_BIT);

        let decoded = decode_packet(&bytes).unwrap();
        assert_eq!(decoded.to_string(), "N0CALL-9>APRS,LA1ABC-2*,WIDE2-1:!4903.50N/07201.75W-Test");
        assert!(decoded.path[0].digipeated);
        assert!(!decoded.path[1].digipeated);
    }

    #[test]
    fn test_truncated_frames() {
        assert_eq!(
            Ax25Frame::decode(&[0x40; 10]),
            Err(FrameError::Truncated("header"))
        );

        // Source without the last flag and nothing after it.
        let mut bytes = Ax25Address::parse("APRS").unwrap().encode(false).to_vec();
        bytes.extend_from_slice(&Ax25Address::parse("N0CALL").unwrap().encode(false));
        bytes.extend_from_slice(&[CONTROL_UI, PID_NO_LAYER3]);
        assert!(matches!(
            Ax25Frame::decode(&bytes),
            Err(FrameError::Truncated(_))
        ));
    }

    #[test]
    fn test_non_ui_frame_rejected() {
        let mut bytes = Ax25Address::parse("APRS").unwrap().encode(false).to_vec();
        bytes.extend_from_slice(&Ax25Address::parse("N0CALL").unwrap().encode(true));
        bytes.extend_from_slice(&[0x3F, 0xF0]);
        assert!(matches!(
            Ax25Frame::decode(&bytes),
            Err(FrameError::NotUi { control: 0x3F, .. })
        ));
    }

    #[test]
    fn test_binary_info_preserved() {
        let frame = Ax25Frame {
            destination: Ax25Address::parse("T2SP0W").unwrap(),
            source: Ax25Address::parse("N0CALL").unwrap(),
            digipeaters: vec![],
            info: vec![b'`', 0x28, 0x5F, 0xB0],
        };
        let packet = frame.to_packet();
        assert_eq!(packet.report.chars().nth(3), Some('\u{B0}'));
    }
}
