// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! KISS framing: `FEND cmd <escaped data> FEND`.

use bytes::{Buf, BufMut, BytesMut};

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

/// Low nibble of the command byte for a data frame.
pub const CMD_DATA: u8 = 0x00;

/// Frames larger than this are discarded as line noise.
const MAX_FRAME_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    /// TNC sub-channel (high nibble of the command byte).
    pub port: u8,
    /// Command (low nibble of the command byte).
    pub command: u8,
    pub data: Vec<u8>,
}

impl KissFrame {
    pub fn is_data(&self) -> bool {
        self.command == CMD_DATA
    }
}

/// Incremental KISS decoder.
#[derive(Debug, Default)]
pub struct KissDecoder {
    buf: Vec<u8>,
    in_frame: bool,
    escaped: bool,
    overflow: bool,
}

impl KissDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a frame when a closing FEND completes one.
    pub fn feed(&mut self, byte: u8) -> Option<KissFrame> {
        if byte == FEND {
            let frame = self.finish();
            self.in_frame = true;
            return frame;
        }
        if !self.in_frame {
            return None;
        }
        if self.escaped {
            self.escaped = false;
            let byte = match byte {
                TFEND => FEND,
                TFESC => FESC,
                // Invalid escape; keep the byte as received.
                other => other,
            };
            self.push(byte);
        } else if byte == FESC {
            self.escaped = true;
        } else {
            self.push(byte);
        }
        None
    }

    /// Consume bytes from `src` until one frame is complete.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<KissFrame> {
        while src.has_remaining() {
            if let Some(frame) = self.feed(src.get_u8()) {
                return Some(frame);
            }
        }
        None
    }

    fn push(&mut self, byte: u8) {
        if self.buf.len() >= MAX_FRAME_LEN {
            self.overflow = true;
            return;
        }
        self.buf.push(byte);
    }

    fn finish(&mut self) -> Option<KissFrame> {
        let overflow = std::mem::take(&mut self.overflow);
        self.escaped = false;
        if self.buf.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.buf);
        if overflow || data.len() < 2 {
            return None;
        }
        let cmd = data[0];
        Some(KissFrame {
            port: cmd >> 4,
            command: cmd & 0x0F,
            data: data[1..].to_vec(),
        })
    }
}

/// Encode `data` as a KISS data frame on `port`.
pub fn encode(data: &[u8], port: u8) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(data.len() + 8);
    encode_into(data, port, &mut out);
    out.to_vec()
}

pub fn encode_into(data: &[u8], port: u8, out: &mut BytesMut) {
    out.put_u8(FEND);
    out.put_u8(((port & 0x0F) << 4) | CMD_DATA);
    for &byte in data {
        match byte {
            FEND => {
                out.put_u8(FESC);
                out.put_u8(TFEND);
            }
            FESC => {
                out.put_u8(FESC);
                out.put_u8(TFESC);
            }
            _ => out.put_u8(byte),
        }
    }
    out.put_u8(FEND);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<KissFrame> {
        let mut decoder = KissDecoder::new();
        bytes.iter().filter_map(|b| decoder.feed(*b)).collect()
    }

    #[test]
    fn test_escape_round_trip() {
        let payload = vec![0x01, FEND, 0x02, FESC, 0x03, FESC, FEND, TFEND];
        let encoded = encode(&payload, 0);
        assert!(!encoded[1..encoded.len() - 1].contains(&FEND));

        let frames = decode_all(&encoded);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, payload);
        assert!(frames[0].is_data());
    }

    #[test]
    fn test_port_nibble() {
        let encoded = encode(b"abc", 3);
        assert_eq!(encoded[1], 0x30);
        let frames = decode_all(&encoded);
        assert_eq!(frames[0].port, 3);
        assert_eq!(frames[0].command, CMD_DATA);
    }

    #[test]
    fn test_noise_before_first_fend_ignored() {
        let mut bytes = vec![0x41, 0x42];
        bytes.extend(encode(b"hello", 0));
        let frames = decode_all(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, b"hello");
    }

    #[test]
    fn test_back_to_back_frames_and_partial_input() {
        let mut stream = BytesMut::new();
        encode_into(b"one", 0, &mut stream);
        encode_into(b"two", 0, &mut stream);
        let tail = stream.split_off(stream.len() - 3);

        let mut decoder = KissDecoder::new();
        assert_eq!(decoder.decode(&mut stream).unwrap().data, b"one");
        assert_eq!(decoder.decode(&mut stream), None);

        let mut tail = tail;
        assert_eq!(decoder.decode(&mut tail).unwrap().data, b"two");
    }

    #[test]
    fn test_non_data_command() {
        let frames = decode_all(&[FEND, 0x06, 0x10, FEND]);
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].is_data());
    }
}
