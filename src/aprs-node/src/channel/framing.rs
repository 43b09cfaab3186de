// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Packet framing on top of a byte stream: TNC2 text lines or KISS/AX.25.

use bytes::BytesMut;

use aprs_core::AprsPacket;
use aprs_protocol::{ax25, kiss, tnc2, FrameError, KissDecoder};

/// Longest text line kept; longer lines are dropped.
const MAX_LINE_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `SRC>DST,PATH:PAYLOAD` lines.
    Text,
    /// KISS frames carrying AX.25 UI frames on one TNC port.
    Kiss { port: u8 },
}

/// One unit read from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Framed {
    Packet(AprsPacket),
    /// `#` line from a text stream.
    Comment(String),
    /// Frame or line that did not parse.
    Invalid(String),
}

impl Framing {
    /// Encode `packet` for this framing.
    pub fn encode(&self, packet: &AprsPacket) -> Result<Vec<u8>, FrameError> {
        match self {
            Framing::Text => Ok(tnc2::format_line(packet).into_bytes()),
            Framing::Kiss { port } => {
                let frame = ax25::encode_packet(packet)?;
                let mut out = BytesMut::with_capacity(frame.len() + 8);
                kiss::encode_into(&frame, *port, &mut out);
                Ok(out.to_vec())
            }
        }
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            framing: *self,
            line: Vec::new(),
            overlong: false,
            kiss: KissDecoder::new(),
        }
    }
}

/// Incremental reader turning stream bytes into [`Framed`] items.
#[derive(Debug)]
pub struct FrameReader {
    framing: Framing,
    line: Vec<u8>,
    overlong: bool,
    kiss: KissDecoder,
}

impl FrameReader {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Framed> {
        match self.framing {
            Framing::Text => self.push_text(bytes),
            Framing::Kiss { port } => self.push_kiss(bytes, port),
        }
    }

    fn push_text(&mut self, bytes: &[u8]) -> Vec<Framed> {
        let mut out = Vec::new();
        for &b in bytes {
            if b != b'\n' {
                if self.line.len() < MAX_LINE_LEN {
                    self.line.push(b);
                } else {
                    self.overlong = true;
                }
                continue;
            }
            let raw = std::mem::take(&mut self.line);
            if std::mem::take(&mut self.overlong) {
                out.push(Framed::Invalid("line too long".to_string()));
                continue;
            }
            let line = text_from_bytes(raw);
            let line = line.trim_end_matches(['\r', '\0']);
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                out.push(Framed::Comment(line.to_string()));
                continue;
            }
            out.push(match tnc2::parse(line) {
                Ok(packet) => Framed::Packet(packet),
                Err(e) => Framed::Invalid(format!("{}: {}", e, line)),
            });
        }
        out
    }

    fn push_kiss(&mut self, bytes: &[u8], port: u8) -> Vec<Framed> {
        let mut src = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(frame) = self.kiss.decode(&mut src) {
            if frame.port != port || !frame.is_data() {
                continue;
            }
            out.push(match ax25::decode_packet(&frame.data) {
                Ok(packet) => Framed::Packet(packet),
                Err(e) => Framed::Invalid(e.to_string()),
            });
        }
        out
    }
}

/// UTF-8 if valid, Latin-1 otherwise.
fn text_from_bytes(raw: Vec<u8>) -> String {
    match String::from_utf8(raw) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}
