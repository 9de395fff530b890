//! Semantic parsing: decoding raw record bodies into typed payloads.
//!
//! Dispatch is a pure function of the record's body-type tag, driven by a
//! registry of [`BodyDecoder`] implementations. Which decoders are
//! registered is injected by the composition layer, so trimming or
//! extending the supported encodings never touches this module's logic.

use std::collections::HashMap;

use crate::error::BodyError;
use crate::message::{BodyKind, DecodedMessage, Payload, StructuralMessage};

/// Capability to decode one body encoding into a [`Payload`].
///
/// Decoding is all-or-nothing per record: an error leaves no partial
/// payload behind. `offset` is the absolute byte position of the body's
/// first character, used to report offending ranges.
pub trait BodyDecoder {
    fn decode(&self, body: &str, offset: usize) -> Result<Payload, BodyError>;
}

/// Decoder for `ascii` bodies.
///
/// Accepts printable ASCII (0x20–0x7E) plus tab, carriage return, and
/// newline, since bodies may span lines. The payload is the text unchanged.
pub struct AsciiDecoder;

impl BodyDecoder for AsciiDecoder {
    fn decode(&self, body: &str, offset: usize) -> Result<Payload, BodyError> {
        for (i, b) in body.bytes().enumerate() {
            let acceptable = (0x20..=0x7e).contains(&b) || matches!(b, b'\t' | b'\r' | b'\n');
            if !acceptable {
                return Err(BodyError::Malformed {
                    kind: BodyKind::Ascii,
                    start: offset + i,
                    end: offset + i + 1,
                    reason: format!("byte 0x{b:02x} is outside the printable ASCII range"),
                });
            }
        }
        Ok(Payload::Text(body.to_string()))
    }
}

/// Decoder for `hex16` bodies: consecutive groups of four hex digits,
/// each decoding to one big-endian 16-bit value.
///
/// Whitespace inside the body is ignored, so hex groups may be split
/// across spaces or lines.
pub struct Hex16Decoder;

impl BodyDecoder for Hex16Decoder {
    fn decode(&self, body: &str, offset: usize) -> Result<Payload, BodyError> {
        let mut digits = Vec::with_capacity(body.len());
        for (i, c) in body.char_indices() {
            if c.is_whitespace() {
                continue;
            }
            match c.to_digit(16) {
                Some(digit) => digits.push(digit as u16),
                None => {
                    return Err(BodyError::Malformed {
                        kind: BodyKind::Hex16,
                        start: offset + i,
                        end: offset + i + c.len_utf8(),
                        reason: format!("{c:?} is not a hexadecimal digit"),
                    });
                }
            }
        }
        if digits.len() % 4 != 0 {
            return Err(BodyError::Malformed {
                kind: BodyKind::Hex16,
                start: offset,
                end: offset + body.len(),
                reason: format!(
                    "{} hex digits do not divide into 16-bit groups of four",
                    digits.len()
                ),
            });
        }
        let words = digits
            .chunks(4)
            .map(|group| group.iter().fold(0u16, |word, digit| (word << 4) | digit))
            .collect();
        Ok(Payload::Words(words))
    }
}

/// Registry-driven body decoding stage.
#[derive(Default)]
pub struct SemanticsParser {
    decoders: HashMap<BodyKind, Box<dyn BodyDecoder>>,
}

impl SemanticsParser {
    /// An empty registry; decoders must be registered before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with both core decoders (`ascii`, `hex16`) registered.
    pub fn with_core_decoders() -> Self {
        let mut parser = Self::new();
        parser.register(BodyKind::Ascii, Box::new(AsciiDecoder));
        parser.register(BodyKind::Hex16, Box::new(Hex16Decoder));
        parser
    }

    /// Register (or replace) the decoder for a body-type tag.
    pub fn register(&mut self, kind: BodyKind, decoder: Box<dyn BodyDecoder>) {
        self.decoders.insert(kind, decoder);
    }

    /// Decode a structural message's body according to its tag.
    pub fn decode(&self, message: &StructuralMessage) -> Result<DecodedMessage, BodyError> {
        let decoder = self
            .decoders
            .get(&message.kind)
            .ok_or(BodyError::Unsupported {
                kind: message.kind,
                line: message.line,
            })?;
        let payload = decoder.decode(&message.body, message.body_offset)?;
        Ok(DecodedMessage {
            id: message.id,
            next_id: message.next_id,
            payload,
            offset: message.offset,
            line: message.line,
        })
    }
}
