//! Core message types shared by the parsing and organizing stages.
//!
//! A record moves through three representations: [`RawRecord`] (framed but
//! unparsed text), [`StructuralMessage`] (fields extracted, body still raw),
//! and [`DecodedMessage`] (body decoded into a typed [`Payload`]).

use std::fmt;

/// Identifier of a log record. Unique across one input stream.
pub type MessageId = u64;

/// The `next-id` wire value that marks the end of a chain.
///
/// A record whose next-id field equals this sentinel has no successor.
/// Parsed messages carry `next_id: None` instead of the sentinel, so the
/// literal appears only at the wire boundary. Record ids themselves must
/// be nonzero for the same reason.
pub const TERMINAL_NEXT_ID: MessageId = 0;

/// Body encoding tag carried by every record.
///
/// The enumeration is open-ended: adding an encoding means adding a
/// variant here, a decoder implementing `BodyDecoder`, and a registry
/// entry; existing decoders are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Printable ASCII text, passed through unchanged.
    Ascii,
    /// Groups of four hex digits, one 16-bit word each.
    Hex16,
}

impl BodyKind {
    /// Look up a wire tag. Returns `None` for tags outside the enumeration.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ascii" => Some(Self::Ascii),
            "hex16" => Some(Self::Hex16),
            _ => None,
        }
    }

    /// The wire tag for this encoding.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Hex16 => "hex16",
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One raw record as framed out of the input stream.
///
/// Owned by the stream processor for the duration of one parse call;
/// `offset` is the byte position of the record's first character and
/// `line` its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub text: String,
    pub offset: usize,
    pub line: usize,
}

/// A structurally parsed record: fields extracted, body not yet decoded.
///
/// `body_offset` is the absolute byte position of the first body
/// character, so semantic errors can report an exact offending range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMessage {
    pub id: MessageId,
    /// Successor reference; `None` means the chain ends here.
    pub next_id: Option<MessageId>,
    pub kind: BodyKind,
    pub body: String,
    pub offset: usize,
    pub line: usize,
    pub body_offset: usize,
}

/// Decoded body payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// An `ascii` body: validated printable text.
    Text(String),
    /// A `hex16` body: the decoded 16-bit values.
    Words(Vec<u16>),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Words(words) => {
                for (i, word) in words.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{word}")?;
                }
                Ok(())
            }
        }
    }
}

/// A fully parsed message, ready for organizing.
///
/// Immutable once created; the organizer takes ownership on ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub id: MessageId,
    pub next_id: Option<MessageId>,
    pub payload: Payload,
    pub offset: usize,
    pub line: usize,
}
