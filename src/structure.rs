//! Structural parsing: framing raw records out of the input and parsing
//! them into [`StructuralMessage`]s.
//!
//! Record grammar (fixed field order, fields separated by whitespace;
//! records need not be line-aligned):
//!
//! ```text
//! <id> <next-id> <body-type> [<body>]
//! ```
//!
//! - `id` and `next-id` are unsigned decimal integers. `id` must be
//!   nonzero; a `next-id` of `0` is the terminal sentinel ("no successor").
//! - `body-type` is a lowercase tag; see [`BodyKind`].
//! - The body is enclosed in square brackets. Brackets nest: the body runs
//!   until the depth returns to zero, inner brackets kept verbatim. Bodies
//!   may span lines.
//!
//! [`RecordStream`] frames one record at a time and delegates to
//! [`parse_record`]. End of input between records terminates the stream
//! cleanly; end of input inside a record is a [`StructureError::BadFormat`].
//! After a malformed record the stream skips to the end of the current
//! line and resumes scanning there.

use crate::error::StructureError;
use crate::message::{BodyKind, MessageId, RawRecord, StructuralMessage, TERMINAL_NEXT_ID};

/// Character cursor with byte-offset and line tracking.
///
/// `base`/`start_line` anchor the scanner inside a larger input, so
/// positions reported from a record-local scan are absolute.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    base: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self::with_origin(text, 0, 1)
    }

    fn with_origin(text: &'a str, base: usize, start_line: usize) -> Self {
        Self {
            text,
            pos: 0,
            base,
            line: start_line,
        }
    }

    /// Absolute byte offset of the cursor.
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Byte position within the scanned text.
    fn local_pos(&self) -> usize {
        self.pos
    }

    fn line(&self) -> usize {
        self.line
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        if c == '\n' {
            self.line += 1;
        }
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// Read a run of non-whitespace characters. Empty at end of input.
    fn read_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            self.bump();
        }
        &self.text[start..self.pos]
    }

    /// Error-recovery point: consume up to and including the next newline.
    fn skip_to_end_of_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }
}

/// Parse one framed record into a [`StructuralMessage`].
///
/// Pure and stateless: identical input always yields identical output.
/// Validates the full grammar: numeric nonzero id, numeric-or-sentinel
/// next-id, known body-type tag, bracketed body, nothing left over.
pub fn parse_record(raw: &RawRecord) -> Result<StructuralMessage, StructureError> {
    let mut sc = Scanner::with_origin(&raw.text, raw.offset, raw.line);

    let id = parse_numeric_field(&mut sc, raw, "id")?;
    if id == TERMINAL_NEXT_ID {
        return Err(StructureError::bad_format(
            raw.offset,
            raw.line,
            format!("id {TERMINAL_NEXT_ID} is reserved as the terminal sentinel"),
        ));
    }

    let next = parse_numeric_field(&mut sc, raw, "next-id")?;
    let next_id = (next != TERMINAL_NEXT_ID).then_some(next);

    sc.skip_whitespace();
    let tag_offset = sc.offset();
    let tag_line = sc.line();
    let tag = sc.read_token();
    if tag.is_empty() {
        return Err(StructureError::bad_format(
            raw.offset,
            raw.line,
            "record ended while reading the body-type field",
        ));
    }
    let kind = BodyKind::from_tag(tag).ok_or_else(|| {
        StructureError::bad_format(tag_offset, tag_line, format!("unknown body type \"{tag}\""))
    })?;

    sc.skip_whitespace();
    match sc.peek() {
        Some('[') => {}
        Some(c) => {
            return Err(StructureError::bad_format(
                sc.offset(),
                sc.line(),
                format!("expected '[' to open the body, found {c:?}"),
            ));
        }
        None => {
            return Err(StructureError::bad_format(
                raw.offset,
                raw.line,
                "record ended while reading the body field",
            ));
        }
    }
    sc.bump();

    let body_offset = sc.offset();
    let body_start = sc.local_pos();
    let mut depth = 1usize;
    loop {
        match sc.bump() {
            Some('[') => depth += 1,
            Some(']') => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Some(_) => {}
            None => {
                return Err(StructureError::bad_format(
                    raw.offset,
                    sc.line(),
                    "record ended inside the body",
                ));
            }
        }
    }
    let body = raw.text[body_start..sc.local_pos() - 1].to_string();

    sc.skip_whitespace();
    if !sc.at_end() {
        return Err(StructureError::bad_format(
            sc.offset(),
            sc.line(),
            "trailing data after the body",
        ));
    }

    Ok(StructuralMessage {
        id,
        next_id,
        kind,
        body,
        offset: raw.offset,
        line: raw.line,
        body_offset,
    })
}

fn parse_numeric_field(
    sc: &mut Scanner<'_>,
    raw: &RawRecord,
    field: &str,
) -> Result<MessageId, StructureError> {
    sc.skip_whitespace();
    let offset = sc.offset();
    let line = sc.line();
    let token = sc.read_token();
    if token.is_empty() {
        return Err(StructureError::bad_format(
            raw.offset,
            raw.line,
            format!("record ended while reading the {field} field"),
        ));
    }
    token.parse::<MessageId>().map_err(|_| {
        StructureError::bad_format(offset, line, format!("non-numeric {field} \"{token}\""))
    })
}

/// Lazy, forward-only stream of structural parse outcomes.
///
/// Frames the next raw record out of the input and delegates to
/// [`parse_record`]. Clean exhaustion ends the iteration; it is never
/// yielded as an error item. Whether a consumer aborts on the first
/// `Err` item or skips it is the consumer's policy, not the stream's.
pub struct RecordStream<'a> {
    input: &'a str,
    scanner: Scanner<'a>,
}

impl<'a> RecordStream<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            scanner: Scanner::new(input),
        }
    }

    /// Frame the next raw record.
    ///
    /// `Err(EndOfInput)` means the input ended between records, the
    /// clean-termination signal consumed by the `Iterator` impl. End of
    /// input after any record character is a `BadFormat` naming the
    /// field that was being read.
    fn next_raw(&mut self) -> Result<RawRecord, StructureError> {
        self.scanner.skip_whitespace();
        if self.scanner.at_end() {
            return Err(StructureError::EndOfInput);
        }
        let start = self.scanner.local_pos();
        let offset = self.scanner.offset();
        let line = self.scanner.line();

        // The id field starts right here; the remaining fields each need
        // more input to exist at all.
        self.scanner.read_token();
        for field in ["next-id", "body-type"] {
            self.scanner.skip_whitespace();
            if self.scanner.at_end() {
                return Err(StructureError::bad_format(
                    offset,
                    self.scanner.line(),
                    format!("end of input while reading the {field} field"),
                ));
            }
            self.scanner.read_token();
        }

        self.scanner.skip_whitespace();
        match self.scanner.peek() {
            Some('[') => {
                self.scanner.bump();
            }
            Some(c) => {
                return Err(StructureError::bad_format(
                    self.scanner.offset(),
                    self.scanner.line(),
                    format!("expected '[' to open the body, found {c:?}"),
                ));
            }
            None => {
                return Err(StructureError::bad_format(
                    offset,
                    self.scanner.line(),
                    "end of input while reading the body field",
                ));
            }
        }
        let mut depth = 1usize;
        loop {
            match self.scanner.bump() {
                Some('[') => depth += 1,
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
                None => {
                    return Err(StructureError::bad_format(
                        offset,
                        self.scanner.line(),
                        "end of input inside the body",
                    ));
                }
            }
        }

        Ok(RawRecord {
            text: self.input[start..self.scanner.local_pos()].to_string(),
            offset,
            line,
        })
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<StructuralMessage, StructureError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.next_raw() {
            Ok(raw) => raw,
            Err(StructureError::EndOfInput) => return None,
            Err(err) => {
                self.scanner.skip_to_end_of_line();
                return Some(Err(err));
            }
        };
        match parse_record(&raw) {
            Ok(message) => Some(Ok(message)),
            Err(err) => {
                self.scanner.skip_to_end_of_line();
                Some(Err(err))
            }
        }
    }
}
