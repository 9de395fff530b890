//! # logdemux-rs
//!
//! Splits one physical stream of log records into the logical pipelines
//! interleaved within it.
//!
//! Each record carries an id and a reference to the id of its successor
//! (or a terminal sentinel). Following those links reconstructs each
//! pipeline's message sequence in its original order, no matter how the
//! records were interleaved or reordered in the physical stream.
//!
//! ## Stages
//!
//! - [`RecordStream`] / [`parse_record`]: frame raw records out of the
//!   input and parse them into structural messages, with a strict split
//!   between "input ended cleanly" and "input is malformed".
//! - [`SemanticsParser`]: decode each raw body into a typed payload
//!   according to its body-type tag (`ascii`, `hex16`).
//! - [`Organizer`]: stitch decoded messages into per-pipeline chains by
//!   their id links, rejecting duplicate ids, ambiguous successors, and
//!   cycles.
//! - [`SplitByPipeline`]: the whole run, with an injected error policy.
//!
//! ## Example
//!
//! ```
//! use logdemux_rs::{ErrorPolicy, SemanticsParser, SplitByPipeline};
//!
//! // The successor arrives before its predecessor; link order wins.
//! let input = "2 0 ascii [CD] 1 2 ascii [AB]";
//! let split = SplitByPipeline::new(
//!     SemanticsParser::with_core_decoders(),
//!     ErrorPolicy::SkipAndContinue,
//! );
//! let outcome = split.run(input).unwrap();
//!
//! assert_eq!(outcome.chains.len(), 1);
//! let ids: Vec<u64> = outcome.chains[0].messages().iter().map(|m| m.id).collect();
//! assert_eq!(ids, vec![1, 2]);
//! ```

pub mod error;
pub mod message;
pub mod organize;
pub mod semantics;
pub mod split;
pub mod structure;

pub use error::{BodyError, OrganizeError, RunError, StageError, StructureError};
pub use message::{
    BodyKind, DecodedMessage, MessageId, Payload, RawRecord, StructuralMessage, TERMINAL_NEXT_ID,
};
pub use organize::{Organizer, PipelineChain};
pub use semantics::{AsciiDecoder, BodyDecoder, Hex16Decoder, SemanticsParser};
pub use split::{ErrorPolicy, RunOutcome, SplitByPipeline};
pub use structure::{RecordStream, parse_record};
