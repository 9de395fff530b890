//! Error taxonomy, one enum per pipeline stage.
//!
//! Structural and body errors are per-record and may be skipped under a
//! lenient [`ErrorPolicy`](crate::ErrorPolicy); organizing errors (except
//! the finalize-time incomplete-chain report) are violations of the
//! id-chain invariants and always fatal.

use thiserror::Error;

use crate::message::{BodyKind, MessageId};

/// Errors from the structural parsing stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructureError {
    /// Malformed record text.
    #[error("bad format at line {line} (offset {offset}): {reason}")]
    BadFormat {
        offset: usize,
        line: usize,
        reason: String,
    },
    /// Clean end of input: no more bytes, and the stream ended between
    /// records. `RecordStream` handles this as normal termination; it is
    /// never surfaced as an iterator item.
    #[error("end of input")]
    EndOfInput,
}

impl StructureError {
    pub(crate) fn bad_format(offset: usize, line: usize, reason: impl Into<String>) -> Self {
        Self::BadFormat {
            offset,
            line,
            reason: reason.into(),
        }
    }
}

/// Errors from the semantic (body decoding) stage. The record's
/// structural parse already succeeded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BodyError {
    /// The body does not decode under its declared encoding.
    #[error("invalid {kind} body at offset {start}..{end}: {reason}")]
    Malformed {
        kind: BodyKind,
        /// Absolute byte range of the offending content.
        start: usize,
        end: usize,
        reason: String,
    },
    /// The tag is structurally valid but no decoder is registered for it.
    #[error("no decoder registered for body type \"{kind}\" (record at line {line})")]
    Unsupported { kind: BodyKind, line: usize },
}

/// Violations of the id-chain invariants, plus the non-fatal
/// incomplete-chain report produced at finalize time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrganizeError {
    /// The same id appeared on two records. Never overwritten silently.
    #[error("duplicate message id {id}")]
    DuplicateId { id: MessageId },
    /// Two chains expect the same successor; the stream cannot be
    /// demultiplexed consistently.
    #[error("chains starting at {first_head} and {second_head} both await message {id}")]
    AmbiguousSuccessor {
        id: MessageId,
        first_head: MessageId,
        second_head: MessageId,
    },
    /// A successor reference points back into its own chain.
    #[error("message {id} links back to {next}, which is already in its chain")]
    CyclicReference { id: MessageId, next: MessageId },
    /// The promised successor never arrived. Reported at finalize time,
    /// alongside the chain's collected prefix.
    #[error("chain starting at {head} still awaits message {awaited}, which never arrived")]
    IncompleteChain { head: MessageId, awaited: MessageId },
}

impl OrganizeError {
    /// Whether this error invalidates the whole organizing run.
    /// Only the incomplete-chain report is recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::IncompleteChain { .. })
    }
}

/// Any per-record or finalize-time error collected during a run for
/// later reporting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("structure: {0}")]
    Structure(#[from] StructureError),
    #[error("body: {0}")]
    Body(#[from] BodyError),
    #[error("organize: {0}")]
    Organize(#[from] OrganizeError),
}

/// Fatal outcome of a [`SplitByPipeline`](crate::SplitByPipeline) run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    /// A record failed to parse or decode under the abort policy.
    #[error("aborted on first error: {0}")]
    Aborted(StageError),
    /// The id-chain invariants were violated; fatal under every policy.
    #[error(transparent)]
    Organize(OrganizeError),
}
