//! Top-level composition: structural parse → body decode → organize.
//!
//! [`SplitByPipeline`] drives the full run over one input, applying the
//! injected [`ErrorPolicy`] to per-record errors and aggregating every
//! non-fatal report for the presentation layer instead of losing it.

use crate::error::{RunError, StageError};
use crate::organize::{Organizer, PipelineChain};
use crate::semantics::SemanticsParser;
use crate::structure::RecordStream;

/// How a run reacts to per-record structural and semantic errors.
///
/// Organizing errors are not subject to the policy: they invalidate the
/// whole reconstruction and always abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first malformed record.
    Abort,
    /// Record the error, skip the record, continue with the next one.
    #[default]
    SkipAndContinue,
}

/// Result of a successful run: the reconstructed chains plus everything
/// non-fatal that went wrong along the way.
#[derive(Debug)]
pub struct RunOutcome {
    /// Chains in first-arrival order.
    pub chains: Vec<PipelineChain>,
    /// Skipped-record and incomplete-chain reports, in occurrence order.
    pub reports: Vec<StageError>,
}

impl RunOutcome {
    pub fn has_reports(&self) -> bool {
        !self.reports.is_empty()
    }
}

/// Composes the record stream, the body decoders, and the organizer into
/// one pipeline-splitting run.
pub struct SplitByPipeline {
    semantics: SemanticsParser,
    policy: ErrorPolicy,
}

impl SplitByPipeline {
    pub fn new(semantics: SemanticsParser, policy: ErrorPolicy) -> Self {
        Self { semantics, policy }
    }

    /// Run the full split over one input.
    ///
    /// On `Err`, partially built chains are discarded; they are never
    /// returned as if complete.
    pub fn run(&self, input: &str) -> Result<RunOutcome, RunError> {
        let mut organizer = Organizer::new();
        let mut reports = Vec::new();

        for outcome in RecordStream::new(input) {
            let structural = match outcome {
                Ok(message) => message,
                Err(err) => {
                    self.note(StageError::Structure(err), &mut reports)?;
                    continue;
                }
            };
            let decoded = match self.semantics.decode(&structural) {
                Ok(message) => message,
                Err(err) => {
                    self.note(StageError::Body(err), &mut reports)?;
                    continue;
                }
            };
            organizer.ingest(decoded).map_err(RunError::Organize)?;
        }

        let (chains, incomplete) = organizer.finalize();
        reports.extend(incomplete.into_iter().map(StageError::Organize));
        Ok(RunOutcome { chains, reports })
    }

    fn note(&self, error: StageError, reports: &mut Vec<StageError>) -> Result<(), RunError> {
        match self.policy {
            ErrorPolicy::Abort => Err(RunError::Aborted(error)),
            ErrorPolicy::SkipAndContinue => {
                tracing::warn!(%error, "skipping record");
                reports.push(error);
                Ok(())
            }
        }
    }
}
