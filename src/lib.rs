use thiserror::Error;

pub mod alignment;
pub mod alignment_mode;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod evaluator;
pub mod kernel;
pub mod reconstruct;
pub mod scoring;
pub mod traceback;

pub use alignment::{AlignmentResult, AlignmentStats, EngineKind, Position, ReconstructionStats};
pub use alignment_mode::{AlignmentMode, Direction, GapState, Origin};
pub use config::AlignerParameters;
pub use device::Device;
pub use scoring::{GapPenalties, MatchMismatch, MatcherCategory, Score, Scorer, ScoringPolicy, SubstitutionMatrix};
pub use traceback::TracebackOperation;

use crate::device::Workspace;

// Lane-group and worker limits
pub const THREADS_COUNT: usize = 128;
pub const MAX_THREADS_COUNT: usize = 1024;
pub const MAX_BLOCKS_COUNT: usize = 512;
pub const MAX_SEQUENCE_SIZE: usize = 134_150_000;

#[derive(Debug, Error)]
pub enum AlignerError {
    #[error("Initialization failed: {0}")]
    InitializationError(String),
    #[error("Sequence too large: {0}")]
    SequenceTooLarge(usize),
    #[error("Memory allocation failed: {0}")]
    MemoryError(String),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("Unsupported matcher: {0}")]
    UnsupportedMatcher(String),
    #[error("No alignment found: best score {best} does not exceed threshold {threshold}")]
    NoAlignmentFound { best: Score, threshold: Score },
}

impl AlignerError {
    /// The request completed but no local alignment cleared the threshold.
    pub fn is_no_alignment(&self) -> bool {
        matches!(self, AlignerError::NoAlignmentFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    data: Vec<u8>,
}

impl Sequence {
    pub fn new(data: &[u8]) -> Self {
        Self { data: data.to_vec() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&str> for Sequence {
    fn from(residues: &str) -> Self {
        Self::new(residues.as_bytes())
    }
}

/// Owns the device and answers alignment requests.
pub struct Aligner {
    device: Device,
    params: AlignerParameters,
}

impl Aligner {
    pub fn new(params: AlignerParameters) -> Result<Self, AlignerError> {
        let device = Device::new(&params)?;
        log::debug!(
            "aligner ready: {} lane groups, {} byte budget",
            device.lane_groups(),
            device.memory_budget()
        );
        Ok(Self { device, params })
    }

    pub fn params(&self) -> &AlignerParameters {
        &self.params
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Optimal local alignment of `row` against `col`.
    pub fn align(
        &self,
        row: &Sequence,
        col: &Sequence,
        policy: &dyn ScoringPolicy,
    ) -> Result<AlignmentResult, AlignerError> {
        dispatch::reconstruct(&self.device, row.as_bytes(), col.as_bytes(), policy, &self.params)
    }

    /// Fresh memory scope on this aligner's device.
    pub fn workspace(&self) -> Workspace<'_> {
        self.device.workspace()
    }
}
