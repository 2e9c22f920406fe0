//! Match/mismatch engine.

use log::debug;

use super::{align_local, ReconstructionEngine};
use crate::alignment::{AlignmentResult, EngineKind};
use crate::config::AlignerParameters;
use crate::device::Device;
use crate::kernel::MatchKernel;
use crate::scoring::{GapPenalties, MatchMismatch};
use crate::AlignerError;

pub struct MatchEngine {
    scheme: MatchMismatch,
    gaps: GapPenalties,
}

impl MatchEngine {
    pub fn new(scheme: MatchMismatch, gaps: GapPenalties) -> Self {
        Self { scheme, gaps }
    }
}

impl ReconstructionEngine for MatchEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::MatchMismatch
    }

    fn align(
        &self,
        device: &Device,
        row: &[u8],
        col: &[u8],
        params: &AlignerParameters,
    ) -> Result<AlignmentResult, AlignerError> {
        debug!(
            "match/mismatch engine: {} x {} residues, {}/{}",
            row.len(),
            col.len(),
            self.scheme.match_score,
            self.scheme.mismatch
        );
        let kernel = MatchKernel::new(self.scheme, self.gaps);
        align_local(device, &kernel, self.kind(), row, col, params)
    }
}
