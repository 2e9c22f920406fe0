//! Substitution-matrix engine.

use log::debug;

use super::{align_local, ReconstructionEngine};
use crate::alignment::{AlignmentResult, EngineKind};
use crate::config::AlignerParameters;
use crate::device::Device;
use crate::kernel::MatrixKernel;
use crate::scoring::{GapPenalties, SubstitutionMatrix};
use crate::AlignerError;

/// Scores every cell through the profile row of its row residue.
pub struct MatrixEngine<'p> {
    matrix: &'p SubstitutionMatrix,
    gaps: GapPenalties,
}

impl<'p> MatrixEngine<'p> {
    pub fn new(matrix: &'p SubstitutionMatrix, gaps: GapPenalties) -> Self {
        Self { matrix, gaps }
    }
}

impl ReconstructionEngine for MatrixEngine<'_> {
    fn kind(&self) -> EngineKind {
        EngineKind::SubstitutionMatrix
    }

    fn align(
        &self,
        device: &Device,
        row: &[u8],
        col: &[u8],
        params: &AlignerParameters,
    ) -> Result<AlignmentResult, AlignerError> {
        debug!(
            "substitution-matrix engine: {} x {} residues, alphabet of {}",
            row.len(),
            col.len(),
            self.matrix.alphabet().len()
        );
        let kernel = MatrixKernel::new(self.matrix, self.gaps);
        align_local(device, &kernel, self.kind(), row, col, params)
    }
}
