//! Inner-loop scoring kernels.

use crate::scoring::{GapPenalties, MatchMismatch, Score, SubstitutionMatrix};
use crate::THREADS_COUNT;

// Lane-group widths per kernel
pub const SM_THREADS_COUNT: usize = 64;
pub const MM_THREADS_COUNT: usize = THREADS_COUNT;

pub trait RowScorer: Copy + Send + Sync {
    fn score(&self, column: u8) -> Score;
}

pub trait RowKernel: Sync {
    type Row<'k>: RowScorer
    where
        Self: 'k;

    fn encode(&self, residue: u8) -> u8;

    /// Scorer for one row residue (already encoded).
    fn row(&self, code: u8) -> Self::Row<'_>;

    fn gaps(&self) -> GapPenalties;

    fn default_threads(&self) -> usize;

    /// Largest substitution score magnitude, for overflow checks.
    fn max_magnitude(&self) -> u32;
}

/// Substitution-matrix kernel: each row resolves its profile row once, every
/// cell is a single indexed load.
#[derive(Debug, Clone, Copy)]
pub struct MatrixKernel<'m> {
    matrix: &'m SubstitutionMatrix,
    gaps: GapPenalties,
}

impl<'m> MatrixKernel<'m> {
    pub fn new(matrix: &'m SubstitutionMatrix, gaps: GapPenalties) -> Self {
        Self { matrix, gaps }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileRow<'k> {
    scores: &'k [Score],
}

impl RowScorer for ProfileRow<'_> {
    #[inline(always)]
    fn score(&self, column: u8) -> Score {
        self.scores[column as usize]
    }
}

impl RowKernel for MatrixKernel<'_> {
    type Row<'k> = ProfileRow<'k> where Self: 'k;

    fn encode(&self, residue: u8) -> u8 {
        self.matrix.code(residue)
    }

    fn row(&self, code: u8) -> ProfileRow<'_> {
        ProfileRow {
            scores: self.matrix.profile_row(code),
        }
    }

    fn gaps(&self) -> GapPenalties {
        self.gaps
    }

    fn default_threads(&self) -> usize {
        SM_THREADS_COUNT
    }

    fn max_magnitude(&self) -> u32 {
        self.matrix.max_magnitude()
    }
}

/// Match/mismatch kernel: residues are case-folded on upload and compared
/// directly.
#[derive(Debug, Clone, Copy)]
pub struct MatchKernel {
    scheme: MatchMismatch,
    gaps: GapPenalties,
}

impl MatchKernel {
    pub fn new(scheme: MatchMismatch, gaps: GapPenalties) -> Self {
        Self { scheme, gaps }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchRow {
    residue: u8,
    match_score: Score,
    mismatch: Score,
}

impl RowScorer for MatchRow {
    #[inline(always)]
    fn score(&self, column: u8) -> Score {
        if column == self.residue {
            self.match_score
        } else {
            self.mismatch
        }
    }
}

impl RowKernel for MatchKernel {
    type Row<'k> = MatchRow where Self: 'k;

    fn encode(&self, residue: u8) -> u8 {
        residue.to_ascii_uppercase()
    }

    fn row(&self, code: u8) -> MatchRow {
        MatchRow {
            residue: code,
            match_score: self.scheme.match_score,
            mismatch: self.scheme.mismatch,
        }
    }

    fn gaps(&self) -> GapPenalties {
        self.gaps
    }

    fn default_threads(&self) -> usize {
        MM_THREADS_COUNT
    }

    fn max_magnitude(&self) -> u32 {
        self.scheme.match_score.unsigned_abs().max(self.scheme.mismatch.unsigned_abs())
    }
}
