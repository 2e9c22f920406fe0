//! Alignment results handed back to callers.

use crate::alignment_mode::GapState;
use crate::scoring::{Score, ScoringPolicy};
use crate::traceback::TracebackOperation;

/// DP node: `i` row residues and `j` column residues consumed, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub i: usize,
    pub j: usize,
}

impl Position {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    /// Kind of the single step from `self` to `next`, if they are adjacent.
    pub fn step_to(&self, next: &Position) -> Option<GapState> {
        match (next.i.checked_sub(self.i), next.j.checked_sub(self.j)) {
            (Some(1), Some(1)) => Some(GapState::Match),
            (Some(1), Some(0)) => Some(GapState::RowGap),
            (Some(0), Some(1)) => Some(GapState::ColumnGap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    SubstitutionMatrix,
    MatchMismatch,
}

/// Work done while reconstructing one alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructionStats {
    pub splits: usize,
    pub base_cases: usize,
    pub straight_runs: usize,
    pub evaluator_calls: usize,
    pub peak_device_memory: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentStats {
    pub matches: u32,
    pub mismatches: u32,
    pub gaps: u32,
    pub gap_opens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentResult {
    pub score: Score,
    /// First node of the alignment: `row[start.i..end.i]` aligns against
    /// `col[start.j..end.j]`.
    pub start: Position,
    pub end: Position,
    /// Every node from `start` to `end`.
    pub path: Vec<Position>,
    pub engine: EngineKind,
    pub stats: ReconstructionStats,
}

impl AlignmentResult {
    /// Number of alignment columns.
    pub fn len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn operations(&self, row: &[u8], col: &[u8]) -> Vec<TracebackOperation> {
        self.path
            .windows(2)
            .filter_map(|pair| {
                let (from, to) = (pair[0], pair[1]);
                from.step_to(&to).map(|step| match step {
                    GapState::Match if row[from.i].eq_ignore_ascii_case(&col[from.j]) => TracebackOperation::Match,
                    GapState::Match => TracebackOperation::Mismatch,
                    GapState::RowGap => TracebackOperation::Deletion,
                    GapState::ColumnGap => TracebackOperation::Insertion,
                })
            })
            .collect()
    }

    pub fn statistics(&self, row: &[u8], col: &[u8]) -> AlignmentStats {
        let mut stats = AlignmentStats::default();
        let mut previous: Option<TracebackOperation> = None;
        for op in self.operations(row, col) {
            match op {
                TracebackOperation::Match => stats.matches += 1,
                TracebackOperation::Mismatch => stats.mismatches += 1,
                TracebackOperation::Insertion | TracebackOperation::Deletion => {
                    stats.gaps += 1;
                    if previous != Some(op) {
                        stats.gap_opens += 1;
                    }
                }
            }
            previous = Some(op);
        }
        stats
    }
}

/// Replays the cost of `path` under `policy`: substitution scores for
/// diagonal steps, `open` for the first step of a gap run and `extend` for
/// each further step of the same kind. `None` if two consecutive nodes are
/// not one step apart.
pub fn score_path(path: &[Position], row: &[u8], col: &[u8], policy: &dyn ScoringPolicy) -> Option<Score> {
    let gaps = policy.gaps();
    let mut score = 0;
    let mut previous = GapState::Match;
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let step = from.step_to(&to)?;
        score += match step {
            GapState::Match => policy.score(*row.get(from.i)?, *col.get(from.j)?),
            gap if gap == previous => -gaps.extend,
            _ => -gaps.open,
        };
        previous = step;
    }
    Some(score)
}
