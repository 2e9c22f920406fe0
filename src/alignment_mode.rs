use crate::scoring::{GapPenalties, Score, NEG_INF};

/// How the evaluator treats the start of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMode {
    /// Smith-Waterman: a path may start at any cell, M is floored at zero.
    Local,
    /// Paths are anchored at the block origin.
    Anchored,
}

/// Traversal order of a sweep over a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Start-to-end over both ranges.
    Forward,
    /// End-to-start over both ranges.
    Reverse,
}

/// The three DP states, named after the kind of the last step into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapState {
    /// Diagonal step (state M).
    Match,
    /// Row residue against a gap, moving down a column (state X).
    RowGap,
    /// Column residue against a gap, moving along a row (state Y).
    ColumnGap,
}

impl GapState {
    /// Order used for tie-breaking.
    pub const ALL: [GapState; 3] = [GapState::Match, GapState::RowGap, GapState::ColumnGap];

    /// Extra score when a path whose last step is `self` continues with a
    /// step of kind `next`, given that both sides charged their own gap open.
    /// `None` when the recurrence forbids the transition.
    pub fn junction(self, next: GapState, gaps: &GapPenalties) -> Option<Score> {
        match (self, next) {
            (_, GapState::Match) | (GapState::Match, _) => Some(0),
            (GapState::RowGap, GapState::RowGap) | (GapState::ColumnGap, GapState::ColumnGap) => {
                Some(gaps.open - gaps.extend)
            }
            _ => None,
        }
    }
}

/// Boundary condition at the origin node of an anchored sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The step before the origin was of this kind; a gap of the same kind
    /// continues at the extend price.
    Entry(GapState),
    /// The first step out of the origin must be of this kind. Used by reverse
    /// sweeps, where the origin is the block's end node.
    Exit(GapState),
}

/// Scores for the first step out of the origin node, `NEG_INF` where the step
/// is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OriginCosts {
    pub diagonal: Score,
    pub row_gap: Score,
    pub column_gap: Score,
}

impl Origin {
    pub(crate) fn costs(self, gaps: &GapPenalties) -> OriginCosts {
        let open = -gaps.open;
        let extend = -gaps.extend;
        match self {
            Origin::Entry(GapState::Match) => OriginCosts { diagonal: 0, row_gap: open, column_gap: open },
            Origin::Entry(GapState::RowGap) => OriginCosts { diagonal: 0, row_gap: extend, column_gap: NEG_INF },
            Origin::Entry(GapState::ColumnGap) => OriginCosts { diagonal: 0, row_gap: NEG_INF, column_gap: extend },
            Origin::Exit(GapState::Match) => OriginCosts { diagonal: 0, row_gap: NEG_INF, column_gap: NEG_INF },
            Origin::Exit(GapState::RowGap) => OriginCosts { diagonal: NEG_INF, row_gap: open, column_gap: NEG_INF },
            Origin::Exit(GapState::ColumnGap) => OriginCosts { diagonal: NEG_INF, row_gap: NEG_INF, column_gap: open },
        }
    }
}
