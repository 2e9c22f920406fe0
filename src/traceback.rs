//! Base case of the reconstruction: full matrix and explicit traceback.

use log::trace;

use crate::alignment::Position;
use crate::alignment_mode::{Direction, GapState, Origin};
use crate::device::{DeviceBuffer, Workspace};
use crate::evaluator::{Cell, Plan};
use crate::kernel::{RowKernel, RowScorer};
use crate::scoring::{is_feasible, Score, NEG_INF};
use crate::AlignerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracebackOperation {
    Match,
    Mismatch,
    /// Column residue against a gap.
    Insertion,
    /// Row residue against a gap.
    Deletion,
}

pub struct TracebackMatrix<'w> {
    data: DeviceBuffer<'w, Cell>,
    rows: usize,
    cols: usize,
}

impl<'w> TracebackMatrix<'w> {
    pub fn new(workspace: &'w Workspace<'_>, rows: usize, cols: usize) -> Result<Self, AlignerError> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            AlignerError::MemoryError(format!("Traceback matrix of {} x {} cells", rows, cols))
        })?;
        Ok(Self {
            data: workspace.alloc(len, Cell::EMPTY)?,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.data[row * self.cols + col]
    }

    fn row_mut(&mut self, row: usize) -> &mut [Cell] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }
}

/// Optimal path through the block `rows x cols` from its top-left node
/// (entered after a step of kind `entry`) to its bottom-right node (entered
/// by a step of kind `exit`). Nodes are offset by `offset`.
///
/// Ties prefer the Match predecessor, then RowGap, then ColumnGap.
pub fn solve<K: RowKernel>(
    workspace: &Workspace<'_>,
    kernel: &K,
    rows: &[u8],
    cols: &[u8],
    entry: GapState,
    exit: GapState,
    offset: Position,
) -> Result<(Score, Vec<Position>), AlignerError> {
    let gaps = kernel.gaps();
    let plan = Plan::anchored(Origin::Entry(entry), &gaps);
    let row_codes = workspace.upload(rows, Direction::Forward, |r| kernel.encode(r))?;
    let col_codes = workspace.upload(cols, Direction::Forward, |r| kernel.encode(r))?;
    let (height, width) = (rows.len(), cols.len());

    let mut matrix = TracebackMatrix::new(workspace, height + 1, width + 1)?;
    plan.first_row(matrix.row_mut(0), &gaps);
    for i in 1..=height {
        let row = kernel.row(row_codes[i - 1]);
        let head = plan.column_head(matrix.get(i - 1, 0), i, &gaps);
        matrix.set(i, 0, head);
        for j in 1..=width {
            let cell = plan.relax(
                matrix.get(i - 1, j - 1),
                matrix.get(i - 1, j),
                matrix.get(i, j - 1),
                row.score(col_codes[j - 1]),
                &gaps,
            );
            matrix.set(i, j, cell);
        }
    }

    let score = matrix.get(height, width).get(exit);
    if !is_feasible(score) {
        return Err(AlignerError::InvalidRange(format!(
            "no path through a {} x {} block ends in {:?}",
            height, width, exit
        )));
    }

    let lost = |i: usize, j: usize| {
        AlignerError::InvalidRange(format!("traceback lost its predecessor at node ({}, {})", i, j))
    };

    let mut path = Vec::with_capacity(height + width + 1);
    let (mut i, mut j) = (height, width);
    let mut state = exit;
    path.push(Position::new(offset.i + i, offset.j + j));
    while (i, j) != (0, 0) {
        let value = matrix.get(i, j).get(state);
        state = match state {
            GapState::Match => {
                if i == 0 || j == 0 {
                    return Err(lost(i, j));
                }
                let target = value - kernel.row(row_codes[i - 1]).score(col_codes[j - 1]);
                i -= 1;
                j -= 1;
                let diagonal = matrix.get(i, j);
                GapState::ALL
                    .into_iter()
                    .find(|&s| diagonal.get(s) == target)
                    .ok_or_else(|| lost(i, j))?
            }
            GapState::RowGap => {
                if i == 0 {
                    return Err(lost(i, j));
                }
                i -= 1;
                let up = matrix.get(i, j);
                if (i, j) == (0, 0) || (up.m - gaps.open).max(NEG_INF) == value {
                    GapState::Match
                } else if (up.x - gaps.extend).max(NEG_INF) == value {
                    GapState::RowGap
                } else {
                    return Err(lost(i, j));
                }
            }
            GapState::ColumnGap => {
                if j == 0 {
                    return Err(lost(i, j));
                }
                j -= 1;
                let left = matrix.get(i, j);
                if (i, j) == (0, 0) || (left.m - gaps.open).max(NEG_INF) == value {
                    GapState::Match
                } else if (left.y - gaps.extend).max(NEG_INF) == value {
                    GapState::ColumnGap
                } else {
                    return Err(lost(i, j));
                }
            }
        };
        path.push(Position::new(offset.i + i, offset.j + j));
    }
    path.reverse();

    trace!(
        "base case {}x{} at ({}, {}): score {}, {} steps",
        height,
        width,
        offset.i,
        offset.j,
        score,
        path.len() - 1
    );
    Ok((score, path))
}
