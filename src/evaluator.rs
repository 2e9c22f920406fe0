//! Score-recurrence evaluator.
//!
//! Sweeps the affine-gap recurrence row by row over a block while keeping only
//! two rows of cells resident, so a boundary score vector costs `O(C)` device
//! memory regardless of how many rows were swept:
//!
//! ```text
//! M[i][j] = max(M, X, Y)[i-1][j-1] + score(row[i], col[j])
//! X[i][j] = max(M[i-1][j] - open, X[i-1][j] - extend)
//! Y[i][j] = max(M[i][j-1] - open, Y[i][j-1] - extend)
//! ```
//!
//! Y chains along the row, so its carries cross lane groups in a short
//! sequential pass between two parallel ones.

use rayon::prelude::*;

use crate::alignment_mode::{AlignmentMode, Direction, GapState, Origin, OriginCosts};
use crate::device::{DeviceBuffer, Workspace};
use crate::kernel::{RowKernel, RowScorer};
use crate::scoring::{is_feasible, GapPenalties, Score, NEG_INF};
use crate::AlignerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub m: Score,
    pub x: Score,
    pub y: Score,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        m: NEG_INF,
        x: NEG_INF,
        y: NEG_INF,
    };

    #[inline]
    pub fn best(&self) -> Score {
        self.m.max(self.x).max(self.y)
    }

    #[inline]
    pub fn get(&self, state: GapState) -> Score {
        match state {
            GapState::Match => self.m,
            GapState::RowGap => self.x,
            GapState::ColumnGap => self.y,
        }
    }
}

#[inline(always)]
fn clamp(score: Score) -> Score {
    score.max(NEG_INF)
}

/// Per-column cells on the boundary row of a swept block, indexed in the
/// original column orientation whatever the sweep direction was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreVector {
    cells: Vec<Cell>,
    direction: Direction,
}

impl ScoreVector {
    pub fn new(cells: Vec<Cell>, direction: Direction) -> Self {
        Self { cells, direction }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, column: usize) -> Cell {
        self.cells[column]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Highest M value seen by a sweep and the node holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestCell {
    pub score: Score,
    pub i: usize,
    pub j: usize,
}

impl BestCell {
    const NONE: BestCell = BestCell {
        score: NEG_INF,
        i: 0,
        j: 0,
    };
}

/// Recurrence boundary for one sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Plan {
    mode: AlignmentMode,
    origin: OriginCosts,
}

impl Plan {
    pub(crate) fn local() -> Self {
        Self {
            mode: AlignmentMode::Local,
            origin: OriginCosts {
                diagonal: NEG_INF,
                row_gap: NEG_INF,
                column_gap: NEG_INF,
            },
        }
    }

    pub(crate) fn anchored(origin: Origin, gaps: &GapPenalties) -> Self {
        Self {
            mode: AlignmentMode::Anchored,
            origin: origin.costs(gaps),
        }
    }

    #[inline(always)]
    fn diagonal_input(&self, diagonal: Cell) -> Score {
        match self.mode {
            AlignmentMode::Local => diagonal.best().max(0),
            AlignmentMode::Anchored => diagonal.best(),
        }
    }

    /// Row 0. In anchored mode the origin cell carries the diagonal start
    /// score in M, and the row holds the column-gap run out of the origin.
    pub(crate) fn first_row(&self, cells: &mut [Cell], gaps: &GapPenalties) {
        cells.fill(Cell::EMPTY);
        if self.mode == AlignmentMode::Local || cells.is_empty() {
            return;
        }
        cells[0].m = self.origin.diagonal;
        let mut run = self.origin.column_gap;
        for cell in cells.iter_mut().skip(1) {
            cell.y = clamp(run);
            run = clamp(run) - gaps.extend;
        }
    }

    /// Column 0 of row `i >= 1`.
    pub(crate) fn column_head(&self, above: Cell, i: usize, gaps: &GapPenalties) -> Cell {
        match self.mode {
            AlignmentMode::Local => Cell::EMPTY,
            AlignmentMode::Anchored => {
                let x = if i == 1 {
                    self.origin.row_gap
                } else {
                    clamp((above.m - gaps.open).max(above.x - gaps.extend))
                };
                Cell { x, ..Cell::EMPTY }
            }
        }
    }

    /// Sequential cell update, the reference the lane groups reproduce.
    #[inline]
    pub(crate) fn relax(&self, diagonal: Cell, up: Cell, left: Cell, score: Score, gaps: &GapPenalties) -> Cell {
        Cell {
            m: clamp(self.diagonal_input(diagonal) + score),
            x: clamp((up.m - gaps.open).max(up.x - gaps.extend)),
            y: clamp((left.m - gaps.open).max(left.y - gaps.extend)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LaneCarry {
    // group-local Y at the group's last column
    last_y: Score,
    len: usize,
    // true Y just left of the group, filled by the carry pass
    incoming: Score,
    best: Score,
    best_col: usize,
}

impl LaneCarry {
    const EMPTY: LaneCarry = LaneCarry {
        last_y: NEG_INF,
        len: 0,
        incoming: NEG_INF,
        best: NEG_INF,
        best_col: 0,
    };
}

struct Sweep<'w> {
    last: DeviceBuffer<'w, Cell>,
    best: BestCell,
}

pub struct Evaluator<'a, K> {
    workspace: &'a Workspace<'a>,
    kernel: &'a K,
    threads: usize,
}

impl<'a, K: RowKernel> Evaluator<'a, K> {
    pub fn new(workspace: &'a Workspace<'a>, kernel: &'a K, threads: usize) -> Self {
        Self {
            workspace,
            kernel,
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn kernel(&self) -> &'a K {
        self.kernel
    }

    pub fn workspace(&self) -> &'a Workspace<'a> {
        self.workspace
    }

    /// Boundary vector after sweeping every row of the block.
    ///
    /// A forward sweep starts at the block's top-left node with `origin`
    /// normally being [`Origin::Entry`]; a reverse sweep starts at the
    /// bottom-right node (normally [`Origin::Exit`]) and its vector describes
    /// the top boundary, where the state of a cell is the kind of the first
    /// step taken out of it.
    pub fn score_row(
        &self,
        rows: &[u8],
        cols: &[u8],
        origin: Origin,
        direction: Direction,
    ) -> Result<ScoreVector, AlignerError> {
        check_block(rows, cols)?;
        let gaps = self.kernel.gaps();
        let row_codes = self.workspace.upload(rows, direction, |r| self.kernel.encode(r))?;
        let col_codes = self.workspace.upload(cols, direction, |r| self.kernel.encode(r))?;

        let sweep = self.sweep(&row_codes, &col_codes, Plan::anchored(origin, &gaps))?;
        let mut cells = sweep.last.download();
        if direction == Direction::Reverse {
            cells.reverse();
        }
        Ok(ScoreVector { cells, direction })
    }

    /// Local forward pass keeping only the running maximum: the end node of
    /// the best local alignment. Ties go to the lowest row, then column.
    pub fn best_local(&self, rows: &[u8], cols: &[u8]) -> Result<BestCell, AlignerError> {
        check_block(rows, cols)?;
        let row_codes = self.workspace.upload(rows, Direction::Forward, |r| self.kernel.encode(r))?;
        let col_codes = self.workspace.upload(cols, Direction::Forward, |r| self.kernel.encode(r))?;
        Ok(self.sweep(&row_codes, &col_codes, Plan::local())?.best)
    }

    /// Reverse pass anchored at the block's bottom-right node, which must be
    /// entered diagonally. Returns the best start node of a path ending
    /// there; ties go to the start closest to the end.
    pub fn best_anchored(&self, rows: &[u8], cols: &[u8]) -> Result<BestCell, AlignerError> {
        check_block(rows, cols)?;
        let gaps = self.kernel.gaps();
        let row_codes = self.workspace.upload(rows, Direction::Reverse, |r| self.kernel.encode(r))?;
        let col_codes = self.workspace.upload(cols, Direction::Reverse, |r| self.kernel.encode(r))?;

        let plan = Plan::anchored(Origin::Exit(GapState::Match), &gaps);
        let best = self.sweep(&row_codes, &col_codes, plan)?.best;
        if !is_feasible(best.score) {
            return Err(AlignerError::InvalidRange(format!(
                "no anchored path reaches node ({}, {})",
                rows.len(),
                cols.len()
            )));
        }
        Ok(BestCell {
            score: best.score,
            i: rows.len() - best.i,
            j: cols.len() - best.j,
        })
    }

    fn sweep<'w>(&'w self, rows: &[u8], cols: &[u8], plan: Plan) -> Result<Sweep<'w>, AlignerError> {
        let gaps = self.kernel.gaps();
        let threads = self.threads;
        let groups = cols.len().div_ceil(threads);

        let mut above = self.workspace.alloc(cols.len() + 1, Cell::EMPTY)?;
        let mut current = self.workspace.alloc(cols.len() + 1, Cell::EMPTY)?;
        let mut carries = self.workspace.alloc(groups, LaneCarry::EMPTY)?;
        plan.first_row(&mut above, &gaps);

        let mut best = BestCell::NONE;
        for (index, &code) in rows.iter().enumerate() {
            let i = index + 1;
            let row = self.kernel.row(code);

            current[0] = plan.column_head(above[0], i, &gaps);
            let head_y = current[0].y;
            let previous: &[Cell] = &above;
            let (_, body) = current.split_at_mut(1);

            self.for_each_group(body, &mut carries, |group, lane, carry| {
                *carry = lane_group_pass(lane, group * threads + 1, previous, cols, row, &plan, &gaps);
            });
            propagate_carries(&mut carries, head_y, gaps.extend);
            self.for_each_group(body, &mut carries, |_, lane, carry| {
                apply_carry(lane, carry, gaps.extend);
            });

            for carry in carries.iter() {
                if carry.best > best.score {
                    best = BestCell {
                        score: carry.best,
                        i,
                        j: carry.best_col,
                    };
                }
            }
            std::mem::swap(&mut above, &mut current);
        }

        Ok(Sweep { last: above, best })
    }

    /// Runs `op` once per lane group; on the device's workers when the row
    /// spans more than one group.
    fn for_each_group<F>(&self, body: &mut [Cell], carries: &mut [LaneCarry], op: F)
    where
        F: Fn(usize, &mut [Cell], &mut LaneCarry) + Send + Sync,
    {
        let threads = self.threads;
        if carries.len() > 1 {
            self.workspace.device().launch(|| {
                body.par_chunks_mut(threads)
                    .zip(carries.par_iter_mut())
                    .enumerate()
                    .for_each(|(group, (lane, carry))| op(group, lane, carry));
            });
        } else {
            for (group, (lane, carry)) in body.chunks_mut(threads).zip(carries.iter_mut()).enumerate() {
                op(group, lane, carry);
            }
        }
    }
}

fn check_block(rows: &[u8], cols: &[u8]) -> Result<(), AlignerError> {
    if rows.is_empty() || cols.is_empty() {
        return Err(AlignerError::InvalidRange(format!(
            "block of {} rows by {} columns",
            rows.len(),
            cols.len()
        )));
    }
    Ok(())
}

/// Phase A: M and X for every column of the group plus a group-local Y scan.
/// M of the column left of the group is recomputed here, it only depends on
/// the previous row.
fn lane_group_pass<R: RowScorer>(
    lane: &mut [Cell],
    first_col: usize,
    previous: &[Cell],
    cols: &[u8],
    row: R,
    plan: &Plan,
    gaps: &GapPenalties,
) -> LaneCarry {
    let mut left_m = if first_col == 1 {
        NEG_INF
    } else {
        let j = first_col - 1;
        clamp(plan.diagonal_input(previous[j - 1]) + row.score(cols[j - 1]))
    };

    let mut y = NEG_INF;
    let mut best = NEG_INF;
    let mut best_col = first_col;
    for (k, cell) in lane.iter_mut().enumerate() {
        let j = first_col + k;
        let up = previous[j];
        let m = clamp(plan.diagonal_input(previous[j - 1]) + row.score(cols[j - 1]));
        let x = clamp((up.m - gaps.open).max(up.x - gaps.extend));
        y = clamp((left_m - gaps.open).max(y - gaps.extend));
        *cell = Cell { m, x, y };

        if m > best {
            best = m;
            best_col = j;
        }
        left_m = m;
    }

    LaneCarry {
        last_y: y,
        len: lane.len(),
        incoming: NEG_INF,
        best,
        best_col,
    }
}

/// Phase B: true Y entering each group, left to right.
fn propagate_carries(carries: &mut [LaneCarry], head_y: Score, extend: Score) {
    let mut incoming = head_y;
    for carry in carries.iter_mut() {
        carry.incoming = incoming;
        let decayed = incoming.saturating_sub(extend.saturating_mul(carry.len as Score));
        incoming = clamp(carry.last_y.max(decayed));
    }
}

/// Phase C: fold the incoming Y run into the group's local scan.
fn apply_carry(lane: &mut [Cell], carry: &LaneCarry, extend: Score) {
    let mut run = carry.incoming;
    for cell in lane.iter_mut() {
        run -= extend;
        if run <= NEG_INF {
            break;
        }
        cell.y = cell.y.max(run);
    }
}
