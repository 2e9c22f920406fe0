//! Linear-space reconstruction of the optimal local alignment.

pub mod mm;
pub mod sm;

use std::time::Instant;

use log::{debug, trace};

use crate::alignment::{AlignmentResult, EngineKind, Position, ReconstructionStats};
use crate::alignment_mode::{Direction, GapState, Origin};
use crate::config::AlignerParameters;
use crate::device::Device;
use crate::evaluator::{Evaluator, ScoreVector};
use crate::kernel::RowKernel;
use crate::scoring::{is_feasible, GapPenalties, Score, MAX_SCORE_MAGNITUDE};
use crate::traceback;
use crate::{AlignerError, MAX_SEQUENCE_SIZE};

pub use mm::MatchEngine;
pub use sm::MatrixEngine;

/// One reconstruction strategy. Implementations differ only in the kernel
/// they hand to the shared recursion.
pub trait ReconstructionEngine {
    fn kind(&self) -> EngineKind;

    fn align(
        &self,
        device: &Device,
        row: &[u8],
        col: &[u8],
        params: &AlignerParameters,
    ) -> Result<AlignmentResult, AlignerError>;
}

/// Rectangular block of the problem in residue coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubProblem {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
    /// Kind of the step that led into the top-left node.
    pub entry: GapState,
    /// Kind of the last step into the bottom-right node.
    pub exit: GapState,
}

impl SubProblem {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn origin(&self) -> Position {
        Position::new(self.row_start, self.col_start)
    }
}

/// Best way to cross the cut row of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    /// Column node, relative to the block.
    pub column: usize,
    /// State of the path at the crossing node.
    pub state: GapState,
    pub score: Score,
}

/// Combines the forward vector of the upper half with the reverse vector of
/// the lower half. A gap running through the cut was charged its open penalty
/// on both sides, so one open is refunded for it; a row gap can never be
/// followed by a column gap or vice versa.
///
/// Ties go to the lowest column, then to the state order Match, RowGap,
/// ColumnGap. `None` if no crossing is feasible.
pub fn find_crossing(forward: &ScoreVector, reverse: &ScoreVector, gaps: &GapPenalties) -> Option<Crossing> {
    let mut best: Option<Crossing> = None;
    for (column, (head, tail)) in forward.cells().iter().zip(reverse.cells()).enumerate() {
        for state in GapState::ALL {
            let before = head.get(state);
            if !is_feasible(before) {
                continue;
            }
            let after = GapState::ALL
                .into_iter()
                .filter(|&next| is_feasible(tail.get(next)))
                .filter_map(|next| state.junction(next, gaps).map(|refund| tail.get(next) + refund))
                .max();
            let Some(after) = after else { continue };

            let score = before + after;
            if best.map_or(true, |b| score > b.score) {
                best = Some(Crossing { column, state, score });
            }
        }
    }
    best
}

/// Scores along a path cannot leave the representable range for inputs of
/// this size under this kernel.
pub fn check_capacity<K: RowKernel>(kernel: &K, rows: usize, cols: usize) -> Result<(), AlignerError> {
    let longest = rows.max(cols);
    if longest > MAX_SEQUENCE_SIZE {
        return Err(AlignerError::SequenceTooLarge(longest));
    }
    let gaps = kernel.gaps();
    gaps.validate()?;
    let per_step = i64::from(kernel.max_magnitude()) + i64::from(gaps.open) + i64::from(gaps.extend);
    let worst = per_step.checked_mul((rows + cols + 2) as i64);
    match worst {
        Some(worst) if worst <= i64::from(MAX_SCORE_MAGNITUDE) => Ok(()),
        _ => Err(AlignerError::SequenceTooLarge(longest)),
    }
}

/// The recursion shared by both engines.
pub struct Reconstructor<'a, K> {
    evaluator: Evaluator<'a, K>,
    rows: &'a [u8],
    cols: &'a [u8],
    gaps: GapPenalties,
    base_case_rows: usize,
    stats: ReconstructionStats,
}

impl<'a, K: RowKernel> Reconstructor<'a, K> {
    pub fn new(evaluator: Evaluator<'a, K>, rows: &'a [u8], cols: &'a [u8], base_case_rows: usize) -> Self {
        Self {
            gaps: evaluator.kernel().gaps(),
            evaluator,
            rows,
            cols,
            base_case_rows: base_case_rows.max(1),
            stats: ReconstructionStats::default(),
        }
    }

    pub fn stats(&self) -> &ReconstructionStats {
        &self.stats
    }

    pub fn into_stats(self) -> ReconstructionStats {
        self.stats
    }

    /// Optimal path through `sub`, from its top-left to its bottom-right node.
    pub fn reconstruct(&mut self, sub: SubProblem) -> Result<Vec<Position>, AlignerError> {
        check_bounds(&sub, self.rows.len(), self.cols.len())?;
        let (height, width) = (sub.rows(), sub.cols());

        if height == 0 || width == 0 {
            self.stats.straight_runs += 1;
            return Ok(straight_run(&sub));
        }

        if height <= self.base_case_rows {
            self.stats.base_cases += 1;
            let (_, path) = traceback::solve(
                self.evaluator.workspace(),
                self.evaluator.kernel(),
                &self.rows[sub.row_start..sub.row_end],
                &self.cols[sub.col_start..sub.col_end],
                sub.entry,
                sub.exit,
                sub.origin(),
            )?;
            return Ok(path);
        }

        let mid = sub.row_start + height / 2;
        let cols = &self.cols[sub.col_start..sub.col_end];
        let forward = self.evaluator.score_row(
            &self.rows[sub.row_start..mid],
            cols,
            Origin::Entry(sub.entry),
            Direction::Forward,
        )?;
        let reverse = self.evaluator.score_row(
            &self.rows[mid..sub.row_end],
            cols,
            Origin::Exit(sub.exit),
            Direction::Reverse,
        )?;
        self.stats.evaluator_calls += 2;
        self.stats.splits += 1;

        let crossing = find_crossing(&forward, &reverse, &self.gaps).ok_or_else(|| {
            AlignerError::InvalidRange(format!(
                "no feasible crossing of row {} in block {:?}",
                mid, sub
            ))
        })?;
        let cut = sub.col_start + crossing.column;
        trace!(
            "split rows {}..{} cols {}..{} at ({}, {}) in {:?}, score {}",
            sub.row_start,
            sub.row_end,
            sub.col_start,
            sub.col_end,
            mid,
            cut,
            crossing.state,
            crossing.score
        );

        let upper = SubProblem {
            row_end: mid,
            col_end: cut,
            exit: crossing.state,
            ..sub
        };
        let lower = SubProblem {
            row_start: mid,
            col_start: cut,
            entry: crossing.state,
            ..sub
        };

        let mut path = self.reconstruct(upper)?;
        let tail = self.reconstruct(lower)?;
        path.extend(tail.into_iter().skip(1));
        Ok(path)
    }
}

fn check_bounds(sub: &SubProblem, rows: usize, cols: usize) -> Result<(), AlignerError> {
    if sub.row_start > sub.row_end || sub.col_start > sub.col_end || sub.row_end > rows || sub.col_end > cols {
        return Err(AlignerError::InvalidRange(format!(
            "block {:?} outside {} x {} problem",
            sub, rows, cols
        )));
    }
    Ok(())
}

/// A block with no rows or no columns is crossed by a single gap run.
fn straight_run(sub: &SubProblem) -> Vec<Position> {
    let origin = sub.origin();
    let mut path = Vec::with_capacity(sub.rows() + sub.cols() + 1);
    path.push(origin);
    path.extend((1..=sub.rows()).map(|k| Position::new(origin.i + k, origin.j)));
    path.extend((1..=sub.cols()).map(|k| Position::new(origin.i, origin.j + k)));
    path
}

/// Full local alignment with `kernel`: outer local step, then the recursion
/// on the rectangle between the start and end nodes.
pub fn align_local<K: RowKernel>(
    device: &Device,
    kernel: &K,
    engine: EngineKind,
    row: &[u8],
    col: &[u8],
    params: &AlignerParameters,
) -> Result<AlignmentResult, AlignerError> {
    let started = Instant::now();
    check_capacity(kernel, row.len(), col.len())?;
    if row.is_empty() || col.is_empty() {
        return Err(AlignerError::NoAlignmentFound {
            best: 0,
            threshold: params.threshold(),
        });
    }

    let workspace = device.workspace();
    let threads = params.threads().unwrap_or_else(|| kernel.default_threads());
    let evaluator = Evaluator::new(&workspace, kernel, threads);

    let end = evaluator.best_local(row, col)?;
    debug!(
        "{:?}: best local score {} ending at ({}, {})",
        engine, end.score, end.i, end.j
    );
    if end.score <= params.threshold() {
        return Err(AlignerError::NoAlignmentFound {
            best: end.score.max(0),
            threshold: params.threshold(),
        });
    }

    let start = evaluator.best_anchored(&row[..end.i], &col[..end.j])?;
    debug!("{:?}: alignment starts at ({}, {})", engine, start.i, start.j);
    debug_assert_eq!(start.score, end.score);

    let mut reconstructor = Reconstructor::new(evaluator, row, col, params.base_case_rows());
    let path = reconstructor.reconstruct(SubProblem {
        row_start: start.i,
        row_end: end.i,
        col_start: start.j,
        col_end: end.j,
        entry: GapState::Match,
        exit: GapState::Match,
    })?;

    let mut stats = reconstructor.into_stats();
    stats.evaluator_calls += 2;
    stats.peak_device_memory = workspace.peak();
    debug!(
        "{:?}: {} nodes, {} splits, {} base cases, peak {} bytes, {:?}",
        engine,
        path.len(),
        stats.splits,
        stats.base_cases,
        stats.peak_device_memory,
        started.elapsed()
    );

    Ok(AlignmentResult {
        score: end.score,
        start: Position::new(start.i, start.j),
        end: Position::new(end.i, end.j),
        path,
        engine,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::score_path;
    use crate::device::Device;
    use crate::evaluator::Cell;
    use crate::kernel::MatchKernel;
    use crate::scoring::{MatchMismatch, Scorer, NEG_INF};

    const GAPS: GapPenalties = GapPenalties { open: 3, extend: 1 };

    fn kernel() -> MatchKernel {
        MatchKernel::new(MatchMismatch { match_score: 2, mismatch: -2 }, GAPS)
    }

    fn device() -> Device {
        Device::new(&AlignerParameters::new().with_lane_groups(2).unwrap()).unwrap()
    }

    fn vector(cells: Vec<Cell>) -> ScoreVector {
        ScoreVector::new(cells, Direction::Forward)
    }

    #[test]
    fn crossing_refunds_one_open_for_a_gap_through_the_cut() {
        let forward = vector(vec![
            Cell { m: 1, x: NEG_INF, y: NEG_INF },
            Cell { m: NEG_INF, x: 4, y: NEG_INF },
        ]);
        let reverse = vector(vec![
            Cell { m: 0, x: NEG_INF, y: NEG_INF },
            Cell { m: NEG_INF, x: 1, y: 9 },
        ]);
        let crossing = find_crossing(&forward, &reverse, &GAPS).unwrap();
        // row gap continues: 4 + 1 + (3 - 1); the column gap is not reachable
        assert_eq!(
            crossing,
            Crossing {
                column: 1,
                state: GapState::RowGap,
                score: 7
            }
        );
    }

    #[test]
    fn crossing_ties_go_to_lowest_column_then_match() {
        let forward = vector(vec![Cell { m: 2, x: 2, y: NEG_INF }, Cell { m: 2, x: NEG_INF, y: NEG_INF }]);
        let reverse = vector(vec![Cell { m: 1, x: NEG_INF, y: NEG_INF }, Cell { m: 1, x: NEG_INF, y: NEG_INF }]);
        let crossing = find_crossing(&forward, &reverse, &GAPS).unwrap();
        assert_eq!((crossing.column, crossing.state, crossing.score), (0, GapState::Match, 3));
    }

    #[test]
    fn infeasible_vectors_have_no_crossing() {
        let forward = vector(vec![Cell::EMPTY; 3]);
        let reverse = vector(vec![Cell { m: 5, x: 5, y: 5 }; 3]);
        assert_eq!(find_crossing(&forward, &reverse, &GAPS), None);
    }

    #[test]
    fn split_and_direct_solve_agree() {
        let device = device();
        let workspace = device.workspace();
        let k = kernel();
        let scorer = Scorer::simple(2, -2, GAPS);
        let rows = b"GATTACAGATTTACCAGGATACCAGTTAGCATGCA";
        let cols = b"GCATGCTTACGATTACACAGGATTAGACCCATAG";

        for entry in GapState::ALL {
            for exit in GapState::ALL {
                let sub = SubProblem {
                    row_start: 0,
                    row_end: rows.len(),
                    col_start: 0,
                    col_end: cols.len(),
                    entry,
                    exit,
                };
                let (direct, _) =
                    traceback::solve(&workspace, &k, rows, cols, entry, exit, Position::new(0, 0)).unwrap();

                let evaluator = Evaluator::new(&workspace, &k, 5);
                let mut reconstructor = Reconstructor::new(evaluator, rows, cols, 4);
                let path = reconstructor.reconstruct(sub).unwrap();
                assert!(reconstructor.stats().splits > 0);

                let mut replayed = score_path(&path, rows, cols, &scorer).unwrap();
                // the replay assumes a Match entry; account for a continued gap
                if let Some(first) = path[0].step_to(&path[1]) {
                    if first == entry && entry != GapState::Match {
                        replayed += GAPS.open - GAPS.extend;
                    }
                }
                assert_eq!(replayed, direct, "entry {:?}, exit {:?}", entry, exit);
                assert_eq!(path[path.len() - 2].step_to(&path[path.len() - 1]), Some(exit));
            }
        }
    }

    #[test]
    fn straight_runs_follow_the_only_open_direction() {
        let sub = SubProblem {
            row_start: 3,
            row_end: 6,
            col_start: 2,
            col_end: 2,
            entry: GapState::Match,
            exit: GapState::RowGap,
        };
        assert_eq!(
            straight_run(&sub),
            vec![Position::new(3, 2), Position::new(4, 2), Position::new(5, 2), Position::new(6, 2)]
        );
    }

    #[test]
    fn out_of_bounds_blocks_are_rejected() {
        let device = device();
        let workspace = device.workspace();
        let k = kernel();
        let evaluator = Evaluator::new(&workspace, &k, 4);
        let mut reconstructor = Reconstructor::new(evaluator, b"ACGT", b"ACGT", 2);
        let sub = SubProblem {
            row_start: 0,
            row_end: 5,
            col_start: 0,
            col_end: 4,
            entry: GapState::Match,
            exit: GapState::Match,
        };
        assert!(matches!(
            reconstructor.reconstruct(sub),
            Err(AlignerError::InvalidRange(_))
        ));
    }

    #[test]
    fn capacity_rejects_scores_that_could_overflow() {
        let k = MatchKernel::new(
            MatchMismatch { match_score: 1_000_000, mismatch: -1 },
            GapPenalties { open: 10, extend: 1 },
        );
        assert!(check_capacity(&k, 10, 10).is_ok());
        assert!(matches!(
            check_capacity(&k, 200, 200),
            Err(AlignerError::SequenceTooLarge(200))
        ));
        assert!(matches!(
            check_capacity(&kernel(), MAX_SEQUENCE_SIZE + 1, 1),
            Err(AlignerError::SequenceTooLarge(_))
        ));

        let extreme = MatchKernel::new(MatchMismatch { match_score: Score::MIN, mismatch: -1 }, GAPS);
        assert!(matches!(
            check_capacity(&extreme, 1, 1),
            Err(AlignerError::SequenceTooLarge(1))
        ));
    }

    #[test]
    fn negative_gap_penalties_fail_before_any_sweep() {
        let device = device();
        let signed = MatchKernel::new(
            MatchMismatch { match_score: 2, mismatch: -1 },
            GapPenalties { open: -2, extend: -1 },
        );
        assert!(matches!(
            check_capacity(&signed, 8, 8),
            Err(AlignerError::InitializationError(_))
        ));
        let err = align_local(
            &device,
            &signed,
            EngineKind::MatchMismatch,
            b"ACACACTA",
            b"AGCACACA",
            &AlignerParameters::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AlignerError::InitializationError(_)));
        assert_eq!(device.workspace().in_use(), 0);
    }

    #[test]
    fn local_alignment_is_found_between_flanks() {
        let device = device();
        let k = kernel();
        let row = b"TTTTGATTACATTTT";
        let col = b"CCGATTACACC";
        let result = align_local(&device, &k, EngineKind::MatchMismatch, row, col, &AlignerParameters::new()).unwrap();
        assert_eq!(result.score, 14);
        assert_eq!(result.start, Position::new(4, 2));
        assert_eq!(result.end, Position::new(11, 9));
        assert_eq!(result.len(), 7);
        assert!(result.stats.peak_device_memory > 0);
    }
}
