//! Full-matrix reference used to check the linear-space engines.

#![allow(dead_code)]

use sw_reconstruct::{Aligner, AlignerParameters, Score, ScoringPolicy};

const UNREACHABLE: Score = Score::MIN / 4;

/// Best local score and its end node, ties to the lowest row then column.
/// Same recurrence as the engines: no direct step between the two gap states.
pub fn reference_local(row: &[u8], col: &[u8], policy: &dyn ScoringPolicy) -> (Score, usize, usize) {
    let gaps = policy.gaps();
    let width = col.len() + 1;
    let mut m = vec![UNREACHABLE; (row.len() + 1) * width];
    let mut x = m.clone();
    let mut y = m.clone();
    let mut best = (UNREACHABLE, 0, 0);

    for i in 1..=row.len() {
        for j in 1..=col.len() {
            let at = i * width + j;
            let diag = (i - 1) * width + j - 1;
            let up = (i - 1) * width + j;
            let left = i * width + j - 1;
            m[at] = m[diag].max(x[diag]).max(y[diag]).max(0) + policy.score(row[i - 1], col[j - 1]);
            x[at] = (m[up] - gaps.open).max(x[up] - gaps.extend).max(UNREACHABLE);
            y[at] = (m[left] - gaps.open).max(y[left] - gaps.extend).max(UNREACHABLE);
            if m[at] > best.0 {
                best = (m[at], i, j);
            }
        }
    }
    best
}

pub fn aligner(base_case_rows: usize) -> Aligner {
    let params = AlignerParameters::new()
        .with_lane_groups(3)
        .and_then(|p| p.with_base_case_rows(base_case_rows))
        .unwrap();
    Aligner::new(params).unwrap()
}
