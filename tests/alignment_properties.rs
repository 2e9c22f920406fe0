//! Randomized checks of the full reconstruction against the full-matrix
//! reference.

mod common;

use proptest::prelude::*;
use sw_reconstruct::alignment::score_path;
use sw_reconstruct::{GapPenalties, Scorer, Sequence, SubstitutionMatrix};

use common::{aligner, reference_local};

fn dna_scorer() -> Scorer {
    Scorer::simple(2, -1, GapPenalties { open: 2, extend: 1 })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reported_score_is_optimal_and_replayable(
        row in "[ACGT]{1,60}",
        col in "[ACGT]{1,60}",
        base_case_rows in 1usize..6,
    ) {
        let aligner = aligner(base_case_rows);
        let scorer = dna_scorer();
        let (best, end_i, end_j) = reference_local(row.as_bytes(), col.as_bytes(), &scorer);

        match aligner.align(&Sequence::from(row.as_str()), &Sequence::from(col.as_str()), &scorer) {
            Ok(result) => {
                prop_assert_eq!(result.score, best);
                prop_assert_eq!((result.end.i, result.end.j), (end_i, end_j));
                prop_assert_eq!(
                    score_path(&result.path, row.as_bytes(), col.as_bytes(), &scorer),
                    Some(result.score)
                );
                prop_assert_eq!(result.path.first().copied(), Some(result.start));
                prop_assert_eq!(result.path.last().copied(), Some(result.end));
            }
            Err(err) => {
                prop_assert!(err.is_no_alignment(), "unexpected error: {}", err);
                prop_assert!(best <= 0);
            }
        }
    }

    #[test]
    fn path_is_monotone_with_unit_steps(
        row in "[ACGT]{1,50}",
        col in "[ACGT]{1,50}",
    ) {
        let aligner = aligner(2);
        if let Ok(result) = aligner.align(&Sequence::from(row.as_str()), &Sequence::from(col.as_str()), &dna_scorer()) {
            for pair in result.path.windows(2) {
                let (di, dj) = (pair[1].i - pair[0].i, pair[1].j - pair[0].j);
                prop_assert!(matches!((di, dj), (1, 1) | (1, 0) | (0, 1)), "step {:?} -> {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn repeated_requests_are_identical(
        row in "[ACGT]{1,50}",
        col in "[ACGT]{1,50}",
    ) {
        let aligner = aligner(3);
        let (row, col) = (Sequence::from(row.as_str()), Sequence::from(col.as_str()));
        let first = aligner.align(&row, &col, &dna_scorer());
        let second = aligner.align(&row, &col, &dna_scorer());
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert!(a.is_no_alignment() && b.is_no_alignment()),
            (a, b) => prop_assert!(false, "diverging outcomes: {:?} / {:?}", a, b),
        }
    }

    #[test]
    fn both_engines_agree_on_equivalent_scoring(
        row in "[ACGT]{1,50}",
        col in "[ACGT]{1,50}",
    ) {
        let aligner = aligner(4);
        let gaps = GapPenalties { open: 2, extend: 1 };
        let simple = Scorer::simple(2, -1, gaps);
        let matrix = Scorer::matrix(SubstitutionMatrix::match_mismatch(b"ACGT", 2, -1).unwrap(), gaps);
        let (row, col) = (Sequence::from(row.as_str()), Sequence::from(col.as_str()));

        match (aligner.align(&row, &col, &simple), aligner.align(&row, &col, &matrix)) {
            (Ok(mm), Ok(sm)) => {
                prop_assert_eq!(mm.score, sm.score);
                prop_assert_eq!(mm.start, sm.start);
                prop_assert_eq!(mm.end, sm.end);
                prop_assert_eq!(mm.path, sm.path);
            }
            (Err(a), Err(b)) => prop_assert!(a.is_no_alignment() && b.is_no_alignment()),
            (a, b) => prop_assert!(false, "engines disagree: {:?} / {:?}", a, b),
        }
    }
}
