//! Scoring policies consumed by the reconstruction engines.

use crate::AlignerError;

pub type Score = i32;

/// Sentinel for unreachable DP states. Every evaluated state is clamped to be
/// at least this value.
pub const NEG_INF: Score = Score::MIN / 4;

/// Largest score magnitude a complete alignment may reach.
pub const MAX_SCORE_MAGNITUDE: Score = Score::MAX / 8;

#[inline]
pub fn is_feasible(score: Score) -> bool {
    score > NEG_INF / 2
}

/// Affine gap penalties, stored as non-negative magnitudes. A gap of length
/// `k` costs `open + (k - 1) * extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPenalties {
    pub open: Score,
    pub extend: Score,
}

impl GapPenalties {
    pub fn new(open: Score, extend: Score) -> Result<Self, AlignerError> {
        let gaps = Self { open, extend };
        gaps.validate()?;
        Ok(gaps)
    }

    pub fn validate(&self) -> Result<(), AlignerError> {
        if self.open < 0 || self.extend < 0 {
            return Err(AlignerError::InitializationError(format!(
                "gap penalties must be non-negative magnitudes (open {}, extend {})",
                self.open, self.extend
            )));
        }
        Ok(())
    }

    /// Cost of a single gap run of `len` residues.
    pub fn run_cost(&self, len: usize) -> Score {
        if len == 0 {
            0
        } else {
            self.open + self.extend * (len as Score - 1)
        }
    }
}

impl Default for GapPenalties {
    fn default() -> Self {
        Self { open: 2, extend: 1 }
    }
}

/// Capability tag the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherCategory {
    SubstitutionMatrix,
    MatchMismatch,
    /// Arbitrary pair scoring with no device engine behind it.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchMismatch {
    pub match_score: Score,
    pub mismatch: Score,
}

impl MatchMismatch {
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> Score {
        if a.eq_ignore_ascii_case(&b) {
            self.match_score
        } else {
            self.mismatch
        }
    }
}

pub trait ScoringPolicy: Sync {
    fn category(&self) -> MatcherCategory;

    fn gaps(&self) -> GapPenalties;

    fn score(&self, a: u8, b: u8) -> Score;

    fn substitution_matrix(&self) -> Option<&SubstitutionMatrix> {
        None
    }

    fn match_mismatch(&self) -> Option<MatchMismatch> {
        None
    }
}

/// Dense substitution matrix over a small alphabet.
///
/// Residues are looked up case-insensitively. Residues outside the alphabet
/// share one extra index whose row and column hold `default_score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionMatrix {
    alphabet: Vec<u8>,
    codes: [u8; 256],
    // (alphabet + 1)^2, row-major, last index is the unknown residue
    scores: Vec<Score>,
}

impl SubstitutionMatrix {
    pub fn new(alphabet: &[u8], scores: &[Score], default_score: Score) -> Result<Self, AlignerError> {
        let n = alphabet.len();
        if n == 0 || n > u8::MAX as usize {
            return Err(AlignerError::InitializationError(format!(
                "substitution matrix alphabet must hold 1..=255 residues, got {}",
                n
            )));
        }
        if scores.len() != n * n {
            return Err(AlignerError::InitializationError(format!(
                "substitution matrix for {} residues needs {} scores, got {}",
                n,
                n * n,
                scores.len()
            )));
        }

        let unknown = n as u8;
        let mut codes = [unknown; 256];
        for (code, &residue) in alphabet.iter().enumerate() {
            codes[residue.to_ascii_uppercase() as usize] = code as u8;
            codes[residue.to_ascii_lowercase() as usize] = code as u8;
        }

        let width = n + 1;
        let mut table = vec![default_score; width * width];
        for a in 0..n {
            table[a * width..a * width + n].copy_from_slice(&scores[a * n..(a + 1) * n]);
        }

        Ok(Self {
            alphabet: alphabet.to_ascii_uppercase(),
            codes,
            scores: table,
        })
    }

    /// Builds a matrix that scores exactly like a match/mismatch scheme over
    /// `alphabet`.
    pub fn match_mismatch(alphabet: &[u8], match_score: Score, mismatch: Score) -> Result<Self, AlignerError> {
        let n = alphabet.len();
        let scores: Vec<Score> = (0..n * n)
            .map(|k| if k / n == k % n { match_score } else { mismatch })
            .collect();
        Self::new(alphabet, &scores, mismatch)
    }

    pub fn blosum62() -> Self {
        let scores: Vec<Score> = BLOSUM62.iter().map(|&s| s as Score).collect();
        match Self::new(BLOSUM62_ORDER, &scores, -4) {
            Ok(matrix) => matrix,
            Err(_) => unreachable!("built-in BLOSUM62 table is well formed"),
        }
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Number of rows in the dense table (alphabet plus the unknown residue).
    pub fn width(&self) -> usize {
        self.alphabet.len() + 1
    }

    #[inline]
    pub fn code(&self, residue: u8) -> u8 {
        self.codes[residue as usize]
    }

    /// Scores for every column code against the row code `code`.
    #[inline]
    pub fn profile_row(&self, code: u8) -> &[Score] {
        let width = self.width();
        let start = code as usize * width;
        &self.scores[start..start + width]
    }

    pub fn score(&self, a: u8, b: u8) -> Score {
        self.profile_row(self.code(a))[self.code(b) as usize]
    }

    pub fn max_magnitude(&self) -> u32 {
        self.scores.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Matrix(SubstitutionMatrix),
    Simple(MatchMismatch),
}

/// The stock scoring policy: a matcher plus gap penalties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorer {
    matcher: Matcher,
    gaps: GapPenalties,
}

impl Scorer {
    pub fn simple(match_score: Score, mismatch: Score, gaps: GapPenalties) -> Self {
        Self {
            matcher: Matcher::Simple(MatchMismatch { match_score, mismatch }),
            gaps,
        }
    }

    pub fn matrix(matrix: SubstitutionMatrix, gaps: GapPenalties) -> Self {
        Self {
            matcher: Matcher::Matrix(matrix),
            gaps,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::simple(DNA_MATCH, DNA_MISMATCH, GapPenalties { open: DNA_GAP_OPEN, extend: DNA_GAP_EXT })
    }
}

impl ScoringPolicy for Scorer {
    fn category(&self) -> MatcherCategory {
        match self.matcher {
            Matcher::Matrix(_) => MatcherCategory::SubstitutionMatrix,
            Matcher::Simple(_) => MatcherCategory::MatchMismatch,
        }
    }

    fn gaps(&self) -> GapPenalties {
        self.gaps
    }

    fn score(&self, a: u8, b: u8) -> Score {
        match &self.matcher {
            Matcher::Matrix(matrix) => matrix.score(a, b),
            Matcher::Simple(simple) => simple.score(a, b),
        }
    }

    fn substitution_matrix(&self) -> Option<&SubstitutionMatrix> {
        match &self.matcher {
            Matcher::Matrix(matrix) => Some(matrix),
            Matcher::Simple(_) => None,
        }
    }

    fn match_mismatch(&self) -> Option<MatchMismatch> {
        match self.matcher {
            Matcher::Simple(simple) => Some(simple),
            Matcher::Matrix(_) => None,
        }
    }
}

// DNA scoring defaults
pub const DNA_MATCH: Score = 1;
pub const DNA_MISMATCH: Score = -3;
pub const DNA_GAP_OPEN: Score = 5;
pub const DNA_GAP_EXT: Score = 2;

const BLOSUM62_ORDER: &[u8] = b"ARNDCQEGHILKMFPSTWYVBJZX*";

#[rustfmt::skip]
static BLOSUM62: [i8; 625] = [
    //  A,  R,  N,  D,  C,  Q,  E,  G,  H,  I,  L,  K,  M,  F,  P,  S,  T,  W,  Y,  V,  B,  J,  Z,  X,  *
        4, -1, -2, -2,  0, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -3, -2,  0, -2, -1, -1, -1, -4,
       -1,  5,  0, -2, -3,  1,  0, -2,  0, -3, -2,  2, -1, -3, -2, -1, -1, -3, -2, -3, -1, -2,  0, -1, -4,
       -2,  0,  6,  1, -3,  0,  0,  0,  1, -3, -3,  0, -2, -3, -2,  1,  0, -4, -2, -3,  4, -3,  0, -1, -4,
       -2, -2,  1,  6, -3,  0,  2, -1, -1, -3, -4, -1, -3, -3, -1,  0, -1, -4, -3, -3,  4, -3,  1, -1, -4,
        0, -3, -3, -3,  9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -1, -3, -1, -4,
       -1,  1,  0,  0, -3,  5,  2, -2,  0, -3, -2,  1,  0, -3, -1,  0, -1, -2, -1, -2,  0, -2,  4, -1, -4,
       -1,  0,  0,  2, -4,  2,  5, -2,  0, -3, -3,  1, -2, -3, -1,  0, -1, -3, -2, -2,  1, -3,  4, -1, -4,
        0, -2,  0, -1, -3, -2, -2,  6, -2, -4, -4, -2, -3, -3, -2,  0, -2, -2, -3, -3, -1, -4, -2, -1, -4,
       -2,  0,  1, -1, -3,  0,  0, -2,  8, -3, -3, -1, -2, -1, -2, -1, -2, -2,  2, -3,  0, -3,  0, -1, -4,
       -1, -3, -3, -3, -1, -3, -3, -4, -3,  4,  2, -3,  1,  0, -3, -2, -1, -3, -1,  3, -3,  3, -3, -1, -4,
       -1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4, -2,  2,  0, -3, -2, -1, -2, -1,  1, -4,  3, -3, -1, -4,
       -1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5, -1, -3, -1,  0, -1, -3, -2, -2,  0, -3,  1, -1, -4,
       -1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,  0, -2, -1, -1, -1, -1,  1, -3,  2, -1, -1, -4,
       -2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6, -4, -2, -2,  1,  3, -1, -3,  0, -3, -1, -4,
       -1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7, -1, -1, -4, -3, -2, -2, -3, -1, -1, -4,
        1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,  1, -3, -2, -2,  0, -2,  0, -1, -4,
        0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5, -2, -2,  0, -1, -1, -1, -1, -4,
       -3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,  2, -3, -4, -2, -2, -1, -4,
       -2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7, -1, -3, -1, -2, -1, -4,
        0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4, -3,  2, -2, -1, -4,
       -2, -1,  4,  4, -3,  0,  1, -1,  0, -3, -4,  0, -3, -3, -2,  0, -1, -4, -3, -3,  4, -3,  0, -1, -4,
       -1, -2, -3, -3, -1, -2, -3, -4, -3,  3,  3, -3,  2,  0, -3, -2, -1, -2, -1,  2, -3,  3, -3, -1, -4,
       -1,  0,  0,  1, -3,  4,  4, -2,  0, -3, -3,  1, -1, -3, -1,  0, -1, -2, -2, -2,  0, -3,  4, -1, -4,
       -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -4,
       -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4,  1,
];
