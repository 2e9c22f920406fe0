use crate::scoring::Score;
use crate::{AlignerError, MAX_BLOCKS_COUNT, MAX_THREADS_COUNT};

pub const DEFAULT_MEMORY_BUDGET: usize = 1 << 30;
pub const DEFAULT_BASE_CASE_ROWS: usize = 16;

/// Run configuration for one or more alignment requests. Read-only once the
/// aligner is built.
#[derive(Debug, Clone)]
pub struct AlignerParameters {
    threshold: Score,
    threads: Option<usize>,
    lane_groups: usize,
    memory_budget: usize,
    base_case_rows: usize,
}

impl Default for AlignerParameters {
    fn default() -> Self {
        Self {
            threshold: 0,
            threads: None,
            lane_groups: 0, // one worker per core
            memory_budget: DEFAULT_MEMORY_BUDGET,
            base_case_rows: DEFAULT_BASE_CASE_ROWS,
        }
    }
}

impl AlignerParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alignments scoring at or below `threshold` are reported as not found.
    pub fn with_threshold(mut self, threshold: Score) -> Self {
        self.threshold = threshold;
        self
    }

    /// Columns swept by one lane group. Overrides the engine's own tuning.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, AlignerError> {
        if threads == 0 || threads > MAX_THREADS_COUNT {
            return Err(AlignerError::InitializationError(format!(
                "Threads per lane group must be in 1..={}",
                MAX_THREADS_COUNT
            )));
        }
        self.threads = Some(threads);
        Ok(self)
    }

    /// Lane groups running concurrently; 0 picks one per available core.
    pub fn with_lane_groups(mut self, lane_groups: usize) -> Result<Self, AlignerError> {
        if lane_groups > MAX_BLOCKS_COUNT {
            return Err(AlignerError::InitializationError(format!(
                "Lane groups count cannot be greater than {}",
                MAX_BLOCKS_COUNT
            )));
        }
        self.lane_groups = lane_groups;
        Ok(self)
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    pub fn with_base_case_rows(mut self, rows: usize) -> Result<Self, AlignerError> {
        if rows == 0 {
            return Err(AlignerError::InitializationError(
                "Base case must cover at least one row".to_string(),
            ));
        }
        self.base_case_rows = rows;
        Ok(self)
    }

    pub fn threshold(&self) -> Score {
        self.threshold
    }

    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    pub fn lane_groups(&self) -> usize {
        self.lane_groups
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub fn base_case_rows(&self) -> usize {
        self.base_case_rows
    }
}
