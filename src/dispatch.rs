//! Routes an alignment request to the engine matching the scoring policy.

use log::debug;

use crate::alignment::AlignmentResult;
use crate::config::AlignerParameters;
use crate::device::Device;
use crate::reconstruct::{MatchEngine, MatrixEngine, ReconstructionEngine};
use crate::scoring::{MatcherCategory, ScoringPolicy};
use crate::AlignerError;

pub fn select_engine<'p>(policy: &'p dyn ScoringPolicy) -> Result<Box<dyn ReconstructionEngine + 'p>, AlignerError> {
    let category = policy.category();
    policy.gaps().validate()?;
    let engine: Box<dyn ReconstructionEngine + 'p> = match category {
        MatcherCategory::SubstitutionMatrix => {
            let matrix = policy.substitution_matrix().ok_or_else(|| unsupported(category))?;
            Box::new(MatrixEngine::new(matrix, policy.gaps()))
        }
        MatcherCategory::MatchMismatch => {
            let scheme = policy.match_mismatch().ok_or_else(|| unsupported(category))?;
            Box::new(MatchEngine::new(scheme, policy.gaps()))
        }
        MatcherCategory::Custom => return Err(unsupported(category)),
    };
    debug!("{:?} policy routed to {:?} engine", category, engine.kind());
    Ok(engine)
}

pub fn reconstruct(
    device: &Device,
    row: &[u8],
    col: &[u8],
    policy: &dyn ScoringPolicy,
    params: &AlignerParameters,
) -> Result<AlignmentResult, AlignerError> {
    select_engine(policy)?.align(device, row, col, params)
}

fn unsupported(category: MatcherCategory) -> AlignerError {
    AlignerError::UnsupportedMatcher(format!("{:?}", category))
}
