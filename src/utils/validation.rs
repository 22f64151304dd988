use crate::error::{AlsError, Result};
use crate::models::Observation;
use anyhow::anyhow;

/// Strengths must be finite; zero and negative values are legal and simply
/// dropped by the confidence model.
pub fn validate_observation(observation: &Observation) -> anyhow::Result<()> {
    if !observation.strength.is_finite() {
        return Err(anyhow!(
            "Observation ({}, {}) has non-finite strength {}",
            observation.user_id,
            observation.item_id,
            observation.strength
        ));
    }
    Ok(())
}

/// Converts a caller-supplied result count, rejecting negatives and capping
/// at `max_k`.
pub fn validate_k(k: i64, max_k: usize) -> Result<usize> {
    let k = usize::try_from(k).map_err(|_| AlsError::InvalidK(k))?;
    Ok(k.min(max_k))
}

/// Parses a comma separated list of item indices such as `"1, 4,7"`.
pub fn parse_index_list(raw: &str) -> anyhow::Result<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|e| anyhow!("Invalid item index '{}': {}", s, e))
        })
        .collect()
}
