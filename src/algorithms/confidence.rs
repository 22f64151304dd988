use crate::models::{ConfidenceEntry, Observation};

/// Confidence assumed for every (user, item) pair that was never observed.
pub const UNOBSERVED_CONFIDENCE: f64 = 1.0;

/// Maps a raw interaction strength to `(preference, confidence)`.
///
/// Preference is 1 iff `raw_strength > 0`, in which case the confidence is
/// `1 + alpha * raw_strength`. Anything else is an absent preference carrying
/// the implicit unobserved confidence.
pub fn confidence_and_preference(raw_strength: f64, alpha: f64) -> (u8, f64) {
    if raw_strength > 0.0 {
        (1, 1.0 + alpha * raw_strength)
    } else {
        (0, UNOBSERVED_CONFIDENCE)
    }
}

/// Returns the entry to store for an observation, or `None` when it carries
/// no positive preference and must be dropped.
pub fn to_confidence_entry(observation: &Observation, alpha: f64) -> Option<ConfidenceEntry> {
    match confidence_and_preference(observation.strength, alpha) {
        (1, confidence) => Some(ConfidenceEntry {
            user_id: observation.user_id,
            item_id: observation.item_id,
            confidence,
        }),
        _ => None,
    }
}
