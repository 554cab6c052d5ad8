//! # Threshold Decider

use crate::domain::QuorumThreshold;

/// Whether `count` validations satisfy `threshold`.
///
/// Strictly-less-than stays pending, so the message that brings the count
/// to exactly `threshold` is the one that triggers dispatch.
pub fn quorum_reached(count: usize, threshold: QuorumThreshold) -> bool {
    count >= threshold.get()
}
