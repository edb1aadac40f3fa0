//! Rank-decay weighting - diminishing budget share down a ranked channel list.
//!
//! Formula: weight[i] = score[i] * base^i, normalized to sum to 1
//!
//! With base < 1 each lower-ranked channel gets geometrically less, which
//! front-loads spend onto top performers while still diversifying.

use ndarray::{Array1, ArrayView1};

/// Geometric decay weights: [1, base, base^2, ..., base^(n-1)].
pub fn geometric_weights(n: usize, base: f64, normalize: bool) -> Array1<f64> {
    let mut weights = Array1::from_iter((0..n).map(|i| base.powi(i as i32)));
    let sum = weights.sum();
    if normalize && sum > 0.0 {
        weights /= sum;
    }
    weights
}

/// Score-scaled decay weights for channels already sorted by rank.
///
/// Negative scores count as zero. When every score is zero the pure decay
/// weights are returned so the result always sums to 1 for non-empty input.
pub fn rank_decay_weights(scores: &ArrayView1<f64>, base: f64) -> Array1<f64> {
    let decay = geometric_weights(scores.len(), base, false);
    let mut weights = scores.mapv(|s| if s.is_finite() { s.max(0.0) } else { 0.0 }) * &decay;

    let total = weights.sum();
    if total > 0.0 {
        weights /= total;
        return weights;
    }
    let decay_total = decay.sum();
    if decay_total > 0.0 {
        decay / decay_total
    } else {
        decay
    }
}
