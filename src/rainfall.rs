//! Rainfall reconstruction from cumulative rain counters.
//!
//! Municipal stations report a counter that only grows, except when the
//! logger resets or reboots. Consumers need the rain that fell per tick.
//! Negative steps are clamped to zero: a reset under-reports that tick
//! instead of producing a large negative value.

// ---

/// Convert a cumulative counter into per-element deltas.
///
/// The output has the same length as the input. The first element is `0`
/// (no rainfall is invented for the period before the series starts).
/// A step involving a non-finite value also yields `0`.
pub fn to_deltas(cumulative: &[f64]) -> Vec<f64> {
    // ---
    let mut deltas = Vec::with_capacity(cumulative.len());
    if cumulative.is_empty() {
        return deltas;
    }
    deltas.push(0.0);
    deltas.extend(cumulative.windows(2).map(|w| clamp_step(w[0], w[1])));
    deltas
}

fn clamp_step(previous: f64, current: f64) -> f64 {
    let delta = current - previous;
    if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        0.0
    }
}

/// Total of a delta series.
pub fn total(deltas: &[f64]) -> f64 {
    deltas.iter().sum()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_counter_reset_is_clamped() {
        // ---
        let deltas = to_deltas(&[0.0, 2.0, 2.0, 5.0, 1.0, 4.0]);
        assert_eq!(deltas, vec![0.0, 2.0, 0.0, 3.0, 0.0, 3.0]);
    }

    #[test]
    fn test_first_element_is_zero_even_for_nonzero_start() {
        // ---
        assert_eq!(to_deltas(&[37.5]), vec![0.0]);
        assert_eq!(to_deltas(&[37.5, 38.0]), vec![0.0, 0.5]);
    }

    #[test]
    fn test_empty_counter() {
        // ---
        assert!(to_deltas(&[]).is_empty());
    }

    #[test]
    fn test_conservation_without_resets() {
        // ---
        let counter = [1.0, 1.0, 1.25, 3.0, 3.5, 10.0];
        let deltas = to_deltas(&counter);
        assert_eq!(total(&deltas), counter[counter.len() - 1] - counter[0]);
    }

    #[test]
    fn test_non_finite_steps_are_zero() {
        // ---
        let deltas = to_deltas(&[1.0, f64::NAN, 3.0, f64::INFINITY]);
        assert!(deltas.iter().all(|d| *d >= 0.0 && d.is_finite()));
        assert_eq!(deltas, vec![0.0, 0.0, 0.0, 0.0]);
    }
}
