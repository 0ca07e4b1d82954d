// THEORY:
// The `time_series` module holds the change-point logic of the analyzer as pure
// functions over one object's brightness series. An eclosing pupa shows up as a
// single upward step: the dark pupal case is replaced by the bright, empty one.
//
// Algorithm steps:
// 1.  **First Differences**: `delta[k] = series[k + 1] - series[k]`.
// 2.  **Candidates**: every series index `k + 1` whose incoming difference reaches
//     the threshold is a candidate transition.
// 3.  **Selection**: the earliest candidate wins. Later candidates are usually the
//     emerging adult moving around inside the region.
// 4.  **Error Correction**: a fly walking over a pupa also causes a jump, but the
//     region returns to dark once it has passed. Comparing the brightness a few
//     samples before and after the candidate separates the two: if the region is
//     not clearly brighter afterwards the candidate is rejected.

use serde::{Deserialize, Serialize};

/// Parameters of the false-positive check around a candidate transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCorrection {
    pub enabled: bool,
    /// Samples to look back and forward from the candidate.
    pub window: usize,
    /// A candidate is rejected when `before - after > error_min`.
    pub error_min: f64,
}

impl Default for ErrorCorrection {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 3,
            error_min: -2.0,
        }
    }
}

/// What the series of one object says about eclosion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionOutcome {
    /// No difference reached the threshold.
    NoTransition,
    /// `index` is the series index of the first sample after the step.
    Accepted { index: usize, candidates: usize },
    Rejected {
        index: usize,
        candidates: usize,
        delta_error: f64,
    },
}

pub fn first_differences(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Series indices `k + 1` with `delta[k] >= diff_threshold`, ascending.
pub fn candidate_transitions(series: &[f64], diff_threshold: f64) -> Vec<usize> {
    first_differences(series)
        .iter()
        .enumerate()
        .filter(|&(_, &delta)| delta >= diff_threshold)
        .map(|(k, _)| k + 1)
        .collect()
}

/// `series[before] - series[after]` with both positions `window` samples away from
/// `index`, clamped to the first and last sample.
pub fn error_delta(series: &[f64], index: usize, window: usize) -> f64 {
    let last = series.len().saturating_sub(1);
    let before = index.saturating_sub(window);
    let after = (index + window).min(last);
    series[before] - series[after]
}

/// Runs candidate detection, earliest-candidate selection and, when enabled, the
/// error-correction check on one series.
pub fn classify(
    series: &[f64],
    diff_threshold: f64,
    correction: &ErrorCorrection,
) -> TransitionOutcome {
    let candidates = candidate_transitions(series, diff_threshold);
    let Some(&index) = candidates.first() else {
        return TransitionOutcome::NoTransition;
    };

    if correction.enabled {
        let delta_error = error_delta(series, index, correction.window);
        if delta_error > correction.error_min {
            return TransitionOutcome::Rejected {
                index,
                candidates: candidates.len(),
                delta_error,
            };
        }
    }

    TransitionOutcome::Accepted {
        index,
        candidates: candidates.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFF: ErrorCorrection = ErrorCorrection {
        enabled: false,
        window: 3,
        error_min: -2.0,
    };

    fn step(len: usize, at: usize, low: f64, high: f64) -> Vec<f64> {
        (0..len).map(|i| if i < at { low } else { high }).collect()
    }

    #[test]
    fn differences_of_reference_series() {
        let series = [50.0, 50.0, 50.0, 62.0, 61.0, 60.0];
        assert_eq!(first_differences(&series), vec![0.0, 0.0, 12.0, -1.0, -1.0]);
        assert_eq!(candidate_transitions(&series, 10.0), vec![3]);
    }

    #[test]
    fn single_step_detected_only_at_or_above_threshold() {
        for k in 1..9 {
            let series = step(10, k, 40.0, 50.0);
            assert_eq!(
                classify(&series, 10.0, &ErrorCorrection::default()),
                TransitionOutcome::Accepted { index: k, candidates: 1 }
            );
            assert_eq!(classify(&series, 10.5, &OFF), TransitionOutcome::NoTransition);
        }
    }

    #[test]
    fn earliest_candidate_is_selected() {
        let series = [10.0, 10.0, 30.0, 30.0, 50.0, 70.0];
        assert_eq!(candidate_transitions(&series, 15.0), vec![2, 4, 5]);
        assert_eq!(
            classify(&series, 15.0, &OFF),
            TransitionOutcome::Accepted { index: 2, candidates: 3 }
        );
    }

    #[test]
    fn error_window_is_clamped_to_the_series() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(error_delta(&series, 1, 3), 1.0 - 5.0);
        assert_eq!(error_delta(&series, 3, 1), 3.0 - 5.0);
        assert_eq!(error_delta(&series, 4, 10), 1.0 - 5.0);
    }

    #[test]
    fn rebound_is_rejected_only_with_correction() {
        // A walker: bright for two samples, then darker than before.
        let series = [50.0, 50.0, 50.0, 63.0, 62.0, 48.0, 48.0, 48.0];
        let on = ErrorCorrection::default();
        match classify(&series, 10.0, &on) {
            TransitionOutcome::Rejected { index, delta_error, .. } => {
                assert_eq!(index, 3);
                assert_eq!(delta_error, 2.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(
            classify(&series, 10.0, &OFF),
            TransitionOutcome::Accepted { index: 3, candidates: 1 }
        );
    }

    #[test]
    fn flat_series_and_short_series() {
        assert_eq!(
            classify(&[5.0; 6], 1.0, &ErrorCorrection::default()),
            TransitionOutcome::NoTransition
        );
        assert_eq!(classify(&[5.0], 1.0, &OFF), TransitionOutcome::NoTransition);
        assert_eq!(classify(&[], 1.0, &OFF), TransitionOutcome::NoTransition);
    }
}
