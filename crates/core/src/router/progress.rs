//! Mapping of per-attempt progress onto job progress.

/// Absorbs floating point error so that exact budget boundaries floor correctly.
const EPSILON: f64 = 1e-9;

/// Maps an engine's own 0-100 progress into the job's progress range.
///
/// Each candidate owns a slice of the job range starting at `base` and
/// `budget` points wide. The result is floored and clamped to 0-100.
pub fn map_progress(base: f64, budget: f64, sub_percent: u8) -> u8 {
    let sub = f64::from(sub_percent.min(100));
    let mapped = (base + sub * budget / 100.0 + EPSILON).floor();
    mapped.clamp(0.0, 100.0) as u8
}

/// Budget of each candidate when `candidates` engines share the job range.
pub fn candidate_budget(candidates: usize) -> f64 {
    if candidates == 0 {
        100.0
    } else {
        100.0 / candidates as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_candidate_is_identity() {
        for sub in [0u8, 1, 37, 99, 100] {
            assert_eq!(map_progress(0.0, 100.0, sub), sub);
        }
    }

    #[test]
    fn test_three_candidates() {
        let budget = candidate_budget(3);
        assert_eq!(map_progress(0.0, budget, 0), 0);
        assert_eq!(map_progress(0.0, budget, 50), 16);
        assert_eq!(map_progress(0.0, budget, 100), 33);
        assert_eq!(map_progress(budget, budget, 0), 33);
        assert_eq!(map_progress(budget * 2.0, budget, 50), 83);
        assert_eq!(map_progress(budget * 2.0, budget, 100), 100);
    }

    #[test]
    fn test_non_last_candidate_never_reaches_100() {
        for n in 2..=7 {
            let budget = candidate_budget(n);
            for i in 0..n - 1 {
                assert!(map_progress(budget * i as f64, budget, 100) < 100);
            }
            assert_eq!(map_progress(budget * (n - 1) as f64, budget, 100), 100);
        }
    }

    #[test]
    fn test_clamped() {
        assert_eq!(map_progress(95.0, 50.0, 100), 100);
        assert_eq!(map_progress(0.0, 100.0, 250), 100);
        assert_eq!(map_progress(-5.0, 10.0, 0), 0);
    }

    #[test]
    fn test_zero_candidates_budget() {
        assert_eq!(candidate_budget(0), 100.0);
    }
}
