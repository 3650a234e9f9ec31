use crate::belief::BeliefState;
use serde::Serialize;

/// Normalized entropy below which the distribution counts as settled.
pub const ENTROPY_CUTOFF: f64 = 0.15;
/// Minimum top/second probability ratio for the ratio criterion.
pub const DOMINANCE_RATIO: f64 = 3.0;
const RATIO_FLOOR: f64 = 0.1;
const LEAD_FLOOR: f64 = 0.15;
const LEAD_OVER_SECOND: f64 = 0.08;
const LEAD_OVER_THIRD: f64 = 0.12;
/// Fraction of the base threshold and margin left once the question budget is spent.
const PROGRESSIVE_FLOOR: f64 = 0.5;

/// Which stop criterion fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuessReason {
    /// Top probability and margin clear the progressively relaxed bar.
    Threshold,
    /// Normalized entropy is nearly zero.
    LowEntropy,
    /// Top is at least three times the runner-up.
    Ratio,
    /// Top leads both runners-up by a clear gap.
    Lead,
}

/// Threshold and margin after relaxing for questions already spent.
pub fn progressive_bar(
    threshold: f64,
    margin: f64,
    questions_asked: usize,
    max_questions: usize,
) -> (f64, f64) {
    let progress = if max_questions == 0 {
        1.0
    } else {
        (questions_asked as f64 / max_questions as f64).min(1.0)
    };
    let scale = 1.0 - (1.0 - PROGRESSIVE_FLOOR) * progress;
    (threshold * scale, margin * scale)
}

/// The first stop criterion that holds, if any.
pub fn guess_reason(
    beliefs: &BeliefState,
    threshold: f64,
    margin: f64,
    questions_asked: usize,
    max_questions: usize,
) -> Option<GuessReason> {
    let ranked = beliefs.top_k(3);
    let top = ranked.first()?.1;
    if ranked.len() == 1 {
        return Some(GuessReason::LowEntropy);
    }
    let second = ranked.get(1).map(|(_, p)| *p).unwrap_or(0.0);
    let third = ranked.get(2).map(|(_, p)| *p).unwrap_or(0.0);

    let (bar, gap) = progressive_bar(threshold, margin, questions_asked, max_questions);
    if top >= bar && top - second >= gap {
        return Some(GuessReason::Threshold);
    }
    if beliefs.normalized_entropy() < ENTROPY_CUTOFF {
        return Some(GuessReason::LowEntropy);
    }
    if top > RATIO_FLOOR && (second <= 0.0 || top / second >= DOMINANCE_RATIO) {
        return Some(GuessReason::Ratio);
    }
    if top > LEAD_FLOOR && top - second >= LEAD_OVER_SECOND && top - third >= LEAD_OVER_THIRD {
        return Some(GuessReason::Lead);
    }
    None
}

pub fn should_guess(
    beliefs: &BeliefState,
    threshold: f64,
    margin: f64,
    questions_asked: usize,
    max_questions: usize,
) -> bool {
    guess_reason(beliefs, threshold, margin, questions_asked, max_questions).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(weights: &[f64]) -> BeliefState {
        BeliefState::from_weights(
            weights
                .iter()
                .enumerate()
                .map(|(i, w)| (format!("e{i}"), *w)),
        )
    }

    #[test]
    fn empty_beliefs_never_guess() {
        assert!(!should_guess(&BeliefState::default(), 0.5, 0.15, 0, 20));
    }

    #[test]
    fn single_candidate_always_guesses() {
        assert!(should_guess(&state(&[1.0]), 0.99, 0.99, 0, 20));
    }

    #[test]
    fn uniform_beliefs_keep_asking() {
        let uniform = BeliefState::uniform((0..40).map(|i| format!("e{i}")));
        assert_eq!(guess_reason(&uniform, 0.5, 0.15, 0, 20), None);
        assert_eq!(guess_reason(&uniform, 0.5, 0.15, 20, 20), None);
    }

    #[test]
    fn dominant_top_guesses_early_even_with_a_strict_threshold() {
        let mut weights = vec![0.9, 0.05];
        weights.extend(std::iter::repeat_n(0.05 / 8.0, 8));
        let beliefs = state(&weights);
        assert!(should_guess(&beliefs, 0.5, 0.15, 1, 20));
        let reason = guess_reason(&beliefs, 0.95, 0.15, 1, 20);
        assert!(matches!(reason, Some(GuessReason::LowEntropy | GuessReason::Ratio)));
    }

    #[test]
    fn threshold_relaxes_as_questions_run_out() {
        let (bar, gap) = progressive_bar(0.5, 0.15, 0, 20);
        assert!((bar - 0.5).abs() < 1e-12 && (gap - 0.15).abs() < 1e-12);
        let (bar, gap) = progressive_bar(0.5, 0.15, 20, 20);
        assert!((bar - 0.25).abs() < 1e-12 && (gap - 0.075).abs() < 1e-12);
        let (bar, _) = progressive_bar(0.5, 0.15, 40, 20);
        assert!((bar - 0.25).abs() < 1e-12);

        // 0.3 / 0.2 / 0.2 / 0.2 / 0.1: only the relaxed threshold fires.
        let beliefs = state(&[0.3, 0.2, 0.2, 0.2, 0.1]);
        assert_eq!(guess_reason(&beliefs, 0.5, 0.15, 2, 20), None);
        assert_eq!(
            guess_reason(&beliefs, 0.5, 0.1, 20, 20),
            Some(GuessReason::Threshold)
        );
    }

    #[test]
    fn lead_over_second_and_third() {
        // top 0.26, second 0.17, third 0.13: ratio < 3 but lead holds.
        let mut weights = vec![0.26, 0.17, 0.13];
        weights.extend(std::iter::repeat_n(0.44 / 11.0, 11));
        let beliefs = state(&weights);
        assert_eq!(
            guess_reason(&beliefs, 0.5, 0.15, 0, 20),
            Some(GuessReason::Lead)
        );
    }

    #[test]
    fn ratio_with_two_candidates() {
        let beliefs = state(&[0.76, 0.24]);
        // 0.76 / 0.24 is just over three.
        assert_eq!(
            guess_reason(&beliefs, 0.9, 0.6, 0, 20),
            Some(GuessReason::Ratio)
        );
    }
}
