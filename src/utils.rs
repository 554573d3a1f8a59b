use rand::Rng;
use rand::seq::IndexedRandom;

/// Index of the maximum value, breaking ties uniformly at random.
///
/// Only indices where `eligible` holds are considered. Returns `None` if none are.
pub fn argmax_random_tie<R: Rng + ?Sized>(
    values: &[f32],
    eligible: impl Fn(usize) -> bool,
    rng: &mut R,
) -> Option<usize> {
    let best = values
        .iter()
        .enumerate()
        .filter(|&(i, _)| eligible(i))
        .map(|(_, &v)| v)
        .fold(f32::NEG_INFINITY, f32::max);
    let tied: Vec<usize> = (0..values.len())
        .filter(|&i| eligible(i) && values[i] == best)
        .collect();
    tied.choose(rng).copied()
}

/// Baseline step size heuristic: `0.1 / (iterations * mean(0..n))`
pub fn estimate_baseline_step_size(num_arguments: usize, iterations: usize) -> f32 {
    if num_arguments < 2 || iterations == 0 {
        return 0.0;
    }
    let mean = (num_arguments - 1) as f32 / 2.0;
    0.1 / (iterations as f32 * mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_argmax_unique() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(argmax_random_tie(&[0.1, 0.7, 0.2], |_| true, &mut rng), Some(1));
    }

    #[test]
    fn test_argmax_respects_eligibility() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(argmax_random_tie(&[0.1, 0.7, 0.2], |i| i != 1, &mut rng), Some(2));
        assert_eq!(argmax_random_tie(&[0.1], |_| false, &mut rng), None);
    }

    #[test]
    fn test_argmax_ties_hit_every_maximum() {
        let mut rng = StdRng::seed_from_u64(42);
        let values = [0.5, 0.1, 0.5, 0.5];
        let mut hits = [0usize; 4];
        for _ in 0..300 {
            hits[argmax_random_tie(&values, |_| true, &mut rng).unwrap()] += 1;
        }
        assert_eq!(hits[1], 0);
        assert!(hits[0] > 0 && hits[2] > 0 && hits[3] > 0);
    }

    #[test]
    fn test_step_size_heuristic() {
        let alpha = estimate_baseline_step_size(5, 1000);
        assert!((alpha - 0.1 / 2000.0).abs() < 1e-9);
        assert_eq!(estimate_baseline_step_size(1, 1000), 0.0);
    }
}
