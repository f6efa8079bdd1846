//! Competing exponential clocks: waiting times and weighted event choice.
//!
//! Given a vector of non-negative event rates, the time to the next event is
//! exponential with the summed rate and the event that fires is chosen with
//! probability proportional to its own rate.

use bdsim_core::{BdsimError, RandomSource, Result};

/// The next event drawn from a rate vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Time until the event fires.
    pub waiting_time: f64,
    /// Position of the event in the rate vector.
    pub index: usize,
}

/// Sum of `weights`, validated for use as an event rate.
///
/// # Errors
///
/// Returns an error if a weight is negative or not finite, or if all weights
/// are zero (no event can ever fire).
pub fn total_rate(weights: &[f64]) -> Result<f64> {
    let mut total = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        if !w.is_finite() || w < 0.0 {
            return Err(BdsimError::InvalidInput(format!(
                "event rate {} at position {} must be finite and >= 0",
                w, i
            )));
        }
        total += w;
    }
    if total <= 0.0 {
        return Err(BdsimError::InvalidInput(
            "total event rate is zero: no events possible".into(),
        ));
    }
    Ok(total)
}

/// Exponential waiting time for a process with the given total rate.
pub fn draw_waiting_time<R: RandomSource + ?Sized>(total: f64, rng: &mut R) -> f64 {
    rng.expovariate(total)
}

/// Index of the event that fires, chosen proportionally to `weights`.
///
/// Returns the first positive-weight bucket whose cumulative sum reaches
/// `random() * total`. `total` must come from [`total_rate`] on the same weights.
pub fn select_weighted<R: RandomSource + ?Sized>(
    weights: &[f64],
    total: f64,
    rng: &mut R,
) -> usize {
    let target = rng.random() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if cumulative >= target {
            return i;
        }
    }
    // Rounding left the target just above the accumulated sum.
    last_positive
}

/// Draw both the waiting time and the event that ends it.
///
/// # Examples
///
/// ```
/// use bdsim_phylo::events::draw_event;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let event = draw_event(&[0.0, 2.0, 0.0], &mut rng).unwrap();
/// assert_eq!(event.index, 1);
/// assert!(event.waiting_time > 0.0);
/// ```
pub fn draw_event<R: RandomSource + ?Sized>(weights: &[f64], rng: &mut R) -> Result<Event> {
    let total = total_rate(weights)?;
    let waiting_time = draw_waiting_time(total, rng);
    let index = select_weighted(weights, total, rng);
    Ok(Event {
        waiting_time,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Fixed-draw source for checking bucket boundaries.
    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn random(&mut self) -> f64 {
            self.0
        }
        fn expovariate(&mut self, rate: f64) -> f64 {
            1.0 / rate
        }
        fn gauss(&mut self, mu: f64, _sigma: f64) -> f64 {
            mu
        }
        fn choice_index(&mut self, _len: usize) -> usize {
            0
        }
    }

    #[test]
    fn zero_total_is_an_error() {
        assert!(total_rate(&[0.0, 0.0]).is_err());
        assert!(total_rate(&[]).is_err());
    }

    #[test]
    fn negative_or_nan_rates_rejected() {
        assert!(total_rate(&[1.0, -0.5]).is_err());
        assert!(total_rate(&[f64::NAN]).is_err());
    }

    #[test]
    fn boundary_draw_selects_first_bucket_reaching_target() {
        // cumulative: 1, 3, 6; target = 0.5 * 6 = 3 lands on the second bucket.
        let weights = [1.0, 2.0, 3.0];
        assert_eq!(select_weighted(&weights, 6.0, &mut Fixed(0.5)), 1);
        assert_eq!(select_weighted(&weights, 6.0, &mut Fixed(0.1)), 0);
        assert_eq!(select_weighted(&weights, 6.0, &mut Fixed(0.99)), 2);
    }

    #[test]
    fn zero_draw_skips_zero_weight_buckets() {
        let weights = [0.0, 0.0, 4.0];
        assert_eq!(select_weighted(&weights, 4.0, &mut Fixed(0.0)), 2);
    }

    #[test]
    fn waiting_time_uses_summed_rate() {
        let event = draw_event(&[1.0, 3.0], &mut Fixed(0.0)).unwrap();
        assert_eq!(event.waiting_time, 0.25);
        assert_eq!(event.index, 0);
    }

    #[test]
    fn selection_frequencies_follow_weights() {
        let mut rng = StdRng::seed_from_u64(8);
        let weights = [1.0, 3.0];
        let n = 20_000;
        let hits = (0..n)
            .filter(|_| draw_event(&weights, &mut rng).unwrap().index == 1)
            .count();
        let frac = hits as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.02, "fraction {}", frac);
    }
}
