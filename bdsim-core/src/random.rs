//! Pluggable random sources for stochastic simulation.
//!
//! Every simulator takes an explicit `&mut R where R: RandomSource`; there is
//! no process-wide default generator. Any [`rand::Rng`] is a
//! [`RandomSource`] through the blanket implementation below, so seeded
//! generators such as `rand::rngs::StdRng` can be passed directly.
//!
//! # Examples
//!
//! ```
//! use bdsim_core::RandomSource;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let wait = rng.expovariate(2.0);
//! assert!(wait >= 0.0);
//! let u = rng.uniform(0.0, 1.0);
//! assert!((0.0..1.0).contains(&u));
//! ```

use rand::Rng;
use rand_distr::{Exp1, StandardNormal};

/// The draws a branching-process simulator needs from a generator.
pub trait RandomSource {
    /// Uniform draw on `[0, 1)`.
    fn random(&mut self) -> f64;

    /// Uniform draw on `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.random()
    }

    /// Exponential draw with the given rate (mean `1 / rate`).
    ///
    /// The caller guarantees `rate > 0`.
    fn expovariate(&mut self, rate: f64) -> f64;

    /// Gaussian draw with mean `mu` and standard deviation `sigma`.
    fn gauss(&mut self, mu: f64, sigma: f64) -> f64;

    /// Uniformly chosen index in `0..len`. The caller guarantees `len > 0`.
    fn choice_index(&mut self, len: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn random(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn expovariate(&mut self, rate: f64) -> f64 {
        let e: f64 = self.sample(Exp1);
        e / rate
    }

    fn gauss(&mut self, mu: f64, sigma: f64) -> f64 {
        let z: f64 = self.sample(StandardNormal);
        mu + sigma * z
    }

    fn choice_index(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            assert_eq!(a.expovariate(1.5).to_bits(), b.expovariate(1.5).to_bits());
            assert_eq!(a.gauss(0.0, 1.0).to_bits(), b.gauss(0.0, 1.0).to_bits());
        }
    }

    #[test]
    fn expovariate_mean_matches_rate() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let rate = 4.0;
        let mean: f64 = (0..n).map(|_| rng.expovariate(rate)).sum::<f64>() / n as f64;
        assert!((mean - 0.25).abs() < 0.01, "mean waiting time {}", mean);
    }

    #[test]
    fn zero_sigma_gauss_returns_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(rng.gauss(0.7, 0.0), 0.7);
    }

    #[test]
    fn uniform_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let u = rng.uniform(2.0, 3.0);
            assert!((2.0..3.0).contains(&u));
        }
    }

    #[test]
    fn choice_index_in_range() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[rng.choice_index(4)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
