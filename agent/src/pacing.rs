//! Delays between accounts and between passes.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub trait Pacer: Send {
    /// Pause before the next account of the same pass.
    fn between_accounts(&mut self) -> Duration;

    /// Cool-down after a completed pass.
    fn between_passes(&mut self) -> Duration;
}

/// Uniform jitter over `[min, max]` (inclusive, millisecond resolution)
/// between accounts and a fixed restart delay between passes.
pub struct JitterPacer {
    min: Duration,
    max: Duration,
    restart: Duration,
    rng: ChaCha8Rng,
}

impl JitterPacer {
    pub fn new(min: Duration, max: Duration, restart: Duration) -> Self {
        Self {
            min,
            max,
            restart,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Reproducible jitter sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }
}

impl Pacer for JitterPacer {
    fn between_accounts(&mut self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if lo >= hi {
            return self.min;
        }
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }

    fn between_passes(&mut self) -> Duration {
        self.restart
    }
}

/// Constant delays. `FixedPacer::zero()` removes all pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPacer {
    pub between_accounts: Duration,
    pub between_passes: Duration,
}

impl FixedPacer {
    pub fn zero() -> Self {
        Self::default()
    }
}

impl Pacer for FixedPacer {
    fn between_accounts(&mut self) -> Duration {
        self.between_accounts
    }

    fn between_passes(&mut self) -> Duration {
        self.between_passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_window() {
        let min = Duration::from_millis(5_000);
        let max = Duration::from_millis(10_000);
        let mut pacer = JitterPacer::new(min, max, Duration::from_secs(1));
        for _ in 0..500 {
            let d = pacer.between_accounts();
            assert!(d >= min && d <= max, "{d:?} out of range");
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let mk = || {
            JitterPacer::new(Duration::from_millis(0), Duration::from_millis(1_000), Duration::ZERO)
                .with_seed(42)
        };
        let (mut a, mut b) = (mk(), mk());
        let xs: Vec<_> = (0..20).map(|_| a.between_accounts()).collect();
        let ys: Vec<_> = (0..20).map(|_| b.between_accounts()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().any(|d| *d != xs[0]));
    }

    #[test]
    fn degenerate_window_returns_min() {
        let mut zero = JitterPacer::new(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        assert_eq!(zero.between_accounts(), Duration::ZERO);

        let mut inverted = JitterPacer::new(Duration::from_millis(7), Duration::from_millis(3), Duration::ZERO);
        assert_eq!(inverted.between_accounts(), Duration::from_millis(7));
    }

    #[test]
    fn restart_delay_is_fixed() {
        let mut pacer = JitterPacer::new(Duration::ZERO, Duration::ZERO, Duration::from_secs(18_000));
        assert_eq!(pacer.between_passes(), Duration::from_secs(18_000));
        assert_eq!(FixedPacer::zero().between_passes(), Duration::ZERO);
    }
}
