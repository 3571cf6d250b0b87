use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Decides, per upload attempt, whether the endpoint should fail it with a
/// transient error before doing any work.
pub trait FailureInjector: Send + Sync {
    fn should_fail(&self) -> bool;
}

/// Never fails. Used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFailures;

impl FailureInjector for NoFailures {
    fn should_fail(&self) -> bool {
        false
    }
}

/// Fails each attempt independently with probability `rate`.
#[derive(Debug)]
pub struct RandomFailures {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomFailures {
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    /// Reproducible sequence for tests.
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: StdRng) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl FailureInjector for RandomFailures {
    fn should_fail(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.rate),
            Err(poisoned) => poisoned.into_inner().gen_bool(self.rate),
        }
    }
}

/// Fails exactly the first `n` attempts, then lets everything through.
#[derive(Debug)]
pub struct FailFirst {
    remaining: AtomicU32,
}

impl FailFirst {
    pub fn new(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
        }
    }
}

impl FailureInjector for FailFirst {
    fn should_fail(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_first_counts_down() {
        let injector = FailFirst::new(2);
        assert!(injector.should_fail());
        assert!(injector.should_fail());
        assert!(!injector.should_fail());
        assert!(!injector.should_fail());
    }

    #[test]
    fn test_random_failures_edges() {
        let never = RandomFailures::seeded(0.0, 7);
        let always = RandomFailures::seeded(1.0, 7);
        for _ in 0..100 {
            assert!(!never.should_fail());
            assert!(always.should_fail());
        }
    }

    #[test]
    fn test_random_failures_seed_is_reproducible() {
        let a = RandomFailures::seeded(0.5, 42);
        let b = RandomFailures::seeded(0.5, 42);
        let seq_a: Vec<bool> = (0..64).map(|_| a.should_fail()).collect();
        let seq_b: Vec<bool> = (0..64).map(|_| b.should_fail()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(RandomFailures::seeded(3.0, 1).rate(), 1.0);
        assert_eq!(RandomFailures::seeded(-1.0, 1).rate(), 0.0);
        assert!(!NoFailures.should_fail());
    }
}
