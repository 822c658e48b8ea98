//! noise.rs — Operator-latency jitter for judge-tablet submissions
//!
//! A CV worker reports within one frame interval; a ringside judge
//! reacting to the same action on their tablet lags behind it by a
//! human reaction time. Generalizes the teacher simulator's radio
//! propagation noise model (`uwb_physics.rs`'s Gaussian range jitter)
//! to a different physical process with the same shape: a Normal
//! distribution around a mean delay.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Mean operator reaction lag, milliseconds.
const MEAN_LAG_MS: f64 = 650.0;
/// Standard deviation of the reaction lag.
const LAG_STDDEV_MS: f64 = 200.0;

/// Perturbs a judge submission's timestamp forward from the CV event
/// it was reacting to, clamped so it never lands before it.
pub fn apply_operator_lag(rng: &mut StdRng, cv_ts_ms: i64) -> i64 {
    let lag: f64 = Normal::new(MEAN_LAG_MS, LAG_STDDEV_MS).unwrap().sample(rng).max(50.0);
    cv_ts_ms + lag as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn lag_is_always_forward_of_the_source_event() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            assert!(apply_operator_lag(&mut rng, 10_000) >= 10_050);
        }
    }
}
