use resona_dsp::smoother::{LinearSteps, LinearStepsSmoother};

/// The strongest reduction the limiter applies at full amount.
pub const MIN_COMPRESSION: f32 = 0.25;

const SMOOTHING_TIME: f32 = 0.01;

/// Gain reduction for a summed voice level of `energy`.
///
/// Nothing happens until the level goes over `threshold * amount`. Above it the gain
/// brings the level back to that limit, but never below [`MIN_COMPRESSION`] scaled by
/// `amount` up to one. An `amount` of zero disables it.
pub fn compression(energy: f32, threshold: f32, amount: f32) -> f32 {
  if amount <= 0.0 || !energy.is_finite() {
    return 1.0;
  }
  let limit = threshold * amount;
  if energy <= limit {
    1.0
  } else {
    (limit / energy).max(MIN_COMPRESSION * amount.min(1.0))
  }
}

/// Output stage that keeps loud passages with many voices in range.
#[derive(Debug, Clone)]
pub struct DynamicsLimiter {
  threshold: f32,
  gain: LinearStepsSmoother<f32>,
}

impl DynamicsLimiter {
  pub fn new(threshold: f32, sample_rate: f32) -> Self {
    Self {
      threshold,
      gain: LinearStepsSmoother::new(1.0, LinearSteps::from_time(sample_rate, SMOOTHING_TIME)),
    }
  }

  /// Starts moving towards the reduction needed for `energy`.
  pub fn update(&mut self, energy: f32, amount: f32) {
    self
      .gain
      .set_target(compression(energy, self.threshold, amount));
  }

  pub fn next_gain(&mut self) -> f32 {
    self.gain.next_value()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  #[test]
  fn compression_curve() {
    assert_eq!(compression(4.0, 1.0, 0.0), 1.0);
    assert_eq!(compression(0.5, 1.0, 1.0), 1.0);
    assert_approx_eq!(compression(2.0, 1.0, 1.0), 0.5);
    assert_approx_eq!(compression(3.0, 1.0, 2.0), 2.0 / 3.0);
    assert_approx_eq!(compression(100.0, 1.0, 1.0), MIN_COMPRESSION);
    assert_approx_eq!(compression(100.0, 1.0, 0.5), MIN_COMPRESSION * 0.5);
    assert_eq!(compression(f32::NAN, 1.0, 1.0), 1.0);
  }

  #[test]
  fn gain_moves_smoothly() {
    let mut limiter = DynamicsLimiter::new(1.0, 1000.0);
    limiter.update(2.0, 1.0);
    let first = limiter.next_gain();
    assert!(first < 1.0 && first > 0.9, "{}", first);
    for _ in 0..20 {
      limiter.next_gain();
    }
    assert_approx_eq!(limiter.next_gain(), 0.5);

    limiter.update(0.1, 1.0);
    for _ in 0..20 {
      limiter.next_gain();
    }
    assert_approx_eq!(limiter.next_gain(), 1.0);
  }
}
