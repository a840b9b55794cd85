/// Maps a note velocity in `[0, 1]` to an excitation gain in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityCurve {
  Linear,
  /// `v ^ gamma`. Values above 1 make soft notes softer.
  Power(f32),
  /// Smoothstep, gentle at both ends.
  SCurve,
}

impl VelocityCurve {
  pub fn apply(&self, velocity: f32) -> f32 {
    let v = if velocity.is_finite() {
      velocity.clamp(0.0, 1.0)
    } else {
      0.0
    };
    match *self {
      VelocityCurve::Linear => v,
      VelocityCurve::Power(gamma) if gamma.is_finite() && gamma > 0.0 => libm::powf(v, gamma),
      VelocityCurve::Power(_) => v,
      VelocityCurve::SCurve => v * v * (3.0 - 2.0 * v),
    }
  }
}

impl Default for VelocityCurve {
  fn default() -> Self {
    VelocityCurve::Linear
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  #[test]
  fn curves() {
    assert_approx_eq!(VelocityCurve::Linear.apply(0.5), 0.5);
    assert_approx_eq!(VelocityCurve::Power(2.0).apply(0.5), 0.25);
    assert_approx_eq!(VelocityCurve::SCurve.apply(0.5), 0.5);
    assert_approx_eq!(VelocityCurve::SCurve.apply(0.25), 0.15625);
  }

  #[test]
  fn out_of_range_velocity() {
    assert_eq!(VelocityCurve::Linear.apply(2.0), 1.0);
    assert_eq!(VelocityCurve::Linear.apply(-1.0), 0.0);
    assert_eq!(VelocityCurve::Power(2.0).apply(f32::NAN), 0.0);
    assert_eq!(VelocityCurve::Power(-1.0).apply(0.3), 0.3);
  }
}
