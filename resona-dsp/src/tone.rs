//! Tone colour: a spectral tilt applied to mode amplitudes at strike time.

const MIN_CUTOFF: f32 = 100.0;
const CUTOFF_OCTAVES: f32 = 8.0;
const FALLOFF_DB: f32 = -24.0;

/// Low-pass style tilt. Modes above the cutoff are attenuated by
/// `(frequency / cutoff) ^ (falloff_db / 20)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneTilt {
  cutoff: f32,
  exponent: f32,
}

impl ToneTilt {
  /// `tone` in `[0, 1]`: 0 is darkest (cutoff at 100 Hz), 1 leaves modes untouched below 25.6 kHz.
  pub fn from_tone(tone: f32) -> Self {
    let tone = if tone.is_finite() { tone.clamp(0.0, 1.0) } else { 1.0 };
    Self {
      cutoff: MIN_CUTOFF * libm::exp2f(CUTOFF_OCTAVES * tone),
      exponent: FALLOFF_DB / 20.0,
    }
  }

  pub fn cutoff(&self) -> f32 {
    self.cutoff
  }

  pub fn gain(&self, frequency: f32) -> f32 {
    if frequency <= self.cutoff {
      1.0
    } else {
      libm::powf(frequency / self.cutoff, self.exponent)
    }
  }
}

impl Default for ToneTilt {
  fn default() -> Self {
    Self::from_tone(1.0)
  }
}
