use oorandom::Rand32;
use thiserror::Error;

/// Upper bound of modes in a bank. Also the size of every per-voice resonator array.
pub const MAX_MODES: usize = 64;

pub const DEFAULT_REFERENCE_NOTE: f32 = 60.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
  #[error("Mode bank has no modes")]
  Empty,

  #[error("Mode bank has {0} modes but at most {} are supported", MAX_MODES)]
  TooManyModes(usize),

  #[error("Mode {index}: frequency {frequency} Hz must be finite and positive")]
  InvalidFrequency { index: usize, frequency: f32 },

  #[error("Mode {index}: frequency {frequency} Hz is not below the Nyquist frequency {nyquist} Hz")]
  AboveNyquist {
    index: usize,
    frequency: f32,
    nyquist: f32,
  },

  #[error("Mode {index}: decay rate {decay} must be finite and positive")]
  InvalidDecay { index: usize, decay: f32 },

  #[error("Mode {index}: decay rate {decay} is too fast for a sample rate of {sample_rate} Hz")]
  DecayTooFast {
    index: usize,
    decay: f32,
    sample_rate: f32,
  },

  #[error("Mode {index}: amplitude {amplitude} is out of range [0, 1]")]
  InvalidAmplitude { index: usize, amplitude: f32 },

  #[error("Mode {index}: pan {pan} is out of range [-1, 1]")]
  InvalidPan { index: usize, pan: f32 },

  #[error("Reference note {0} is not a finite value")]
  InvalidReferenceNote(f32),
}

/// One resonant mode of a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
  /// Hz
  pub frequency: f32,
  /// Amplitude decay per second: after `t` seconds the mode is scaled by `exp(-decay * t)`.
  pub decay: f32,
  pub amplitude: f32,
  pub pan: f32,
}

impl Mode {
  pub fn new(frequency: f32, decay: f32, amplitude: f32) -> Self {
    Self {
      frequency,
      decay,
      amplitude,
      pan: 0.0,
    }
  }

  pub fn with_pan(mut self, pan: f32) -> Self {
    self.pan = pan;
    self
  }

  fn validate(&self, index: usize) -> Result<(), AssetError> {
    if !self.frequency.is_finite() || self.frequency <= 0.0 {
      return Err(AssetError::InvalidFrequency {
        index,
        frequency: self.frequency,
      });
    }
    if !self.decay.is_finite() || self.decay <= 0.0 {
      return Err(AssetError::InvalidDecay {
        index,
        decay: self.decay,
      });
    }
    if !(0.0..=1.0).contains(&self.amplitude) {
      return Err(AssetError::InvalidAmplitude {
        index,
        amplitude: self.amplitude,
      });
    }
    if !(-1.0..=1.0).contains(&self.pan) {
      return Err(AssetError::InvalidPan {
        index,
        pan: self.pan,
      });
    }
    Ok(())
  }
}

/// Relative amount of random variation applied to a bank on every trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Jitter {
  pub frequency: f32,
  pub decay: f32,
  pub amplitude: f32,
}

impl Jitter {
  pub fn uniform(amount: f32) -> Self {
    Self {
      frequency: amount * 0.05,
      decay: amount * 0.2,
      amplitude: amount * 0.2,
    }
  }

  pub fn is_none(&self) -> bool {
    self.frequency == 0.0 && self.decay == 0.0 && self.amplitude == 0.0
  }
}

/// An immutable, validated set of modes describing one material.
///
/// Storage is inline, so copying a bank (for instance through [`ModeBank::jittered`])
/// never touches the heap.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeBank {
  modes: heapless::Vec<Mode, MAX_MODES>,
  reference_note: f32,
}

impl ModeBank {
  pub fn new(modes: &[Mode]) -> Result<Self, AssetError> {
    Self::with_reference_note(modes, DEFAULT_REFERENCE_NOTE)
  }

  /// `reference_note` is the note (in semitones, 69 = A4) the bank sounds when played unshifted.
  pub fn with_reference_note(modes: &[Mode], reference_note: f32) -> Result<Self, AssetError> {
    if modes.is_empty() {
      return Err(AssetError::Empty);
    }
    if modes.len() > MAX_MODES {
      return Err(AssetError::TooManyModes(modes.len()));
    }
    for (index, mode) in modes.iter().enumerate() {
      mode.validate(index)?;
    }
    if !reference_note.is_finite() {
      return Err(AssetError::InvalidReferenceNote(reference_note));
    }

    let modes = heapless::Vec::from_slice(modes).map_err(|_| AssetError::TooManyModes(modes.len()))?;

    Ok(Self {
      modes,
      reference_note,
    })
  }

  /// Checks the constraints that depend on the rendering sample rate.
  pub fn validate_for(&self, sample_rate: f32) -> Result<(), AssetError> {
    let nyquist = sample_rate * 0.5;
    for (index, mode) in self.modes.iter().enumerate() {
      if mode.frequency >= nyquist {
        return Err(AssetError::AboveNyquist {
          index,
          frequency: mode.frequency,
          nyquist,
        });
      }
      if mode.decay >= sample_rate {
        return Err(AssetError::DecayTooFast {
          index,
          decay: mode.decay,
          sample_rate,
        });
      }
    }
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.modes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modes.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Mode> {
    self.modes.get(index)
  }

  pub fn iter(&self) -> core::slice::Iter<'_, Mode> {
    self.modes.iter()
  }

  pub fn modes(&self) -> &[Mode] {
    self.modes.as_slice()
  }

  pub fn reference_note(&self) -> f32 {
    self.reference_note
  }

  pub fn reference_frequency(&self) -> f32 {
    crate::pitch::note_to_hz(self.reference_note)
  }

  /// Returns a randomly perturbed copy. The stored bank is left untouched.
  ///
  /// Each value `v` becomes `v * (1 + (r - 0.5) * amount)` with `r` uniform in `[0, 1)`,
  /// then is clamped back into its valid range.
  pub fn jittered(&self, jitter: &Jitter, rng: &mut Rand32) -> ModeBank {
    let mut bank = self.clone();
    if jitter.is_none() {
      return bank;
    }

    for mode in bank.modes.iter_mut() {
      let frequency = mode.frequency * scatter(rng, jitter.frequency);
      if frequency.is_finite() && frequency > 0.0 {
        mode.frequency = frequency;
      }
      let decay = mode.decay * scatter(rng, jitter.decay);
      if decay.is_finite() && decay > 0.0 {
        mode.decay = decay;
      }
      mode.amplitude = (mode.amplitude * scatter(rng, jitter.amplitude)).clamp(0.0, 1.0);
    }
    bank
  }
}

impl<'a> IntoIterator for &'a ModeBank {
  type Item = &'a Mode;
  type IntoIter = core::slice::Iter<'a, Mode>;

  fn into_iter(self) -> Self::IntoIter {
    self.modes.iter()
  }
}

fn scatter(rng: &mut Rand32, amount: f32) -> f32 {
  if amount == 0.0 {
    1.0
  } else {
    1.0 + (rng.rand_float() - 0.5) * amount
  }
}
