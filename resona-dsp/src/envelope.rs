use crate::float::Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsrStage {
  Idle,
  Attack,
  Decay,
  Sustain,
  Release,
}

/// Stage times in seconds, sustain as a level in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrTimes<F> {
  pub attack: F,
  pub decay: F,
  pub sustain: F,
  pub release: F,
}

impl<F: Float> Default for AdsrTimes<F> {
  fn default() -> Self {
    Self {
      attack: F::val(0.005),
      decay: F::val(0.1),
      sustain: F::val(0.8),
      release: F::val(0.3),
    }
  }
}

/// Linear ADSR envelope.
#[derive(Debug, Clone)]
pub struct Adsr<F> {
  stage: AdsrStage,
  level: F,
  attack_step: F,
  decay_step: F,
  sustain: F,
  release_samples: F,
  release_step: F,
}

impl<F: Float> Adsr<F> {
  pub fn new(times: AdsrTimes<F>, sample_rate: F) -> Self {
    let mut adsr = Self {
      stage: AdsrStage::Idle,
      level: F::zero(),
      attack_step: F::one(),
      decay_step: F::one(),
      sustain: F::one(),
      release_samples: F::one(),
      release_step: F::one(),
    };
    adsr.set_times(times, sample_rate);
    adsr
  }

  pub fn set_times(&mut self, times: AdsrTimes<F>, sample_rate: F) {
    let samples = |time: F| (time.max(F::zero()) * sample_rate).max(F::one());
    self.sustain = times.sustain.max(F::zero()).min(F::one());
    self.attack_step = samples(times.attack).recip();
    self.decay_step = (F::one() - self.sustain) / samples(times.decay);
    self.release_samples = samples(times.release);
  }

  pub fn stage(&self) -> AdsrStage {
    self.stage
  }

  pub fn level(&self) -> F {
    self.level
  }

  pub fn is_idle(&self) -> bool {
    self.stage == AdsrStage::Idle
  }

  /// Starts (or restarts) the attack from the current level, so retriggers do not click.
  pub fn note_on(&mut self) {
    self.stage = AdsrStage::Attack;
  }

  /// Starts the release from the current level. Does nothing when idle or already releasing.
  pub fn note_off(&mut self) {
    match self.stage {
      AdsrStage::Idle | AdsrStage::Release => {}
      _ => {
        self.release_step = self.level / self.release_samples;
        self.stage = AdsrStage::Release;
      }
    }
  }

  pub fn reset(&mut self) {
    self.stage = AdsrStage::Idle;
    self.level = F::zero();
  }

  #[inline]
  pub fn next_value(&mut self) -> F {
    match self.stage {
      AdsrStage::Idle => {}
      AdsrStage::Attack => {
        self.level = self.level + self.attack_step;
        if self.level >= F::one() {
          self.level = F::one();
          self.stage = AdsrStage::Decay;
        }
      }
      AdsrStage::Decay => {
        self.level = self.level - self.decay_step;
        if self.level <= self.sustain {
          self.level = self.sustain;
          self.stage = AdsrStage::Sustain;
        }
      }
      AdsrStage::Sustain => {
        self.level = self.sustain;
      }
      AdsrStage::Release => {
        self.level = self.level - self.release_step;
        if self.level <= F::zero() || self.release_step <= F::zero() {
          self.level = F::zero();
          self.stage = AdsrStage::Idle;
        }
      }
    }
    self.level
  }
}
