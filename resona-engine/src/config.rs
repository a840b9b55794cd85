use resona_dsp::{VelocityCurve, MAX_MODES};

use crate::error::{Error, Result};

/// Which voices may be taken over when the pool is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealPolicy {
  /// Never steal. Excess triggers are dropped.
  Never,
  /// Only voices that are finished or releasing.
  ReleasedOnly,
  /// Any voice, preferring finished and releasing ones.
  Any,
}

/// How to choose between steal candidates that have the same priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
  Oldest,
  Quietest,
}

/// What an impact does when a voice of the same material is still ringing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetriggerPolicy {
  NewVoice,
  /// Adds energy to the most recent ringing voice of the same bank.
  Layer,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub sample_rate: f32,
  pub channels: usize,
  pub max_block_size: usize,
  pub max_polyphony: usize,
  pub max_banks: usize,
  pub max_active_modes: usize,
  pub event_queue_capacity: usize,
  pub pending_events_capacity: usize,
  pub steal_policy: StealPolicy,
  pub tie_break: TieBreak,
  pub retrigger_policy: RetriggerPolicy,
  pub velocity_curve: VelocityCurve,
  pub silence_threshold: f32,
  pub silence_hold: f32,
  /// Summed voice level the dynamics stage starts limiting at, scaled by the dynamics parameter.
  pub dynamics_threshold: f32,
  pub clamp_output: bool,
  pub seed: u64,
}

impl EngineConfig {
  const DEFAULT_SAMPLE_RATE: f32 = 48000.0;
  const DEFAULT_CHANNELS: usize = 2;
  const DEFAULT_MAX_BLOCK_SIZE: usize = 256;
  const DEFAULT_MAX_POLYPHONY: usize = 32;
  const DEFAULT_MAX_BANKS: usize = 64;
  const DEFAULT_MAX_ACTIVE_MODES: usize = MAX_MODES;
  const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;
  const DEFAULT_PENDING_EVENTS_CAPACITY: usize = 4096;
  const DEFAULT_SILENCE_THRESHOLD: f32 = 1e-4;
  const DEFAULT_SILENCE_HOLD: f32 = 0.05;
  const DEFAULT_DYNAMICS_THRESHOLD: f32 = 1.0;
  const DEFAULT_SEED: u64 = 0x5eed;

  pub const MAX_CHANNELS: usize = 2;
  pub const MAX_POLYPHONY: usize = 1024;

  pub fn validate(&self) -> Result<()> {
    let invalid = |reason: String| Err(Error::InvalidConfig(reason));

    if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
      return invalid(format!("sample rate must be positive, got {}", self.sample_rate));
    }
    if self.channels == 0 || self.channels > Self::MAX_CHANNELS {
      return invalid(format!("channels must be 1 or 2, got {}", self.channels));
    }
    if self.max_block_size == 0 {
      return invalid("max block size must be positive".to_string());
    }
    if self.max_polyphony == 0 || self.max_polyphony > Self::MAX_POLYPHONY {
      return invalid(format!(
        "max polyphony must be in [1, {}], got {}",
        Self::MAX_POLYPHONY,
        self.max_polyphony
      ));
    }
    if self.max_banks == 0 {
      return invalid("max banks must be positive".to_string());
    }
    if self.max_active_modes == 0 || self.max_active_modes > MAX_MODES {
      return invalid(format!(
        "max active modes must be in [1, {}], got {}",
        MAX_MODES, self.max_active_modes
      ));
    }
    if self.event_queue_capacity == 0 || self.pending_events_capacity == 0 {
      return invalid("event capacities must be positive".to_string());
    }
    if !self.silence_threshold.is_finite() || self.silence_threshold <= 0.0 {
      return invalid(format!(
        "silence threshold must be positive, got {}",
        self.silence_threshold
      ));
    }
    if !self.silence_hold.is_finite() || self.silence_hold < 0.0 {
      return invalid(format!(
        "silence hold must not be negative, got {}",
        self.silence_hold
      ));
    }
    if !self.dynamics_threshold.is_finite() || self.dynamics_threshold <= 0.0 {
      return invalid(format!(
        "dynamics threshold must be positive, got {}",
        self.dynamics_threshold
      ));
    }
    Ok(())
  }

  pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
    self.sample_rate = sample_rate;
    self
  }

  pub fn with_channels(mut self, channels: usize) -> Self {
    self.channels = channels;
    self
  }

  pub fn with_max_polyphony(mut self, max_polyphony: usize) -> Self {
    self.max_polyphony = max_polyphony;
    self
  }

  pub fn with_steal_policy(mut self, steal_policy: StealPolicy) -> Self {
    self.steal_policy = steal_policy;
    self
  }

  pub fn with_retrigger_policy(mut self, retrigger_policy: RetriggerPolicy) -> Self {
    self.retrigger_policy = retrigger_policy;
    self
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      sample_rate: Self::DEFAULT_SAMPLE_RATE,
      channels: Self::DEFAULT_CHANNELS,
      max_block_size: Self::DEFAULT_MAX_BLOCK_SIZE,
      max_polyphony: Self::DEFAULT_MAX_POLYPHONY,
      max_banks: Self::DEFAULT_MAX_BANKS,
      max_active_modes: Self::DEFAULT_MAX_ACTIVE_MODES,
      event_queue_capacity: Self::DEFAULT_EVENT_QUEUE_CAPACITY,
      pending_events_capacity: Self::DEFAULT_PENDING_EVENTS_CAPACITY,
      steal_policy: StealPolicy::ReleasedOnly,
      tie_break: TieBreak::Oldest,
      retrigger_policy: RetriggerPolicy::NewVoice,
      velocity_curve: VelocityCurve::Linear,
      silence_threshold: Self::DEFAULT_SILENCE_THRESHOLD,
      silence_hold: Self::DEFAULT_SILENCE_HOLD,
      dynamics_threshold: Self::DEFAULT_DYNAMICS_THRESHOLD,
      clamp_output: true,
      seed: Self::DEFAULT_SEED,
    }
  }
}
