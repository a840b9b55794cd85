mod impact;
mod instrument;

use oorandom::Rand32;

use resona_dsp::tone::ToneTilt;
use resona_dsp::{AdsrTimes, Jitter, ModeBank, Resonator, VelocityCurve, MAX_MODES};

use crate::banks::BankId;
use crate::config::EngineConfig;
use crate::events::NoteId;
use crate::params::{Param, ParamSnapshot};

pub use impact::{ImpactState, ImpactVoice};
pub use instrument::InstrumentVoice;

/// Resonators quieter than this stop being computed until struck again.
pub const STRENGTH_FLOOR: f32 = 5e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
  Idle,
  Attacking,
  Sustaining,
  Releasing,
  Finished,
}

impl VoiceState {
  pub fn is_sounding(&self) -> bool {
    matches!(
      self,
      VoiceState::Attacking | VoiceState::Sustaining | VoiceState::Releasing
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
  Ok,
  /// A resonator went non finite. It was zeroed, the voice finished and its output must be discarded.
  Unstable,
}

/// Settings a voice needs when it starts, resolved once per buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voicing {
  pub sample_rate: f32,
  pub max_active_modes: usize,
  pub strength: f32,
  pub damping: f32,
  pub damper: f32,
  pub jitter: Jitter,
  pub tone: f32,
  pub pitch_offset: f32,
  pub envelope: AdsrTimes<f32>,
  pub velocity_curve: VelocityCurve,
  pub silence_threshold: f32,
  pub silence_hold: usize,
}

impl Voicing {
  pub fn new(config: &EngineConfig, sample_rate: f32, params: &ParamSnapshot) -> Self {
    Self {
      sample_rate,
      max_active_modes: config.max_active_modes,
      strength: params.get(Param::Strength),
      damping: params.get(Param::Damping),
      damper: params.get(Param::Damper),
      jitter: Jitter::uniform(params.get(Param::Jitter)),
      tone: params.get(Param::Tone),
      pitch_offset: params.get(Param::Pitch),
      envelope: AdsrTimes {
        attack: params.get(Param::Attack),
        decay: params.get(Param::Decay),
        sustain: params.get(Param::Sustain),
        release: params.get(Param::Release),
      },
      velocity_curve: config.velocity_curve,
      silence_threshold: config.silence_threshold,
      silence_hold: (config.silence_hold * sample_rate) as usize,
    }
  }
}

/// A pool slot. Every variant is stored inline, so switching kinds never allocates.
#[derive(Debug, Clone)]
pub enum Voice {
  Idle,
  Impact(ImpactVoice),
  Instrument(InstrumentVoice),
}

impl Voice {
  pub fn state(&self) -> VoiceState {
    match self {
      Voice::Idle => VoiceState::Idle,
      Voice::Impact(voice) => voice.voice_state(),
      Voice::Instrument(voice) => voice.voice_state(),
    }
  }

  pub fn bank(&self) -> Option<BankId> {
    match self {
      Voice::Idle => None,
      Voice::Impact(voice) => Some(voice.bank()),
      Voice::Instrument(voice) => Some(voice.bank()),
    }
  }

  pub fn note_id(&self) -> Option<NoteId> {
    match self {
      Voice::Instrument(voice) => Some(voice.note_id()),
      _ => None,
    }
  }

  /// Rough current output level, used to pick the quietest voice to steal.
  pub fn energy(&self) -> f32 {
    match self {
      Voice::Idle => 0.0,
      Voice::Impact(voice) => voice.energy(),
      Voice::Instrument(voice) => voice.energy(),
    }
  }

  /// Adds this voice's output to `left` and `right`, which must be silent on entry.
  pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> RenderStatus {
    match self {
      Voice::Idle => RenderStatus::Ok,
      Voice::Impact(voice) => voice.render(left, right),
      Voice::Instrument(voice) => voice.render(left, right),
    }
  }
}

/// Tracks how long a voice has been under the silence threshold.
#[derive(Debug, Clone, Default)]
pub(crate) struct SilenceGate {
  threshold: f32,
  hold: usize,
  quiet: usize,
}

impl SilenceGate {
  pub fn new(threshold: f32, hold: usize) -> Self {
    Self {
      threshold,
      hold,
      quiet: 0,
    }
  }

  /// Returns true once the level stayed quiet for at least the hold time.
  pub fn update(&mut self, level: f32, num_samples: usize) -> bool {
    if level < self.threshold {
      self.quiet = self.quiet.saturating_add(num_samples);
    } else {
      self.quiet = 0;
    }
    self.quiet >= self.hold && level < self.threshold
  }
}

#[derive(Debug, Clone, Default)]
struct VoiceMode {
  resonator: Resonator<f32>,
  frequency: f32,
  decay: f32,
  weight: f32,
}

/// The resonators owned by a voice, one per selected mode of its bank.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModeSet {
  modes: heapless::Vec<VoiceMode, MAX_MODES>,
  sample_rate: f32,
}

impl ModeSet {
  /// Binds a resonator to each of the loudest `max_active_modes` modes of `bank`.
  ///
  /// Frequencies are scaled by `ratio` and decays by the damping setting, the weight of
  /// each mode is its amplitude shaped by the tone tilt.
  pub fn bind(
    &mut self,
    bank: &ModeBank,
    voicing: &Voicing,
    ratio: f32,
    tone: f32,
    rng: &mut Rand32,
  ) {
    self.modes.clear();
    self.sample_rate = voicing.sample_rate;

    let bank = bank.jittered(&voicing.jitter, rng);
    let tilt = ToneTilt::from_tone(tone);

    let mut selection = heapless::Vec::<usize, MAX_MODES>::new();
    selection.extend(0..bank.len());
    let max_active_modes = voicing.max_active_modes.max(1);
    if selection.len() > max_active_modes {
      let modes = bank.modes();
      selection.sort_unstable_by(|a, b| modes[*b].amplitude.total_cmp(&modes[*a].amplitude));
      selection.truncate(max_active_modes);
      selection.sort_unstable();
    }

    for index in selection {
      if let Some(mode) = bank.get(index) {
        let frequency = mode.frequency * ratio;
        let decay = mode.decay * voicing.damping;
        let mut resonator = Resonator::default();
        resonator.tune(frequency, decay, voicing.sample_rate);
        resonator.set_pan(mode.pan);
        let voice_mode = VoiceMode {
          resonator,
          frequency,
          decay,
          weight: mode.amplitude * tilt.gain(frequency),
        };
        // capacity matches the bank limit, so this cannot fail
        self.modes.push(voice_mode).ok();
      }
    }
  }

  pub fn clear(&mut self) {
    self.modes.clear();
  }

  pub fn strike(&mut self, strength: f32) {
    for mode in self.modes.iter_mut() {
      mode.resonator.strike(strength * mode.weight);
    }
  }

  /// Drives every mode, adding to whatever is still sounding.
  pub fn restrike_drive(&mut self, gain: f32) {
    for mode in self.modes.iter_mut() {
      mode.resonator.restrike_drive(gain * mode.weight);
    }
  }

  /// Retunes every mode to decay `extra` per second faster than it was bound with.
  /// Zero restores the bound decays. The ring keeps going from its current state.
  pub fn damp(&mut self, extra: f32) {
    for mode in self.modes.iter_mut() {
      mode
        .resonator
        .tune(mode.frequency, mode.decay + extra.max(0.0), self.sample_rate);
    }
  }

  pub fn stop_drive(&mut self) {
    for mode in self.modes.iter_mut() {
      mode.resonator.stop_drive();
    }
  }

  /// Renders every active resonator. Non finite resonators are reset and counted.
  pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
    let mut unstable = 0;
    for mode in self.modes.iter_mut() {
      mode.resonator.render(left, right, 1.0);
      if !mode.resonator.is_finite() {
        mode.resonator.reset();
        unstable += 1;
      }
    }
    unstable
  }

  /// Puts quiet resonators to sleep and returns how many are still active.
  pub fn update_activity(&mut self) -> usize {
    self
      .modes
      .iter_mut()
      .map(|mode| mode.resonator.update_activity(STRENGTH_FLOOR))
      .filter(|active| *active)
      .count()
  }

  /// Upper bound of the current peak level.
  pub fn amplitude(&self) -> f32 {
    self
      .modes
      .iter()
      .map(|mode| {
        let (left, right) = mode.resonator.pan_gains();
        mode.resonator.amplitude() * left.max(right)
      })
      .sum()
  }

  #[cfg(test)]
  pub(crate) fn corrupt(&mut self, index: usize) {
    if let Some(mode) = self.modes.get_mut(index) {
      mode.resonator.strike(f32::NAN);
    }
  }
}
