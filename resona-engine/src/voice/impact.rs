use oorandom::Rand32;

use resona_dsp::ModeBank;

use crate::banks::BankId;
use crate::events::ExcitationEvent;
use crate::voice::{ModeSet, RenderStatus, SilenceGate, VoiceState, Voicing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactState {
  Idle,
  Triggered,
  Ringing,
  Finished,
}

/// One struck object ringing out.
#[derive(Debug, Clone)]
pub struct ImpactVoice {
  state: ImpactState,
  bank: BankId,
  modes: ModeSet,
  gate: SilenceGate,
  energy: f32,
}

impl Default for ImpactVoice {
  fn default() -> Self {
    Self {
      state: ImpactState::Idle,
      bank: BankId(0),
      modes: ModeSet::default(),
      gate: SilenceGate::default(),
      energy: 0.0,
    }
  }
}

impl ImpactVoice {
  pub fn state(&self) -> ImpactState {
    self.state
  }

  pub fn voice_state(&self) -> VoiceState {
    match self.state {
      ImpactState::Idle => VoiceState::Idle,
      ImpactState::Triggered => VoiceState::Attacking,
      ImpactState::Ringing => VoiceState::Sustaining,
      ImpactState::Finished => VoiceState::Finished,
    }
  }

  pub fn bank(&self) -> BankId {
    self.bank
  }

  pub fn energy(&self) -> f32 {
    self.energy
  }

  /// Binds the resonators to `bank` and strikes them with the event strength.
  pub fn trigger(
    &mut self,
    event: &ExcitationEvent,
    bank_id: BankId,
    bank: &ModeBank,
    voicing: &Voicing,
    rng: &mut Rand32,
  ) {
    let tone = event.tone.unwrap_or(voicing.tone);
    self.modes.bind(bank, voicing, 1.0, tone, rng);
    self.bank = bank_id;
    self.gate = SilenceGate::new(voicing.silence_threshold, voicing.silence_hold);
    self.state = ImpactState::Triggered;
    self.strike(event, voicing);
  }

  /// Adds the energy of another strike to the modes that are already ringing.
  pub fn layer(&mut self, event: &ExcitationEvent, voicing: &Voicing) {
    if matches!(self.state, ImpactState::Triggered | ImpactState::Ringing) {
      self.strike(event, voicing);
    }
  }

  pub fn stop(&mut self) {
    self.modes.clear();
    self.energy = 0.0;
    self.state = ImpactState::Finished;
  }

  fn strike(&mut self, event: &ExcitationEvent, voicing: &Voicing) {
    let strength = event.strength.max(0.0) * voicing.strength;
    if strength.is_finite() {
      self.modes.strike(strength);
    }
    self.energy = self.modes.amplitude();
  }

  pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> RenderStatus {
    match self.state {
      ImpactState::Idle | ImpactState::Finished => return RenderStatus::Ok,
      ImpactState::Triggered => self.state = ImpactState::Ringing,
      ImpactState::Ringing => {}
    }

    if self.modes.render(left, right) > 0 {
      self.stop();
      return RenderStatus::Unstable;
    }

    let active = self.modes.update_activity();
    self.energy = self.modes.amplitude();
    if active == 0 || self.gate.update(self.energy, left.len()) {
      self.state = ImpactState::Finished;
    }
    RenderStatus::Ok
  }

  #[cfg(test)]
  pub(crate) fn corrupt(&mut self) {
    self.modes.corrupt(0);
  }
}
