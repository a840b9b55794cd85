use oorandom::Rand32;

use resona_dsp::pitch::semitones_to_ratio;
use resona_dsp::{Adsr, AdsrStage, AdsrTimes, ModeBank};

use crate::banks::BankId;
use crate::events::{NoteEvent, NoteId};
use crate::voice::{ModeSet, RenderStatus, VoiceState, Voicing};

/// A pitched note that keeps its modes driven until it is released.
#[derive(Debug, Clone)]
pub struct InstrumentVoice {
  note_id: NoteId,
  bank: BankId,
  modes: ModeSet,
  envelope: Adsr<f32>,
  damper: f32,
  held: bool,
  captured: bool,
  started: bool,
}

impl Default for InstrumentVoice {
  fn default() -> Self {
    Self {
      note_id: NoteId(0),
      bank: BankId(0),
      modes: ModeSet::default(),
      envelope: Adsr::new(AdsrTimes::default(), 1.0),
      damper: 0.0,
      held: false,
      captured: false,
      started: false,
    }
  }
}

impl InstrumentVoice {
  pub fn voice_state(&self) -> VoiceState {
    match self.envelope.stage() {
      AdsrStage::Idle if self.started => VoiceState::Finished,
      AdsrStage::Idle => VoiceState::Idle,
      AdsrStage::Attack => VoiceState::Attacking,
      AdsrStage::Decay | AdsrStage::Sustain => VoiceState::Sustaining,
      AdsrStage::Release => VoiceState::Releasing,
    }
  }

  pub fn note_id(&self) -> NoteId {
    self.note_id
  }

  pub fn bank(&self) -> BankId {
    self.bank
  }

  pub fn energy(&self) -> f32 {
    self.modes.amplitude() * self.envelope.level()
  }

  /// True while a pedal keeps a released note sounding.
  pub fn is_held(&self) -> bool {
    self.held
  }

  /// True while the sostenuto pedal that caught this note is down.
  pub fn is_captured(&self) -> bool {
    self.captured
  }

  pub fn capture(&mut self) {
    self.captured = true;
  }

  pub fn uncapture(&mut self) {
    self.captured = false;
  }

  /// Binds the bank transposed so its reference note lands on the event pitch,
  /// plus the voicing pitch offset, and starts driving it.
  pub fn note_on(
    &mut self,
    event: &NoteEvent,
    bank_id: BankId,
    bank: &ModeBank,
    voicing: &Voicing,
    rng: &mut Rand32,
  ) {
    let semitones = event.pitch.as_semitones() + voicing.pitch_offset - bank.reference_note();
    let ratio = semitones_to_ratio(semitones);

    self.modes.bind(bank, voicing, ratio, voicing.tone, rng);
    self.note_id = event.note_id;
    self.bank = bank_id;
    self.held = false;
    self.captured = false;
    self.started = true;
    self.envelope.reset();
    self.restrike(event, voicing);
  }

  /// Restarts the attack of a note that is already sounding, from its current level.
  /// The new strike adds to the energy still in the modes.
  pub fn restrike(&mut self, event: &NoteEvent, voicing: &Voicing) {
    self.modes.damp(0.0);
    self
      .modes
      .restrike_drive(voicing.velocity_curve.apply(event.velocity));
    self.envelope.set_times(voicing.envelope, voicing.sample_rate);
    self.envelope.note_on();
    self.damper = voicing.damper;
    self.held = false;
  }

  /// Starts the release. The modes ring out freely under the release envelope,
  /// decaying faster by the damper setting.
  pub fn release(&mut self) {
    self.held = false;
    self.captured = false;
    self.modes.stop_drive();
    if self.damper > 0.0 {
      self.modes.damp(self.damper);
    }
    self.envelope.note_off();
  }

  /// Marks the note as released while the sustain pedal is down. It keeps sounding.
  pub fn hold(&mut self) {
    self.held = true;
  }

  pub fn stop(&mut self) {
    self.modes.clear();
    self.envelope.reset();
    self.held = false;
    self.captured = false;
  }

  pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> RenderStatus {
    if !self.voice_state().is_sounding() {
      return RenderStatus::Ok;
    }

    if self.modes.render(left, right) > 0 {
      self.stop();
      return RenderStatus::Unstable;
    }

    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
      let level = self.envelope.next_value();
      *l *= level;
      *r *= level;
    }

    self.modes.update_activity();
    if self.envelope.is_idle() {
      self.modes.clear();
    }
    RenderStatus::Ok
  }

  #[cfg(test)]
  pub(crate) fn corrupt(&mut self) {
    self.modes.corrupt(0);
  }
}
