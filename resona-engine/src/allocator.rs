use std::mem;

use oorandom::Rand32;
use thiserror::Error;

use resona_dsp::ModeBank;

use crate::banks::BankId;
use crate::config::{EngineConfig, RetriggerPolicy, StealPolicy, TieBreak};
use crate::events::{ExcitationEvent, NoteEvent, NoteId, StopTarget};
use crate::voice::{ImpactVoice, InstrumentVoice, RenderStatus, Voice, VoiceState, Voicing};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  #[error("No voice available under the polyphony ceiling")]
  PolyphonyExceeded,

  #[error("Note off for {0} does not match any sounding note")]
  UnmatchedNoteOff(NoteId),
}

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
  /// A free slot.
  New(usize),
  /// A slot taken over from a finished or releasing voice.
  Stolen(usize),
  /// A voice already sounding for the same event source.
  Reused(usize),
}

impl Allocation {
  pub fn index(&self) -> usize {
    match *self {
      Allocation::New(index) | Allocation::Stolen(index) | Allocation::Reused(index) => index,
    }
  }
}

/// How long a stolen voice keeps sounding, fading out under the one that replaced it.
pub const STEAL_FADE_TIME: f32 = 0.005;

#[derive(Debug, Clone)]
struct VoiceSlot {
  voice: Voice,
  priority: u8,
  started: u64,
  outgoing: Voice,
  fade: Fade,
}

impl Default for VoiceSlot {
  fn default() -> Self {
    Self {
      voice: Voice::Idle,
      priority: 0,
      started: 0,
      outgoing: Voice::Idle,
      fade: Fade::default(),
    }
  }
}

/// Linear ramp from one to zero over `length` samples.
#[derive(Debug, Clone, Copy, Default)]
struct Fade {
  remaining: usize,
  length: usize,
}

impl Fade {
  fn new(length: usize) -> Self {
    let length = length.max(1);
    Self {
      remaining: length,
      length,
    }
  }

  fn is_done(&self) -> bool {
    self.remaining == 0
  }

  fn apply(&mut self, left: &mut [f32], right: &mut [f32]) {
    let step = 1.0 / self.length as f32;
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
      self.remaining = self.remaining.saturating_sub(1);
      let gain = self.remaining as f32 * step;
      *l *= gain;
      *r *= gain;
    }
  }
}

/// Fixed pool of voices. Every slot and the mixing scratch are allocated up front,
/// so nothing here allocates once constructed.
pub struct VoiceAllocator {
  slots: Vec<VoiceSlot>,
  steal_policy: StealPolicy,
  tie_break: TieBreak,
  retrigger_policy: RetriggerPolicy,
  rng: Rand32,
  clock: u64,
  sustain: bool,
  sostenuto: bool,
  scratch_left: Vec<f32>,
  scratch_right: Vec<f32>,
}

impl VoiceAllocator {
  pub fn new(config: &EngineConfig) -> Self {
    Self {
      slots: vec![VoiceSlot::default(); config.max_polyphony],
      steal_policy: config.steal_policy,
      tie_break: config.tie_break,
      retrigger_policy: config.retrigger_policy,
      rng: Rand32::new(config.seed),
      clock: 0,
      sustain: false,
      sostenuto: false,
      scratch_left: vec![0.0; config.max_block_size],
      scratch_right: vec![0.0; config.max_block_size],
    }
  }

  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Voices that are attacking, sustaining or releasing.
  pub fn active_count(&self) -> usize {
    self
      .slots
      .iter()
      .filter(|slot| slot.voice.state().is_sounding())
      .count()
  }

  pub fn state(&self, index: usize) -> Option<VoiceState> {
    self.slots.get(index).map(|slot| slot.voice.state())
  }

  pub fn voice(&self, index: usize) -> Option<&Voice> {
    self.slots.get(index).map(|slot| &slot.voice)
  }

  pub fn is_sustain_down(&self) -> bool {
    self.sustain
  }

  pub fn is_sostenuto_down(&self) -> bool {
    self.sostenuto
  }

  /// Sum of the current level of every sounding voice.
  pub fn energy(&self) -> f32 {
    self
      .slots
      .iter()
      .filter(|slot| slot.voice.state().is_sounding())
      .map(|slot| slot.voice.energy())
      .sum()
  }

  pub fn trigger(
    &mut self,
    event: &ExcitationEvent,
    bank_id: BankId,
    bank: &ModeBank,
    voicing: &Voicing,
  ) -> Result<Allocation, AllocError> {
    if self.retrigger_policy == RetriggerPolicy::Layer {
      if let Some(index) = self.ringing_impact(bank_id) {
        if let Voice::Impact(voice) = &mut self.slots[index].voice {
          voice.layer(event, voicing);
        }
        return Ok(Allocation::Reused(index));
      }
    }

    let allocation = self.find_slot(event.priority)?;
    let index = allocation.index();
    self.start_slot(allocation, event.priority, voicing);
    let slot = &mut self.slots[index];
    if !matches!(slot.voice, Voice::Impact(_)) {
      slot.voice = Voice::Impact(ImpactVoice::default());
    }
    if let Voice::Impact(voice) = &mut slot.voice {
      voice.trigger(event, bank_id, bank, voicing, &mut self.rng);
    }
    Ok(allocation)
  }

  pub fn note_on(
    &mut self,
    event: &NoteEvent,
    bank_id: BankId,
    bank: &ModeBank,
    voicing: &Voicing,
  ) -> Result<Allocation, AllocError> {
    if let Some(index) = self.sounding_note(event.note_id) {
      if let Voice::Instrument(voice) = &mut self.slots[index].voice {
        if voice.bank() == bank_id {
          voice.restrike(event, voicing);
          self.slots[index].priority = event.priority;
          return Ok(Allocation::Reused(index));
        }
        voice.release();
      }
    }

    let allocation = self.find_slot(event.priority)?;
    let index = allocation.index();
    self.start_slot(allocation, event.priority, voicing);
    let slot = &mut self.slots[index];
    if !matches!(slot.voice, Voice::Instrument(_)) {
      slot.voice = Voice::Instrument(InstrumentVoice::default());
    }
    if let Voice::Instrument(voice) = &mut slot.voice {
      voice.note_on(event, bank_id, bank, voicing, &mut self.rng);
    }
    Ok(allocation)
  }

  /// Releases the attacking or sustaining voice playing `note_id`, or holds it
  /// while the sustain pedal is down or the sostenuto pedal caught it.
  pub fn note_off(&mut self, note_id: NoteId) -> Result<usize, AllocError> {
    let index = self
      .slots
      .iter()
      .position(|slot| match &slot.voice {
        Voice::Instrument(voice) => {
          voice.note_id() == note_id
            && !voice.is_held()
            && matches!(
              voice.voice_state(),
              VoiceState::Attacking | VoiceState::Sustaining
            )
        }
        _ => false,
      })
      .ok_or(AllocError::UnmatchedNoteOff(note_id))?;

    if let Voice::Instrument(voice) = &mut self.slots[index].voice {
      if self.sustain || voice.is_captured() {
        voice.hold();
      } else {
        voice.release();
      }
    }
    Ok(index)
  }

  /// Releasing the pedal releases every note it was holding, except the ones the
  /// sostenuto pedal still holds.
  pub fn set_sustain(&mut self, down: bool) {
    self.sustain = down;
    if !down {
      for voice in self.instruments_mut() {
        if voice.is_held() && !voice.is_captured() {
          voice.release();
        }
      }
    }
  }

  /// Pressing the pedal catches the notes whose keys are down at that moment. They keep
  /// sounding after their note off until the pedal is lifted. Notes played later are
  /// not affected.
  pub fn set_sostenuto(&mut self, down: bool) {
    if down == self.sostenuto {
      return;
    }
    self.sostenuto = down;
    let sustain = self.sustain;
    for voice in self.instruments_mut() {
      if down {
        let key_down = matches!(
          voice.voice_state(),
          VoiceState::Attacking | VoiceState::Sustaining
        ) && !voice.is_held();
        if key_down {
          voice.capture();
        }
      } else if voice.is_captured() {
        voice.uncapture();
        if voice.is_held() && !sustain {
          voice.release();
        }
      }
    }
  }

  /// Returns how many voices were affected.
  pub fn stop(&mut self, target: StopTarget) -> usize {
    let mut count = 0;
    match target {
      StopTarget::Note(note_id) => {
        for voice in self.instruments_mut() {
          if voice.note_id() == note_id && voice.voice_state().is_sounding() {
            voice.release();
            count += 1;
          }
        }
      }
      StopTarget::AllNotes => {
        for voice in self.instruments_mut() {
          if voice.voice_state().is_sounding() {
            voice.release();
            count += 1;
          }
        }
      }
      StopTarget::All => {
        count = self.active_count();
        for slot in self.slots.iter_mut() {
          slot.voice = Voice::Idle;
          slot.outgoing = Voice::Idle;
          slot.fade = Fade::default();
        }
      }
    }
    count
  }

  /// Mixes every sounding voice into `left` and `right`, whose length must not exceed
  /// the configured block size. Returns how many voices went unstable. Their output
  /// for this block is discarded.
  ///
  /// Stolen voices are mixed in under a short fade until it completes.
  pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
    let num_samples = left.len().min(right.len()).min(self.scratch_left.len());
    let scratch_left = &mut self.scratch_left[..num_samples];
    let scratch_right = &mut self.scratch_right[..num_samples];

    let mut unstable = 0;
    for slot in self.slots.iter_mut() {
      if !slot.fade.is_done() {
        scratch_left.fill(0.0);
        scratch_right.fill(0.0);
        match slot.outgoing.render(scratch_left, scratch_right) {
          RenderStatus::Ok => {
            slot.fade.apply(scratch_left, scratch_right);
            mix(&mut left[..num_samples], scratch_left);
            mix(&mut right[..num_samples], scratch_right);
          }
          RenderStatus::Unstable => {
            slot.fade = Fade::default();
            unstable += 1;
          }
        }
        if slot.fade.is_done() {
          slot.outgoing = Voice::Idle;
        }
      }

      if !slot.voice.state().is_sounding() {
        continue;
      }
      scratch_left.fill(0.0);
      scratch_right.fill(0.0);
      match slot.voice.render(scratch_left, scratch_right) {
        RenderStatus::Ok => {
          mix(&mut left[..num_samples], scratch_left);
          mix(&mut right[..num_samples], scratch_right);
        }
        RenderStatus::Unstable => unstable += 1,
      }
    }
    unstable
  }

  /// Returns finished voices to the pool.
  pub fn reclaim(&mut self) -> usize {
    let mut count = 0;
    for slot in self.slots.iter_mut() {
      if slot.voice.state() == VoiceState::Finished {
        slot.voice = Voice::Idle;
        count += 1;
      }
    }
    count
  }

  pub fn reset(&mut self) {
    for slot in self.slots.iter_mut() {
      *slot = VoiceSlot::default();
    }
    self.sustain = false;
    self.sostenuto = false;
    self.clock = 0;
  }

  /// A stolen voice moves aside to fade out. The slot keeps whatever was fading
  /// there before, so the new voice can reuse its storage.
  fn start_slot(&mut self, allocation: Allocation, priority: u8, voicing: &Voicing) {
    self.clock += 1;
    let slot = &mut self.slots[allocation.index()];
    slot.priority = priority;
    slot.started = self.clock;
    if let Allocation::Stolen(_) = allocation {
      if slot.voice.state().is_sounding() {
        mem::swap(&mut slot.voice, &mut slot.outgoing);
        slot.fade = Fade::new((voicing.sample_rate * STEAL_FADE_TIME) as usize);
      }
    }
  }

  fn instruments_mut(&mut self) -> impl Iterator<Item = &mut InstrumentVoice> + '_ {
    self.slots.iter_mut().filter_map(|slot| match &mut slot.voice {
      Voice::Instrument(voice) => Some(voice),
      _ => None,
    })
  }

  fn sounding_note(&self, note_id: NoteId) -> Option<usize> {
    self.slots.iter().position(|slot| {
      slot.voice.note_id() == Some(note_id) && slot.voice.state().is_sounding()
    })
  }

  fn ringing_impact(&self, bank_id: BankId) -> Option<usize> {
    self
      .slots
      .iter()
      .enumerate()
      .filter(|(_, slot)| match &slot.voice {
        Voice::Impact(voice) => voice.bank() == bank_id && voice.voice_state().is_sounding(),
        _ => false,
      })
      .max_by_key(|(_, slot)| slot.started)
      .map(|(index, _)| index)
  }

  /// Picks a slot for a new voice: a free one if any, otherwise a steal candidate
  /// allowed by the policy with a priority not above `priority`.
  fn find_slot(&self, priority: u8) -> Result<Allocation, AllocError> {
    let free = self.slots.iter().position(|slot| {
      matches!(
        slot.voice.state(),
        VoiceState::Idle | VoiceState::Finished
      )
    });
    if let Some(index) = free {
      return Ok(Allocation::New(index));
    }

    let stealable = |state: VoiceState| match self.steal_policy {
      StealPolicy::Never => false,
      StealPolicy::ReleasedOnly => state == VoiceState::Releasing,
      StealPolicy::Any => true,
    };

    self
      .slots
      .iter()
      .enumerate()
      .filter(|(_, slot)| slot.priority <= priority && stealable(slot.voice.state()))
      .min_by(|(_, a), (_, b)| {
        let releasing = |slot: &VoiceSlot| slot.voice.state() != VoiceState::Releasing;
        releasing(a)
          .cmp(&releasing(b))
          .then(a.priority.cmp(&b.priority))
          .then_with(|| match self.tie_break {
            TieBreak::Oldest => a.started.cmp(&b.started),
            TieBreak::Quietest => a.voice.energy().total_cmp(&b.voice.energy()),
          })
      })
      .map(|(index, _)| Allocation::Stolen(index))
      .ok_or(AllocError::PolyphonyExceeded)
  }
}

fn mix(output: &mut [f32], input: &[f32]) {
  for (out, sample) in output.iter_mut().zip(input.iter()) {
    *out += *sample;
  }
}
