use std::sync::Arc;

use ringbuf::{Consumer, Producer};

use resona_dsp::smoother::{LinearSteps, LinearStepsSmoother};
use resona_dsp::ModeBank;

use crate::allocator::{AllocError, Allocation, VoiceAllocator};
use crate::banks::{BankId, BankTable};
use crate::diagnostics::Diagnostics;
use crate::dynamics::DynamicsLimiter;
use crate::events::buffer::EventsBuffer;
use crate::events::{Event, NoteKind, Timestamp};
use crate::messages::Message;
use crate::params::{Param, Parameters};
use crate::voice::Voicing;
use crate::EngineConfig;

const RETIRED_CAPACITY: usize = 16;
const GAIN_SMOOTHING_TIME: f32 = 0.005;

/// Audio thread side of an engine. [`Renderer::render`] never blocks, never allocates
/// and never logs. Whatever goes wrong is counted in [`Diagnostics`].
pub struct Renderer {
  tx: Producer<Message>,
  rx: Consumer<Message>,

  config: EngineConfig,
  parameters: Arc<Parameters>,
  diagnostics: Arc<Diagnostics>,

  banks: BankTable,
  retired: heapless::Vec<Arc<ModeBank>, RETIRED_CAPACITY>,
  pending: EventsBuffer,
  voices: VoiceAllocator,
  gain: LinearStepsSmoother<f32>,
  dynamics: DynamicsLimiter,
  left: Vec<f32>,
  right: Vec<f32>,

  sample_rate: f32,
  position: Timestamp,
}

impl Renderer {
  pub(crate) fn new(
    tx: Producer<Message>,
    rx: Consumer<Message>,
    config: EngineConfig,
    parameters: Arc<Parameters>,
    diagnostics: Arc<Diagnostics>,
  ) -> Self {
    let sample_rate = config.sample_rate;
    let gain = Self::gain_smoother(parameters.get(Param::Gain), sample_rate);
    Self {
      tx,
      rx,
      banks: BankTable::with_capacity(config.max_banks),
      retired: heapless::Vec::new(),
      pending: EventsBuffer::with_capacity(config.pending_events_capacity),
      voices: VoiceAllocator::new(&config),
      gain,
      dynamics: DynamicsLimiter::new(config.dynamics_threshold, sample_rate),
      left: vec![0.0; config.max_block_size],
      right: vec![0.0; config.max_block_size],
      sample_rate,
      position: 0,
      config,
      parameters,
      diagnostics,
    }
  }

  fn gain_smoother(gain: f32, sample_rate: f32) -> LinearStepsSmoother<f32> {
    LinearStepsSmoother::new(gain, LinearSteps::from_time(sample_rate, GAIN_SMOOTHING_TIME))
  }

  pub fn channels(&self) -> usize {
    self.config.channels
  }

  pub fn sample_rate(&self) -> f32 {
    self.sample_rate
  }

  /// Frames rendered so far, the timestamp of the next frame.
  pub fn position(&self) -> Timestamp {
    self.position
  }

  pub fn active_voices(&self) -> usize {
    self.voices.active_count()
  }

  /// Renders `frame_count` interleaved frames of the configured channel count into
  /// `output`, overwriting it.
  pub fn render(&mut self, output: &mut [f32], frame_count: usize, sample_rate: f32) {
    let channels = self.config.channels;
    self.render_channels(output, frame_count, channels, sample_rate);
  }

  /// Renders `frame_count` interleaved frames of `channels` samples into `output`,
  /// overwriting it.
  ///
  /// Mono output is the average of both sides. With more than two channels the mix goes
  /// to the first two and the rest are silent. Frames that do not fit in `output` are
  /// not rendered. A `sample_rate` different from the previous call resets every voice.
  /// Rendering zero frames or channels does nothing at all.
  pub fn render_channels(
    &mut self,
    output: &mut [f32],
    frame_count: usize,
    channels: usize,
    sample_rate: f32,
  ) {
    if channels == 0 {
      return;
    }
    let frame_count = frame_count.min(output.len() / channels);
    if frame_count == 0 {
      return;
    }

    self.update_sample_rate(sample_rate);
    self.process_messages();
    self.pending.sort();

    let params = self.parameters.snapshot();
    let voicing = Voicing::new(&self.config, self.sample_rate, &params);
    let default_bank = BankId::from_param(params.get(Param::Material));
    let dynamics = params.get(Param::Dynamics);
    self.gain.set_target(params.get(Param::Gain));

    let max_block_size = self.config.max_block_size;
    let mut offset = 0;
    while offset < frame_count {
      let block_size = max_block_size.min(frame_count - offset);
      self.render_block(offset, block_size, &voicing, default_bank);
      self.dynamics.update(self.voices.energy(), dynamics);
      self.write_output(
        &mut output[offset * channels..(offset + block_size) * channels],
        channels,
      );
      offset += block_size;
    }

    self.position += frame_count as Timestamp;
    self.voices.reclaim();
    self.diagnostics.set_active_voices(self.voices.active_count());
    self.diagnostics.add_rendered_frames(frame_count);
  }

  /// Renders one block into the mix buffers, splitting it at event timestamps.
  fn render_block(
    &mut self,
    offset: usize,
    block_size: usize,
    voicing: &Voicing,
    default_bank: BankId,
  ) {
    let block_start = self.position + offset as Timestamp;
    let block_end = block_start + block_size as Timestamp;

    self.left[..block_size].fill(0.0);
    self.right[..block_size].fill(0.0);

    let mut start = block_start;
    while start < block_end {
      while let Some(event) = self.pending.pop_before(start + 1) {
        self.handle_event(event, voicing, default_bank);
      }
      let end = match self.pending.next_timestamp() {
        Some(timestamp) if timestamp < block_end => timestamp,
        _ => block_end,
      };

      let from = (start - block_start) as usize;
      let to = (end - block_start) as usize;
      let unstable = self
        .voices
        .render(&mut self.left[from..to], &mut self.right[from..to]);
      self.diagnostics.numeric_instability(unstable as u64);
      start = end;
    }
  }

  fn write_output(&mut self, output: &mut [f32], channels: usize) {
    let clamp = self.config.clamp_output;
    let frames = output.chunks_exact_mut(channels);
    for (frame, (left, right)) in frames.zip(self.left.iter().zip(self.right.iter())) {
      let gain = self.gain.next_value() * self.dynamics.next_gain();
      let mut left = *left * gain;
      let mut right = *right * gain;
      if clamp {
        left = left.clamp(-1.0, 1.0);
        right = right.clamp(-1.0, 1.0);
      }
      match frame {
        [mono] => *mono = 0.5 * (left + right),
        [l, r, rest @ ..] => {
          *l = left;
          *r = right;
          rest.fill(0.0);
        }
        [] => {}
      }
    }
  }

  fn handle_event(&mut self, event: Event, voicing: &Voicing, default_bank: BankId) {
    match event {
      Event::Excitation(excitation) => {
        let bank_id = excitation.bank.unwrap_or(default_bank);
        match self.banks.get(bank_id) {
          Some(bank) => {
            let result = self.voices.trigger(&excitation, bank_id, bank, voicing);
            self.count_allocation(result);
          }
          None => self.diagnostics.unknown_bank(),
        }
      }
      Event::Note(note) => match note.kind {
        NoteKind::NoteOn => {
          let bank_id = note.bank.unwrap_or(default_bank);
          match self.banks.get(bank_id) {
            Some(bank) => {
              let result = self.voices.note_on(&note, bank_id, bank, voicing);
              self.count_allocation(result);
            }
            None => self.diagnostics.unknown_bank(),
          }
        }
        NoteKind::NoteOff => {
          if self.voices.note_off(note.note_id).is_err() {
            self.diagnostics.unmatched_note_off();
          }
        }
      },
      Event::Stop { target, .. } => {
        self.voices.stop(target);
      }
      Event::SustainPedal { down, .. } => self.voices.set_sustain(down),
      Event::SostenutoPedal { down, .. } => self.voices.set_sostenuto(down),
    }
  }

  fn count_allocation(&self, result: Result<Allocation, AllocError>) {
    match result {
      Ok(Allocation::Stolen(_)) => self.diagnostics.voice_stolen(),
      Ok(_) => {}
      Err(AllocError::PolyphonyExceeded) => self.diagnostics.polyphony_exceeded(),
      Err(AllocError::UnmatchedNoteOff(_)) => self.diagnostics.unmatched_note_off(),
    }
  }

  fn update_sample_rate(&mut self, sample_rate: f32) {
    if sample_rate.is_finite() && sample_rate > 0.0 && sample_rate != self.sample_rate {
      self.sample_rate = sample_rate;
      self.voices.reset();
      self.gain = Self::gain_smoother(self.gain.target(), sample_rate);
      self.dynamics = DynamicsLimiter::new(self.config.dynamics_threshold, sample_rate);
    }
  }

  /// Every message retires at most one bank, so messages wait in the queue while the
  /// retired list is full. Banks are never dropped here.
  fn process_messages(&mut self) {
    self.flush_retired();
    while !self.retired.is_full() {
      let message = match self.rx.pop() {
        Some(message) => message,
        None => break,
      };
      match message {
        Message::Event(event) => {
          if self.pending.push(event).is_err() {
            self.diagnostics.queue_overflow();
          }
        }
        Message::LoadBank(id, bank) => match self.banks.insert(id, bank) {
          Ok(Some(previous)) => self.retire(previous),
          Ok(None) => {}
          Err(rejected) => self.retire(rejected),
        },
        Message::UnloadBank(id) => {
          if let Some(bank) = self.banks.remove(id) {
            self.retire(bank);
          }
        }
        Message::Reset => {
          self.voices.reset();
          self.pending.clear();
        }
        Message::ReleaseBank(bank) => self.retire(bank),
      }
    }
  }

  /// Sends a bank back to the controller so its memory is freed off the audio thread.
  /// Keeps it until there is room when the controller is behind.
  fn retire(&mut self, bank: Arc<ModeBank>) {
    if let Err(Message::ReleaseBank(bank)) = self.tx.push(Message::ReleaseBank(bank)) {
      if let Err(bank) = self.retired.push(bank) {
        // process_messages leaves room, a leak beats freeing on this thread
        std::mem::forget(bank);
      }
    }
  }

  fn flush_retired(&mut self) {
    while let Some(bank) = self.retired.last() {
      // a clone that cannot be sent only drops a reference, the list keeps the bank
      if self.tx.push(Message::ReleaseBank(bank.clone())).is_err() {
        break;
      }
      self.retired.pop();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::{ExcitationEvent, NoteEvent, NoteId, Pitch};
  use crate::Engine;
  use resona_dsp::Mode;

  fn sine_bank() -> ModeBank {
    ModeBank::new(&[Mode::new(1000.0, 1.0, 1.0)]).unwrap()
  }

  #[test]
  fn events_start_at_their_frame() {
    let (mut controller, mut renderer) = Engine::new().unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller
      .push_event(ExcitationEvent::new(0.5).at(100))
      .unwrap();

    let mut output = vec![0.0; 256 * 2];
    renderer.render(&mut output, 256, 48000.0);

    // a struck mode starts at a zero crossing, so the first non zero frame follows the event
    let first = output.iter().position(|s| *s != 0.0).unwrap();
    assert_eq!(first / 2, 101);
    assert_eq!(renderer.active_voices(), 1);
  }

  #[test]
  fn events_split_across_blocks() {
    let config = EngineConfig {
      max_block_size: 32,
      channels: 1,
      ..EngineConfig::default()
    };
    let (mut controller, mut renderer) = Engine::with_config(config).unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller
      .push_event(ExcitationEvent::new(0.5).at(70))
      .unwrap();

    let mut output = vec![0.0; 100];
    renderer.render(&mut output, 100, 48000.0);
    assert_eq!(output.iter().position(|s| *s != 0.0), Some(71));
  }

  #[test]
  fn unknown_bank_is_counted() {
    let (mut controller, mut renderer) = Engine::new().unwrap().split();
    controller
      .push_event(ExcitationEvent::new(1.0).with_bank(BankId(4)))
      .unwrap();
    let mut output = vec![0.0; 128];
    renderer.render(&mut output, 64, 48000.0);
    assert_eq!(controller.diagnostics().unknown_bank, 1);
    assert!(output.iter().all(|s| *s == 0.0));
  }

  #[test]
  fn replaced_banks_go_back_to_the_controller() {
    let (mut controller, mut renderer) = Engine::new().unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller.unload_bank(BankId(0)).unwrap();

    let mut output = vec![0.0; 128];
    renderer.render(&mut output, 64, 48000.0);
    assert_eq!(controller.collect_garbage(), 2);
  }

  #[test]
  fn gain_and_clamp() {
    let (mut controller, mut renderer) = Engine::new().unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller.set_parameter(Param::Gain, 2.0).unwrap();
    controller.push_event(ExcitationEvent::new(4.0)).unwrap();

    let mut output = vec![0.0; 4800 * 2];
    renderer.render(&mut output, 4800, 48000.0);
    let peak = output.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    assert_eq!(peak, 1.0);
  }

  #[test]
  fn sample_rate_change_resets_voices() {
    let (mut controller, mut renderer) = Engine::new().unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    let note = NoteEvent::note_on(NoteId(1), Pitch::Semitone(60.0), 1.0);
    controller.push_event(note).unwrap();

    let mut output = vec![0.0; 128];
    renderer.render(&mut output, 64, 48000.0);
    assert_eq!(renderer.active_voices(), 1);
    renderer.render(&mut output, 64, 44100.0);
    assert_eq!(renderer.active_voices(), 0);
    assert_eq!(renderer.sample_rate(), 44100.0);
  }

  fn loud_peak(dynamics: f32) -> f32 {
    let config = EngineConfig {
      clamp_output: false,
      ..EngineConfig::default()
    };
    let (mut controller, mut renderer) = Engine::with_config(config).unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller.set_parameter(Param::Dynamics, dynamics).unwrap();
    for _ in 0..4 {
      controller.push_event(ExcitationEvent::new(1.0)).unwrap();
    }

    let mut output = vec![0.0; 4800 * 2];
    renderer.render(&mut output, 4800, 48000.0);
    output[2400 * 2..]
      .iter()
      .fold(0.0f32, |acc, s| acc.max(s.abs()))
  }

  #[test]
  fn dynamics_limit_many_loud_voices() {
    let free = loud_peak(0.0);
    let limited = loud_peak(1.0);
    assert!(free > 3.5, "{}", free);
    assert!(limited < 1.1, "{}", limited);
    assert!(limited > 0.9, "{}", limited);
  }

  #[test]
  fn retired_banks_wait_for_the_controller() {
    let config = EngineConfig {
      event_queue_capacity: 4,
      ..EngineConfig::default()
    };
    let (mut controller, mut renderer) = Engine::with_config(config).unwrap().split();
    controller.load_bank(BankId(0), sine_bank()).unwrap();
    controller.load_bank(BankId(0), sine_bank()).unwrap();

    // the controller has not collected for a long time
    let mut queued = 0;
    while renderer
      .tx
      .push(Message::ReleaseBank(Arc::new(sine_bank())))
      .is_ok()
    {
      queued += 1;
    }
    while renderer.retired.push(Arc::new(sine_bank())).is_ok() {}

    let mut output = vec![0.0; 128];
    renderer.render(&mut output, 64, 48000.0);
    assert_eq!(renderer.rx.len(), 2);
    assert!(renderer.retired.is_full());

    assert_eq!(controller.collect_garbage(), queued);
    renderer.render(&mut output, 64, 48000.0);
    assert!(renderer.rx.is_empty());
    assert_eq!(renderer.retired.len(), RETIRED_CAPACITY - queued + 1);
    assert!(renderer.banks.get(BankId(0)).is_some());
  }
}
