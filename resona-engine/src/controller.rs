use std::collections::HashMap;
use std::sync::Arc;

use ringbuf::{Consumer, Producer};

use resona_dsp::ModeBank;

use crate::banks::BankId;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::error::{Error, Result};
use crate::events::{Event, StopTarget, Timestamp};
use crate::messages::Message;
use crate::params::{Param, Parameters};
use crate::EngineConfig;

/// Control thread side of an engine. Nothing here is real time safe, and nothing
/// here blocks the renderer.
pub struct Controller {
  tx: Producer<Message>,
  rx: Consumer<Message>,

  config: EngineConfig,
  parameters: Arc<Parameters>,
  diagnostics: Arc<Diagnostics>,

  banks: HashMap<BankId, Arc<ModeBank>>,
  reported: DiagnosticsSnapshot,
}

impl Controller {
  pub(crate) fn new(
    tx: Producer<Message>,
    rx: Consumer<Message>,
    config: EngineConfig,
    parameters: Arc<Parameters>,
    diagnostics: Arc<Diagnostics>,
  ) -> Self {
    Self {
      tx,
      rx,
      config,
      parameters,
      diagnostics,
      banks: HashMap::new(),
      reported: DiagnosticsSnapshot::default(),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Validates `bank` against the configured sample rate and hands it to the renderer,
  /// replacing any bank loaded under the same id. Invalid banks are never activated.
  pub fn load_bank(&mut self, id: BankId, bank: ModeBank) -> Result<()> {
    if let Err(cause) = bank.validate_for(self.config.sample_rate) {
      log::warn!("Refusing to load bank {}: {}", id, cause);
      return Err(Error::InvalidAsset(cause));
    }
    if !self.banks.contains_key(&id) && self.banks.len() >= self.config.max_banks {
      return Err(Error::TooManyBanks(self.config.max_banks));
    }

    let bank = Arc::new(bank);
    self.send(Message::LoadBank(id, bank.clone()))?;
    log::info!("Loaded bank {} with {} modes", id, bank.len());
    self.banks.insert(id, bank);
    Ok(())
  }

  pub fn unload_bank(&mut self, id: BankId) -> Result<()> {
    if !self.banks.contains_key(&id) {
      return Err(Error::BankNotLoaded(id));
    }
    self.send(Message::UnloadBank(id))?;
    self.banks.remove(&id);
    log::info!("Unloaded bank {}", id);
    Ok(())
  }

  pub fn bank(&self, id: BankId) -> Option<&ModeBank> {
    self.banks.get(&id).map(|bank| bank.as_ref())
  }

  /// Enqueues an event for the renderer. Events with values that cannot be rendered
  /// are rejected, and a full queue drops the event. Both are counted.
  pub fn push_event<E: Into<Event>>(&mut self, event: E) -> Result<()> {
    let event = event.into();
    if let Err(cause) = event.validate() {
      self.diagnostics.invalid_event();
      log::warn!("Rejecting event: {}", cause);
      return Err(cause);
    }
    self.tx.push(Message::Event(event)).map_err(|_| {
      self.diagnostics.queue_overflow();
      log::warn!("Event queue full, dropping {:?}", event);
      Error::QueueOverflow
    })
  }

  pub fn stop(&mut self, target: StopTarget) -> Result<()> {
    let timestamp = self.now();
    self.push_event(Event::Stop { timestamp, target })
  }

  pub fn sustain_pedal(&mut self, down: bool) -> Result<()> {
    let timestamp = self.now();
    self.push_event(Event::SustainPedal { timestamp, down })
  }

  pub fn sostenuto_pedal(&mut self, down: bool) -> Result<()> {
    let timestamp = self.now();
    self.push_event(Event::SostenutoPedal { timestamp, down })
  }

  /// Silences every voice and drops pending events.
  pub fn reset(&mut self) -> Result<()> {
    self.send(Message::Reset)
  }

  /// Stores the clamped value, which is returned. Non finite values are rejected.
  pub fn set_parameter(&mut self, param: Param, value: f32) -> Result<f32> {
    let descriptor = param.descriptor();
    let clamped = descriptor.validate(value)?;
    if clamped != value {
      log::debug!(
        "Parameter '{}' clamped from {} to {}",
        descriptor.name,
        value,
        clamped
      );
    }
    self.parameters.set(param, clamped);
    Ok(clamped)
  }

  pub fn parameter(&self, param: Param) -> f32 {
    self.parameters.get(param)
  }

  pub fn diagnostics(&self) -> DiagnosticsSnapshot {
    self.diagnostics.snapshot()
  }

  /// Logs what went wrong on the audio thread since the last report and returns it.
  pub fn report_diagnostics(&mut self) -> DiagnosticsSnapshot {
    let current = self.diagnostics.snapshot();
    let delta = current.since(&self.reported);
    self.reported = current;

    if delta.polyphony_exceeded > 0 {
      log::warn!("{} events dropped by the polyphony ceiling", delta.polyphony_exceeded);
    }
    if delta.queue_overflow > 0 {
      log::warn!("{} events dropped by full queues", delta.queue_overflow);
    }
    if delta.invalid_events > 0 {
      log::warn!("{} events rejected for invalid values", delta.invalid_events);
    }
    if delta.unknown_bank > 0 {
      log::warn!("{} events referenced banks that are not loaded", delta.unknown_bank);
    }
    if delta.unmatched_note_off > 0 {
      log::debug!("{} unmatched note offs ignored", delta.unmatched_note_off);
    }
    if delta.numeric_instability > 0 {
      log::warn!("{} voices stopped on non finite output", delta.numeric_instability);
    }
    if delta.voices_stolen > 0 {
      log::debug!("{} voices stolen", delta.voices_stolen);
    }
    delta
  }

  /// Drops banks the renderer has handed back. Returns how many were received.
  pub fn collect_garbage(&mut self) -> usize {
    let mut count = 0;
    while let Some(message) = self.rx.pop() {
      if let Message::ReleaseBank(bank) = message {
        drop(bank);
        count += 1;
      }
    }
    count
  }

  /// Timestamp of the next frame the renderer will produce.
  pub fn now(&self) -> Timestamp {
    self.diagnostics.rendered_frames()
  }

  fn send(&mut self, message: Message) -> Result<()> {
    self.collect_garbage();
    self.tx.push(message).map_err(|_| {
      self.diagnostics.queue_overflow();
      Error::QueueOverflow
    })
  }
}
