use std::sync::atomic::{AtomicU64, Ordering};

/// Counters written by the audio thread (and the controller for queue overflows and
/// rejected events) and read from anywhere.
#[derive(Debug, Default)]
pub struct Diagnostics {
  polyphony_exceeded: AtomicU64,
  queue_overflow: AtomicU64,
  invalid_events: AtomicU64,
  unmatched_note_off: AtomicU64,
  numeric_instability: AtomicU64,
  unknown_bank: AtomicU64,
  voices_stolen: AtomicU64,
  active_voices: AtomicU64,
  rendered_frames: AtomicU64,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn polyphony_exceeded(&self) {
    self.polyphony_exceeded.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn queue_overflow(&self) {
    self.queue_overflow.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn invalid_event(&self) {
    self.invalid_events.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn unmatched_note_off(&self) {
    self.unmatched_note_off.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn numeric_instability(&self, count: u64) {
    if count > 0 {
      self.numeric_instability.fetch_add(count, Ordering::Relaxed);
    }
  }

  pub(crate) fn unknown_bank(&self) {
    self.unknown_bank.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn voice_stolen(&self) {
    self.voices_stolen.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn set_active_voices(&self, count: usize) {
    self.active_voices.store(count as u64, Ordering::Relaxed);
  }

  pub(crate) fn add_rendered_frames(&self, frames: usize) {
    self.rendered_frames.fetch_add(frames as u64, Ordering::Release);
  }

  pub fn rendered_frames(&self) -> u64 {
    self.rendered_frames.load(Ordering::Acquire)
  }

  pub fn snapshot(&self) -> DiagnosticsSnapshot {
    DiagnosticsSnapshot {
      polyphony_exceeded: self.polyphony_exceeded.load(Ordering::Relaxed),
      queue_overflow: self.queue_overflow.load(Ordering::Relaxed),
      invalid_events: self.invalid_events.load(Ordering::Relaxed),
      unmatched_note_off: self.unmatched_note_off.load(Ordering::Relaxed),
      numeric_instability: self.numeric_instability.load(Ordering::Relaxed),
      unknown_bank: self.unknown_bank.load(Ordering::Relaxed),
      voices_stolen: self.voices_stolen.load(Ordering::Relaxed),
      active_voices: self.active_voices.load(Ordering::Relaxed),
      rendered_frames: self.rendered_frames.load(Ordering::Acquire),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
  pub polyphony_exceeded: u64,
  pub queue_overflow: u64,
  pub invalid_events: u64,
  pub unmatched_note_off: u64,
  pub numeric_instability: u64,
  pub unknown_bank: u64,
  pub voices_stolen: u64,
  pub active_voices: u64,
  pub rendered_frames: u64,
}

impl DiagnosticsSnapshot {
  /// Counter increments since `previous`. Gauges are taken as they are now.
  pub fn since(&self, previous: &DiagnosticsSnapshot) -> DiagnosticsSnapshot {
    DiagnosticsSnapshot {
      polyphony_exceeded: self.polyphony_exceeded.wrapping_sub(previous.polyphony_exceeded),
      queue_overflow: self.queue_overflow.wrapping_sub(previous.queue_overflow),
      invalid_events: self.invalid_events.wrapping_sub(previous.invalid_events),
      unmatched_note_off: self.unmatched_note_off.wrapping_sub(previous.unmatched_note_off),
      numeric_instability: self
        .numeric_instability
        .wrapping_sub(previous.numeric_instability),
      unknown_bank: self.unknown_bank.wrapping_sub(previous.unknown_bank),
      voices_stolen: self.voices_stolen.wrapping_sub(previous.voices_stolen),
      active_voices: self.active_voices,
      rendered_frames: self.rendered_frames.wrapping_sub(previous.rendered_frames),
    }
  }

  pub fn dropped_events(&self) -> u64 {
    self.polyphony_exceeded + self.queue_overflow + self.invalid_events + self.unknown_bank
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counters_and_deltas() {
    let diagnostics = Diagnostics::new();
    diagnostics.polyphony_exceeded();
    diagnostics.queue_overflow();
    diagnostics.numeric_instability(0);
    diagnostics.set_active_voices(3);
    let first = diagnostics.snapshot();
    assert_eq!(first.polyphony_exceeded, 1);
    assert_eq!(first.numeric_instability, 0);
    assert_eq!(first.dropped_events(), 2);

    diagnostics.polyphony_exceeded();
    diagnostics.invalid_event();
    diagnostics.unmatched_note_off();
    diagnostics.add_rendered_frames(128);
    diagnostics.set_active_voices(1);
    let delta = diagnostics.snapshot().since(&first);
    assert_eq!(
      delta,
      DiagnosticsSnapshot {
        polyphony_exceeded: 1,
        invalid_events: 1,
        unmatched_note_off: 1,
        active_voices: 1,
        rendered_frames: 128,
        ..DiagnosticsSnapshot::default()
      }
    );
  }
}
