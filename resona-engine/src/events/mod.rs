pub mod buffer;

use derive_more::Display;

use crate::banks::BankId;
use crate::error::{Error, Result};

/// Absolute position in sample frames since the renderer started.
pub type Timestamp = u64;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(fmt = "note:{}", _0)]
pub struct NoteId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pitch {
  /// Note number in semitones, 69 = A4.
  Semitone(f32),
  Hz(f32),
}

impl Pitch {
  pub fn as_semitones(&self) -> f32 {
    match *self {
      Pitch::Semitone(note) => note,
      Pitch::Hz(frequency) => resona_dsp::pitch::hz_to_note(frequency),
    }
  }

  /// Frequencies must be positive, and both forms finite.
  pub fn is_valid(&self) -> bool {
    match *self {
      Pitch::Semitone(note) => note.is_finite(),
      Pitch::Hz(frequency) => frequency.is_finite() && frequency > 0.0,
    }
  }
}

/// A single strike on a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcitationEvent {
  pub strength: f32,
  pub timestamp: Timestamp,
  /// Tone colour in `[0, 1]`, 0 is dull and 1 is bright. Falls back to the `tone` parameter.
  pub tone: Option<f32>,
  /// Falls back to the `material` parameter.
  pub bank: Option<BankId>,
  pub priority: u8,
}

impl ExcitationEvent {
  pub fn new(strength: f32) -> Self {
    Self {
      strength,
      timestamp: 0,
      tone: None,
      bank: None,
      priority: 0,
    }
  }

  pub fn at(mut self, timestamp: Timestamp) -> Self {
    self.timestamp = timestamp;
    self
  }

  pub fn with_tone(mut self, tone: f32) -> Self {
    self.tone = Some(tone);
    self
  }

  pub fn with_bank(mut self, bank: BankId) -> Self {
    self.bank = Some(bank);
    self
  }

  pub fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
  NoteOn,
  NoteOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
  pub kind: NoteKind,
  pub note_id: NoteId,
  pub pitch: Pitch,
  pub velocity: f32,
  pub timestamp: Timestamp,
  pub bank: Option<BankId>,
  pub priority: u8,
}

impl NoteEvent {
  pub fn note_on(note_id: NoteId, pitch: Pitch, velocity: f32) -> Self {
    Self {
      kind: NoteKind::NoteOn,
      note_id,
      pitch,
      velocity,
      timestamp: 0,
      bank: None,
      priority: 0,
    }
  }

  pub fn note_off(note_id: NoteId) -> Self {
    Self {
      kind: NoteKind::NoteOff,
      note_id,
      pitch: Pitch::Semitone(0.0),
      velocity: 0.0,
      timestamp: 0,
      bank: None,
      priority: 0,
    }
  }

  pub fn at(mut self, timestamp: Timestamp) -> Self {
    self.timestamp = timestamp;
    self
  }

  pub fn with_bank(mut self, bank: BankId) -> Self {
    self.bank = Some(bank);
    self
  }

  pub fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTarget {
  /// Releases one note, even if it is held by the sustain pedal.
  Note(NoteId),
  /// Releases every instrument voice.
  AllNotes,
  /// Silences every voice immediately.
  All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
  Excitation(ExcitationEvent),
  Note(NoteEvent),
  Stop {
    timestamp: Timestamp,
    target: StopTarget,
  },
  SustainPedal {
    timestamp: Timestamp,
    down: bool,
  },
  /// Holds the notes that are down when pressed, until released.
  SostenutoPedal {
    timestamp: Timestamp,
    down: bool,
  },
}

impl Event {
  pub fn timestamp(&self) -> Timestamp {
    match self {
      Event::Excitation(event) => event.timestamp,
      Event::Note(event) => event.timestamp,
      Event::Stop { timestamp, .. } => *timestamp,
      Event::SustainPedal { timestamp, .. } => *timestamp,
      Event::SostenutoPedal { timestamp, .. } => *timestamp,
    }
  }

  /// Rejects values that would turn into non finite samples once rendered.
  pub fn validate(&self) -> Result<()> {
    let invalid = |reason: String| Err(Error::InvalidEvent(reason));
    match self {
      Event::Excitation(event) => {
        if !event.strength.is_finite() {
          return invalid(format!("strength {}", event.strength));
        }
        if let Some(tone) = event.tone.filter(|tone| !tone.is_finite()) {
          return invalid(format!("tone {}", tone));
        }
      }
      Event::Note(event) if event.kind == NoteKind::NoteOn => {
        if !event.pitch.is_valid() {
          return invalid(format!("pitch {:?} for {}", event.pitch, event.note_id));
        }
        if !event.velocity.is_finite() {
          return invalid(format!("velocity {} for {}", event.velocity, event.note_id));
        }
      }
      _ => {}
    }
    Ok(())
  }
}

impl From<ExcitationEvent> for Event {
  fn from(event: ExcitationEvent) -> Self {
    Event::Excitation(event)
  }
}

impl From<NoteEvent> for Event {
  fn from(event: NoteEvent) -> Self {
    Event::Note(event)
  }
}
