use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use resona_engine::dsp::{presets, AssetError, Mode, ModeBank};
use resona_engine::events::Timestamp;
use resona_engine::{BankId, Event, ExcitationEvent, NoteEvent, NoteId, Param, Pitch, StopTarget};

/// Seconds rendered after the last event when the scene does not give a duration.
const TAIL: f32 = 3.0;

#[derive(Debug, Error)]
pub enum SceneError {
  #[error("Unknown preset '{0}', expected one of {1:?}")]
  UnknownPreset(String, &'static [&'static str]),

  #[error("Unknown parameter '{0}'")]
  UnknownParameter(String),

  #[error("Invalid bank {0}: {1}")]
  InvalidBank(u32, AssetError),

  #[error("Event at {0} s: time must be finite and not negative")]
  InvalidTime(f32),

  #[error("Note {0} needs either 'pitch' or 'hz'")]
  MissingPitch(u32),

  #[error("Stop of a single note needs 'note'")]
  MissingNote,
}

pub type Result<T> = core::result::Result<T, SceneError>;

/// Banks, parameter values and a timeline of events, as read from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
  pub duration: Option<f32>,
  #[serde(default)]
  pub parameters: BTreeMap<String, f32>,
  pub banks: Vec<BankSpec>,
  #[serde(default)]
  pub events: Vec<EventSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankSpec {
  pub id: u32,
  #[serde(flatten)]
  pub source: BankSource,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BankSource {
  Preset {
    preset: String,
    fundamental: f32,
  },
  Modes {
    modes: Vec<ModeSpec>,
    reference_note: Option<f32>,
  },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModeSpec {
  pub frequency: f32,
  pub decay: f32,
  pub amplitude: f32,
  #[serde(default)]
  pub pan: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSpec {
  Note,
  AllNotes,
  All,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSpec {
  Strike {
    time: f32,
    strength: f32,
    bank: Option<u32>,
    tone: Option<f32>,
    #[serde(default)]
    priority: u8,
  },
  NoteOn {
    time: f32,
    note: u32,
    pitch: Option<f32>,
    hz: Option<f32>,
    velocity: f32,
    bank: Option<u32>,
    #[serde(default)]
    priority: u8,
  },
  NoteOff {
    time: f32,
    note: u32,
  },
  Sustain {
    time: f32,
    down: bool,
  },
  Sostenuto {
    time: f32,
    down: bool,
  },
  Stop {
    time: f32,
    target: StopSpec,
    note: Option<u32>,
  },
}

impl EventSpec {
  pub fn time(&self) -> f32 {
    match *self {
      EventSpec::Strike { time, .. }
      | EventSpec::NoteOn { time, .. }
      | EventSpec::NoteOff { time, .. }
      | EventSpec::Sustain { time, .. }
      | EventSpec::Sostenuto { time, .. }
      | EventSpec::Stop { time, .. } => time,
    }
  }

  fn to_event(self, sample_rate: f32) -> Result<Event> {
    let time = self.time();
    if !time.is_finite() || time < 0.0 {
      return Err(SceneError::InvalidTime(time));
    }
    let timestamp = (time * sample_rate).round() as Timestamp;

    let event = match self {
      EventSpec::Strike {
        strength,
        bank,
        tone,
        priority,
        ..
      } => {
        let mut event = ExcitationEvent::new(strength)
          .at(timestamp)
          .with_priority(priority);
        event.bank = bank.map(BankId);
        event.tone = tone;
        event.into()
      }
      EventSpec::NoteOn {
        note,
        pitch,
        hz,
        velocity,
        bank,
        priority,
        ..
      } => {
        let pitch = match (pitch, hz) {
          (Some(semitones), _) => Pitch::Semitone(semitones),
          (None, Some(frequency)) => Pitch::Hz(frequency),
          (None, None) => return Err(SceneError::MissingPitch(note)),
        };
        let mut event = NoteEvent::note_on(NoteId(note), pitch, velocity)
          .at(timestamp)
          .with_priority(priority);
        event.bank = bank.map(BankId);
        event.into()
      }
      EventSpec::NoteOff { note, .. } => NoteEvent::note_off(NoteId(note)).at(timestamp).into(),
      EventSpec::Sustain { down, .. } => Event::SustainPedal { timestamp, down },
      EventSpec::Sostenuto { down, .. } => Event::SostenutoPedal { timestamp, down },
      EventSpec::Stop { target, note, .. } => {
        let target = match target {
          StopSpec::Note => StopTarget::Note(NoteId(note.ok_or(SceneError::MissingNote)?)),
          StopSpec::AllNotes => StopTarget::AllNotes,
          StopSpec::All => StopTarget::All,
        };
        Event::Stop { timestamp, target }
      }
    };
    Ok(event)
  }
}

impl Scene {
  pub fn load(path: &Path) -> anyhow::Result<Scene> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
      .with_context(|| format!("Failed to parse {}", path.display()))
  }

  /// A few bells, a marimba phrase and a held chord on a custom bank.
  pub fn demo() -> Scene {
    let mut events = Vec::new();
    for (index, strength) in [1.0, 0.6, 0.8, 0.4].iter().enumerate() {
      events.push(EventSpec::Strike {
        time: index as f32 * 0.5,
        strength: *strength,
        bank: Some(0),
        tone: Some(0.4 + 0.15 * index as f32),
        priority: 0,
      });
    }
    for (index, note) in [60.0, 64.0, 67.0, 72.0, 67.0, 64.0].iter().enumerate() {
      let time = 2.0 + index as f32 * 0.25;
      events.push(EventSpec::NoteOn {
        time,
        note: index as u32,
        pitch: Some(*note),
        hz: None,
        velocity: 0.5,
        bank: Some(1),
        priority: 0,
      });
      events.push(EventSpec::NoteOff {
        time: time + 0.2,
        note: index as u32,
      });
    }
    events.push(EventSpec::Sustain {
      time: 3.6,
      down: true,
    });
    for (index, note) in [48.0f32, 55.0, 64.0].iter().enumerate() {
      let id = 100 + index as u32;
      events.push(EventSpec::NoteOn {
        time: 3.7,
        note: id,
        pitch: Some(*note),
        hz: None,
        velocity: 0.4,
        bank: Some(2),
        priority: 1,
      });
      events.push(EventSpec::NoteOff { time: 4.0, note: id });
    }
    events.push(EventSpec::Sustain {
      time: 5.5,
      down: false,
    });

    Scene {
      duration: None,
      parameters: BTreeMap::from([("release".to_string(), 0.8), ("jitter".to_string(), 0.3)]),
      banks: vec![
        BankSpec {
          id: 0,
          source: BankSource::Preset {
            preset: "bell".to_string(),
            fundamental: 523.25,
          },
        },
        BankSpec {
          id: 1,
          source: BankSource::Preset {
            preset: "marimba".to_string(),
            fundamental: 261.63,
          },
        },
        BankSpec {
          id: 2,
          source: BankSource::Modes {
            modes: vec![
              ModeSpec {
                frequency: 261.63,
                decay: 1.5,
                amplitude: 0.6,
                pan: -0.2,
              },
              ModeSpec {
                frequency: 523.25,
                decay: 2.5,
                amplitude: 0.3,
                pan: 0.2,
              },
              ModeSpec {
                frequency: 1046.5,
                decay: 4.0,
                amplitude: 0.1,
                pan: 0.0,
              },
            ],
            reference_note: Some(60.0),
          },
        },
      ],
      events,
    }
  }

  /// The explicit duration, or a few seconds past the last event.
  pub fn duration(&self) -> f32 {
    self.duration.unwrap_or_else(|| {
      self
        .events
        .iter()
        .map(|event| event.time())
        .fold(0.0, f32::max)
        + TAIL
    })
  }

  pub fn banks(&self) -> Result<Vec<(BankId, ModeBank)>> {
    self
      .banks
      .iter()
      .map(|spec| {
        let bank = match &spec.source {
          BankSource::Preset { preset, fundamental } => presets::by_name(preset, *fundamental)
            .ok_or_else(|| SceneError::UnknownPreset(preset.clone(), presets::NAMES))?,
          BankSource::Modes {
            modes,
            reference_note,
          } => {
            let modes: Vec<Mode> = modes
              .iter()
              .map(|mode| {
                Mode::new(mode.frequency, mode.decay, mode.amplitude).with_pan(mode.pan)
              })
              .collect();
            match reference_note {
              Some(note) => ModeBank::with_reference_note(&modes, *note),
              None => ModeBank::new(&modes),
            }
          }
        };
        bank
          .map(|bank| (BankId(spec.id), bank))
          .map_err(|cause| SceneError::InvalidBank(spec.id, cause))
      })
      .collect()
  }

  pub fn parameters(&self) -> Result<Vec<(Param, f32)>> {
    self
      .parameters
      .iter()
      .map(|(name, value)| {
        Param::from_name(name)
          .map(|param| (param, *value))
          .ok_or_else(|| SceneError::UnknownParameter(name.clone()))
      })
      .collect()
  }

  /// Events in timeline order, timestamped in frames.
  pub fn events(&self, sample_rate: f32) -> Result<Vec<Event>> {
    let mut events = self
      .events
      .iter()
      .map(|spec| spec.to_event(sample_rate))
      .collect::<Result<Vec<Event>>>()?;
    events.sort_by_key(|event| event.timestamp());
    Ok(events)
  }
}
