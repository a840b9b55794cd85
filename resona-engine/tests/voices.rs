use anyhow::Result;

use resona_engine::dsp::{presets, AssetError, Mode, ModeBank};
use resona_engine::{
  BankId, Engine, EngineConfig, Error, ExcitationEvent, NoteEvent, NoteId, Pitch, StealPolicy,
  StopTarget, SynthGraphNode,
};

const SAMPLE_RATE: f32 = 48000.0;

fn render(node: &mut SynthGraphNode, num_frames: usize) -> Vec<f32> {
  let mut buffer = vec![0.0; num_frames * 2];
  node.render(&mut buffer, num_frames, SAMPLE_RATE);
  buffer
}

fn node(config: EngineConfig) -> Result<SynthGraphNode> {
  let mut node = SynthGraphNode::new(config)?;
  node.load_bank(BankId(0), presets::bell(440.0)?)?;
  Ok(node)
}

#[test]
fn polyphony_ceiling_is_never_exceeded() -> Result<()> {
  let mut node = node(EngineConfig::default().with_max_polyphony(8))?;

  for burst in 0..5u64 {
    for index in 0..20u64 {
      let timestamp = node.now() + index * 3;
      node.push_event(ExcitationEvent::new(0.1).at(timestamp))?;
    }
    for _ in 0..4 {
      render(&mut node, 32);
      assert!(node.active_voices() <= 8, "burst {}", burst);
    }
  }

  let diagnostics = node.diagnostics();
  assert!(diagnostics.polyphony_exceeded >= 100 - 8);
  assert_eq!(diagnostics.active_voices, 8);
  Ok(())
}

#[test]
fn ceiling_of_one_drops_the_second_trigger() -> Result<()> {
  let mut node = node(EngineConfig::default().with_max_polyphony(1))?;
  node.push_event(ExcitationEvent::new(0.5))?;
  node.push_event(ExcitationEvent::new(0.5))?;
  render(&mut node, 64);

  assert_eq!(node.active_voices(), 1);
  assert_eq!(node.diagnostics().polyphony_exceeded, 1);
  Ok(())
}

#[test]
fn ceiling_of_one_steals_when_allowed() -> Result<()> {
  let config = EngineConfig::default()
    .with_max_polyphony(1)
    .with_steal_policy(StealPolicy::Any);
  let mut node = node(config)?;
  node.push_event(ExcitationEvent::new(0.5))?;
  node.push_event(ExcitationEvent::new(0.5))?;
  render(&mut node, 64);

  let diagnostics = node.diagnostics();
  assert_eq!(node.active_voices(), 1);
  assert_eq!(diagnostics.polyphony_exceeded, 0);
  assert_eq!(diagnostics.voices_stolen, 1);
  Ok(())
}

#[test]
fn note_on_then_note_off() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  let note = NoteId(60);
  node.push_event(NoteEvent::note_on(note, Pitch::Semitone(69.0), 0.8))?;
  node.push_event(NoteEvent::note_off(note).at(128))?;
  let first = render(&mut node, 256);
  assert!(first.iter().any(|s| *s != 0.0));
  assert_eq!(node.active_voices(), 1);

  // a second note off for the same note changes nothing
  node.push_event(NoteEvent::note_off(note))?;
  render(&mut node, 256);
  assert_eq!(node.diagnostics().unmatched_note_off, 1);

  // default release is 0.3 s
  for _ in 0..80 {
    render(&mut node, 256);
  }
  assert_eq!(node.active_voices(), 0);
  let tail = render(&mut node, 256);
  assert!(tail.iter().all(|s| *s == 0.0));
  Ok(())
}

#[test]
fn immediate_note_off_ends_the_note() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  node.push_event(NoteEvent::note_on(NoteId(1), Pitch::Semitone(60.0), 1.0))?;
  node.push_event(NoteEvent::note_off(NoteId(1)))?;
  render(&mut node, 64);

  let diagnostics = node.diagnostics();
  assert_eq!(node.active_voices(), 0);
  assert_eq!(diagnostics.unmatched_note_off, 0);
  Ok(())
}

#[test]
fn unmatched_note_off_is_counted() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  node.push_event(NoteEvent::note_off(NoteId(5)))?;
  let output = render(&mut node, 64);
  assert!(output.iter().all(|s| *s == 0.0));
  assert_eq!(node.diagnostics().unmatched_note_off, 1);
  Ok(())
}

#[test]
fn sustain_pedal_and_stop() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  node.controller().sustain_pedal(true)?;
  node.push_event(NoteEvent::note_on(NoteId(1), Pitch::Hz(220.0), 1.0))?;
  node.push_event(NoteEvent::note_on(NoteId(2), Pitch::Hz(330.0), 1.0))?;
  node.push_event(NoteEvent::note_off(NoteId(1)))?;
  render(&mut node, 256);

  for _ in 0..100 {
    render(&mut node, 256);
  }
  assert_eq!(node.active_voices(), 2);

  node.controller().stop(StopTarget::All)?;
  render(&mut node, 16);
  assert_eq!(node.active_voices(), 0);
  Ok(())
}

#[test]
fn invalid_banks_are_refused() -> Result<()> {
  let mut node = SynthGraphNode::new(EngineConfig::default())?;

  let result = node.load_bank(BankId(1), ModeBank::new(&[Mode::new(30000.0, 1.0, 1.0)])?);
  assert!(
    matches!(result, Err(Error::InvalidAsset(AssetError::AboveNyquist { .. }))),
    "Unexpected result: {:?}",
    result
  );

  let result = ModeBank::new(&[Mode::new(440.0, -1.0, 1.0)]);
  assert!(
    matches!(result, Err(AssetError::InvalidDecay { .. })),
    "Unexpected result: {:?}",
    result
  );

  // the refused bank is not there to be played
  node.push_event(ExcitationEvent::new(1.0).with_bank(BankId(1)))?;
  let output = render(&mut node, 64);
  assert!(output.iter().all(|s| *s == 0.0));
  assert_eq!(node.diagnostics().unknown_bank, 1);
  Ok(())
}

#[test]
fn full_queue_drops_events() -> Result<()> {
  let config = EngineConfig {
    event_queue_capacity: 4,
    ..EngineConfig::default()
  };
  let (mut controller, mut renderer) = Engine::with_config(config)?.split();
  controller.load_bank(BankId(0), presets::wood(300.0)?)?;

  let results: Vec<_> = (0..6)
    .map(|_| controller.push_event(ExcitationEvent::new(0.2)))
    .collect();
  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
  for result in &results[3..] {
    assert!(
      matches!(result, Err(Error::QueueOverflow)),
      "Unexpected result: {:?}",
      result
    );
  }
  assert_eq!(controller.diagnostics().queue_overflow, 3);

  let mut output = vec![0.0; 128];
  renderer.render(&mut output, 64, SAMPLE_RATE);
  assert_eq!(controller.diagnostics().active_voices, 3);
  assert!(controller.push_event(ExcitationEvent::new(0.2)).is_ok());
  Ok(())
}

#[test]
fn sostenuto_pedal_keeps_only_the_caught_note() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  node.push_event(NoteEvent::note_on(NoteId(1), Pitch::Semitone(60.0), 1.0))?;
  node.controller().sostenuto_pedal(true)?;
  node.push_event(NoteEvent::note_on(NoteId(2), Pitch::Semitone(64.0), 1.0))?;
  node.push_event(NoteEvent::note_off(NoteId(1)).at(64))?;
  node.push_event(NoteEvent::note_off(NoteId(2)).at(64))?;

  // default release is 0.3 s
  for _ in 0..100 {
    render(&mut node, 256);
  }
  assert_eq!(node.active_voices(), 1);

  node.controller().sostenuto_pedal(false)?;
  for _ in 0..100 {
    render(&mut node, 256);
  }
  assert_eq!(node.active_voices(), 0);
  assert_eq!(node.diagnostics().unmatched_note_off, 0);
  Ok(())
}

#[test]
fn unplayable_pitches_are_rejected() -> Result<()> {
  let mut node = node(EngineConfig::default())?;
  for pitch in [Pitch::Hz(0.0), Pitch::Hz(-110.0), Pitch::Semitone(f32::NAN)] {
    let result = node.push_event(NoteEvent::note_on(NoteId(1), pitch, 1.0));
    assert!(
      matches!(result, Err(Error::InvalidEvent(_))),
      "Unexpected result: {:?}",
      result
    );
  }
  let result = node.push_event(ExcitationEvent::new(f32::NAN));
  assert!(
    matches!(result, Err(Error::InvalidEvent(_))),
    "Unexpected result: {:?}",
    result
  );

  let output = render(&mut node, 256);
  assert!(output.iter().all(|s| *s == 0.0));
  let diagnostics = node.diagnostics();
  assert_eq!(diagnostics.invalid_events, 4);
  assert_eq!(diagnostics.numeric_instability, 0);
  assert_eq!(diagnostics.dropped_events(), 4);
  assert_eq!(node.active_voices(), 0);
  Ok(())
}
