use anyhow::Result;
use assert_approx_eq::assert_approx_eq;

use resona_engine::dsp::{presets, Jitter, Mode, ModeBank};
use resona_engine::{BankId, EngineConfig, ExcitationEvent, Param, SynthGraphNode};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 512;

/// Renders `num_frames` stereo frames block by block, like an audio callback would,
/// and returns the left channel and the right channel.
fn render(node: &mut SynthGraphNode, num_frames: usize) -> (Vec<f32>, Vec<f32>) {
  let mut left = Vec::with_capacity(num_frames);
  let mut right = Vec::with_capacity(num_frames);
  let mut buffer = vec![0.0; BLOCK_SIZE * 2];
  let mut remaining = num_frames;
  while remaining > 0 {
    let frames = remaining.min(BLOCK_SIZE);
    node.render(&mut buffer, frames, SAMPLE_RATE);
    for frame in buffer[..frames * 2].chunks_exact(2) {
      left.push(frame[0]);
      right.push(frame[1]);
    }
    remaining -= frames;
  }
  (left, right)
}

fn rms(samples: &[f32]) -> f32 {
  let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
  (sum / samples.len() as f64).sqrt() as f32
}

fn energy(samples: &[f32]) -> f64 {
  samples.iter().map(|s| (*s as f64) * (*s as f64)).sum()
}

#[test]
fn single_mode_follows_the_decay_law() -> Result<()> {
  let mut node = SynthGraphNode::new(EngineConfig::default())?;
  node.load_bank(BankId(0), ModeBank::new(&[Mode::new(220.0, 2.0, 1.0)])?)?;
  node.push_event(ExcitationEvent::new(1.0))?;

  let (left, right) = render(&mut node, 50400);
  assert_eq!(left, right);

  // 220 Hz repeats exactly every second at 48 kHz, so both windows see the same phases
  let window = 2400;
  let initial = rms(&left[..window]);
  let later = rms(&left[48000..48000 + window]);
  assert_approx_eq!(later / initial, (-2.0f32).exp(), 2e-3);
  assert_approx_eq!(initial, (0.5f32).sqrt() * (-2.0f32 * 0.025).exp(), 0.01);

  let cycles = left[..48000]
    .windows(2)
    .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
    .count();
  assert!((219..=221).contains(&cycles), "cycles: {}", cycles);
  Ok(())
}

#[test]
fn envelope_matches_strength_times_amplitude() -> Result<()> {
  let mut node = SynthGraphNode::new(EngineConfig::default())?;
  node.load_bank(BankId(0), ModeBank::new(&[Mode::new(1000.0, 3.0, 0.5)])?)?;
  node.push_event(ExcitationEvent::new(0.8))?;

  let (left, _) = render(&mut node, 48000);
  for second in [0.0f32, 0.25, 0.5] {
    let start = (second * SAMPLE_RATE) as usize;
    let peak = left[start..start + 48]
      .iter()
      .fold(0.0f32, |acc, s| acc.max(s.abs()));
    assert_approx_eq!(peak, 0.8 * 0.5 * (-3.0 * second).exp(), 2e-3);
  }
  Ok(())
}

#[test]
fn impacts_stay_finite_and_lose_energy() -> Result<()> {
  let mut node = SynthGraphNode::new(EngineConfig::default())?;
  node.load_bank(BankId(0), presets::bell(440.0)?)?;
  // quiet enough that the output clamp never kicks in
  node.push_event(ExcitationEvent::new(0.15))?;
  node.push_event(ExcitationEvent::new(0.1).at(1000).with_tone(0.3))?;

  let (left, right) = render(&mut node, 96000);
  assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));

  let window = 12000;
  let energies: Vec<f64> = left[2000..]
    .chunks_exact(window)
    .zip(right[2000..].chunks_exact(window))
    .map(|(l, r)| energy(l) + energy(r))
    .collect();
  for pair in energies.windows(2) {
    assert!(pair[1] <= pair[0] * 1.001, "energy grew: {:?}", energies);
  }
  Ok(())
}

#[test]
fn every_preset_renders_finite_audio() -> Result<()> {
  for name in presets::NAMES {
    let mut node = SynthGraphNode::new(EngineConfig::default())?;
    let bank = presets::by_name(name, 330.0).unwrap()?;
    node.load_bank(BankId(0), bank)?;
    node.set_parameter(Param::Jitter, 1.0)?;
    for index in 0..8 {
      node.push_event(ExcitationEvent::new(2.0).at(index * 300))?;
    }
    let (left, right) = render(&mut node, 9600);
    assert!(
      left.iter().chain(right.iter()).all(|s| s.is_finite() && s.abs() <= 1.0),
      "preset {}",
      name
    );
  }
  Ok(())
}

#[test]
fn render_zero_frames_is_a_no_op() -> Result<()> {
  let mut node = SynthGraphNode::new(EngineConfig::default())?;
  node.load_bank(BankId(0), presets::marimba(220.0)?)?;
  node.push_event(ExcitationEvent::new(1.0))?;

  let mut buffer = vec![0.25; 64];
  node.render(&mut buffer, 0, SAMPLE_RATE);
  assert!(buffer.iter().all(|s| *s == 0.25));
  assert_eq!(node.now(), 0);
  assert_eq!(node.active_voices(), 0);

  node.render(&mut buffer, 32, SAMPLE_RATE);
  assert_eq!(node.now(), 32);
  assert_eq!(node.active_voices(), 1);
  Ok(())
}

#[test]
fn jitter_does_not_touch_the_loaded_bank() -> Result<()> {
  let bank = presets::chime(500.0)?;
  let mut node = SynthGraphNode::new(EngineConfig::default())?;
  node.load_bank(BankId(2), bank.clone())?;
  node.set_parameter(Param::Jitter, 1.0)?;
  node.set_parameter(Param::Material, 2.0)?;
  node.push_event(ExcitationEvent::new(1.0))?;
  node.push_event(ExcitationEvent::new(1.0).at(10))?;
  render(&mut node, 1024);

  assert_eq!(node.controller().bank(BankId(2)), Some(&bank));
  assert!(!Jitter::uniform(1.0).is_none());
  Ok(())
}

#[test]
fn same_seed_renders_the_same_audio() -> Result<()> {
  let run = || -> Result<Vec<f32>> {
    let mut node = SynthGraphNode::new(EngineConfig::default())?;
    node.load_bank(BankId(0), presets::glass(600.0)?)?;
    node.set_parameter(Param::Jitter, 0.5)?;
    node.push_event(ExcitationEvent::new(1.0))?;
    node.push_event(ExcitationEvent::new(0.7).at(700))?;
    Ok(render(&mut node, 4096).0)
  };
  assert_eq!(run()?, run()?);
  Ok(())
}
