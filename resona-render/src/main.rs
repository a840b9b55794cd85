mod scene;

use std::io::{Seek, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use hound::{SampleFormat, WavSpec, WavWriter};

use resona_engine::{Event, EngineConfig, RetriggerPolicy, StealPolicy, SynthGraphNode, TieBreak};

use crate::scene::Scene;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Steal {
  Never,
  ReleasedOnly,
  Any,
}

impl From<Steal> for StealPolicy {
  fn from(steal: Steal) -> Self {
    match steal {
      Steal::Never => StealPolicy::Never,
      Steal::ReleasedOnly => StealPolicy::ReleasedOnly,
      Steal::Any => StealPolicy::Any,
    }
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tie {
  Oldest,
  Quietest,
}

impl From<Tie> for TieBreak {
  fn from(tie: Tie) -> Self {
    match tie {
      Tie::Oldest => TieBreak::Oldest,
      Tie::Quietest => TieBreak::Quietest,
    }
  }
}

/// Renders a modal synthesis scene to a WAV file.
#[derive(Debug, Parser)]
#[command(name = "resona-render", version, about)]
struct Args {
  /// Scene in JSON. The built in demo is rendered when omitted.
  scene: Option<PathBuf>,

  #[arg(short, long, default_value = "out.wav")]
  output: PathBuf,

  #[arg(long, default_value_t = 48000)]
  sample_rate: u32,

  #[arg(long, default_value_t = 2)]
  channels: u16,

  #[arg(long, default_value_t = 256)]
  block_size: usize,

  #[arg(long, default_value_t = 32)]
  polyphony: usize,

  #[arg(long, value_enum, default_value_t = Steal::ReleasedOnly)]
  steal: Steal,

  #[arg(long, value_enum, default_value_t = Tie::Oldest)]
  tie_break: Tie,

  /// Strikes add energy to a ringing voice of the same bank.
  #[arg(long)]
  layer: bool,

  #[arg(long, default_value_t = 0x5eed)]
  seed: u64,

  /// Seconds to render, overriding the scene.
  #[arg(short, long)]
  duration: Option<f32>,

  #[arg(long)]
  no_clamp: bool,
}

impl Args {
  fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      sample_rate: self.sample_rate as f32,
      channels: self.channels as usize,
      max_block_size: self.block_size,
      max_polyphony: self.polyphony,
      steal_policy: self.steal.into(),
      tie_break: self.tie_break.into(),
      retrigger_policy: if self.layer {
        RetriggerPolicy::Layer
      } else {
        RetriggerPolicy::NewVoice
      },
      clamp_output: !self.no_clamp,
      seed: self.seed,
      ..EngineConfig::default()
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Summary {
  frames: usize,
  peak: f32,
}

/// Feeds events one block ahead of the render position, the way a sequencer would,
/// so long timelines never fill the event queue at once.
fn render_scene<W: Write + Seek>(
  node: &mut SynthGraphNode,
  events: &[Event],
  total_frames: usize,
  block_size: usize,
  writer: &mut WavWriter<W>,
) -> anyhow::Result<Summary> {
  let channels = node.controller().config().channels;
  let sample_rate = node.controller().config().sample_rate;
  let mut buffer = vec![0.0f32; block_size * channels];
  let mut pending = events.iter().peekable();
  let mut summary = Summary::default();

  while summary.frames < total_frames {
    let frames = block_size.min(total_frames - summary.frames);
    let horizon = (summary.frames + frames + block_size) as u64;
    while let Some(event) = pending.next_if(|event| event.timestamp() < horizon) {
      // dropped events are counted in the diagnostics
      node.push_event(*event).ok();
    }

    node.render(&mut buffer, frames, sample_rate);
    for sample in &buffer[..frames * channels] {
      summary.peak = summary.peak.max(sample.abs());
      writer.write_sample(*sample)?;
    }
    summary.frames += frames;

    if summary.frames % (sample_rate as usize) < frames {
      node.report_diagnostics();
    }
  }

  Ok(summary)
}

fn main() -> anyhow::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let args = Args::parse();
  let scene = match &args.scene {
    Some(path) => Scene::load(path)?,
    None => Scene::demo(),
  };

  let config = args.engine_config();
  let sample_rate = config.sample_rate;
  let mut node = SynthGraphNode::new(config).context("Failed to create the engine")?;

  for (id, bank) in scene.banks()? {
    node
      .load_bank(id, bank)
      .with_context(|| format!("Failed to load bank {}", id))?;
  }
  for (param, value) in scene.parameters()? {
    node.set_parameter(param, value)?;
  }

  let events = scene.events(sample_rate)?;
  let duration = args.duration.unwrap_or_else(|| scene.duration());
  let total_frames = (duration.max(0.0) * sample_rate) as usize;

  let spec = WavSpec {
    channels: args.channels,
    sample_rate: args.sample_rate,
    bits_per_sample: 32,
    sample_format: SampleFormat::Float,
  };
  let mut writer = WavWriter::create(&args.output, spec)
    .with_context(|| format!("Failed to create {}", args.output.display()))?;

  log::info!(
    "Rendering {} events over {:.2} s at {} Hz",
    events.len(),
    duration,
    args.sample_rate
  );
  let summary = render_scene(&mut node, &events, total_frames, args.block_size, &mut writer)?;
  writer.finalize()?;

  node.report_diagnostics();
  log::info!(
    "Wrote {} frames to {} (peak {:.3})",
    summary.frames,
    args.output.display(),
    summary.peak
  );
  log::info!("{:?}", node.diagnostics());
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;
  use std::io::Cursor;

  fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["resona-render"];
    argv.extend_from_slice(extra);
    Args::parse_from(argv)
  }

  fn render(args: &Args, scene: &Scene, seconds: f32) -> (Summary, Vec<f32>, SynthGraphNode) {
    let config = args.engine_config();
    let sample_rate = config.sample_rate;
    let mut node = SynthGraphNode::new(config).unwrap();
    for (id, bank) in scene.banks().unwrap() {
      node.load_bank(id, bank).unwrap();
    }
    for (param, value) in scene.parameters().unwrap() {
      node.set_parameter(param, value).unwrap();
    }
    let events = scene.events(sample_rate).unwrap();
    let spec = WavSpec {
      channels: args.channels,
      sample_rate: args.sample_rate,
      bits_per_sample: 32,
      sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
    let total_frames = (seconds * sample_rate) as usize;
    let summary = render_scene(&mut node, &events, total_frames, args.block_size, &mut writer).unwrap();
    writer.finalize().unwrap();

    cursor.set_position(0);
    let samples = hound::WavReader::new(cursor)
      .unwrap()
      .into_samples::<f32>()
      .collect::<Result<Vec<f32>, _>>()
      .unwrap();
    (summary, samples, node)
  }

  #[test]
  fn default_arguments() {
    let config = args(&[]).engine_config();
    assert_eq!(config.sample_rate, 48000.0);
    assert_eq!(config.channels, 2);
    assert_eq!(config.steal_policy, StealPolicy::ReleasedOnly);
    assert_eq!(config.retrigger_policy, RetriggerPolicy::NewVoice);
    assert!(config.clamp_output);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn policy_arguments() {
    let config = args(&["--steal", "any", "--tie-break", "quietest", "--layer", "--no-clamp"])
      .engine_config();
    assert_eq!(config.steal_policy, StealPolicy::Any);
    assert_eq!(config.tie_break, TieBreak::Quietest);
    assert_eq!(config.retrigger_policy, RetriggerPolicy::Layer);
    assert!(!config.clamp_output);
  }

  #[test]
  fn renders_the_demo_scene() {
    let args = args(&["--sample-rate", "22050", "--block-size", "128"]);
    let (summary, samples, node) = render(&args, &Scene::demo(), 4.0);

    assert_eq!(summary.frames, 4 * 22050);
    assert_eq!(samples.len(), summary.frames * 2);
    assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    assert_approx_eq!(peak, summary.peak);
    assert!(peak > 0.01);

    let diagnostics = node.diagnostics();
    assert_eq!(diagnostics.queue_overflow, 0);
    assert_eq!(diagnostics.unknown_bank, 0);
    assert_eq!(diagnostics.numeric_instability, 0);
  }

  #[test]
  fn long_timelines_do_not_overflow_the_queue() {
    let mut scene = Scene::demo();
    scene.events = (0..2000)
      .map(|index| crate::scene::EventSpec::Strike {
        time: index as f32 * 0.002,
        strength: 0.1,
        bank: Some(0),
        tone: None,
        priority: 0,
      })
      .collect();
    let args = args(&["--channels", "1", "--polyphony", "8", "--steal", "any"]);
    let (summary, samples, node) = render(&args, &scene, 4.5);

    assert_eq!(samples.len(), summary.frames);
    assert_eq!(node.diagnostics().queue_overflow, 0);
    assert!(node.diagnostics().voices_stolen > 0);
  }
}
