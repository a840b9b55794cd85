use resona_dsp::ModeBank;

use crate::banks::BankId;
use crate::diagnostics::DiagnosticsSnapshot;
use crate::error::{Error, Result};
use crate::events::{Event, Timestamp};
use crate::params::Param;
use crate::processor::{NodeDescriptor, Processor, ProcessorContext};
use crate::{Controller, Engine, EngineConfig, Renderer};

/// Adapter between a host audio graph and one engine instance.
///
/// Hosts that render on the same thread they control from can use it as is.
/// Hosts with a separate audio thread call [`SynthGraphNode::split`] and move the
/// [`Renderer`] there.
pub struct SynthGraphNode {
  controller: Controller,
  renderer: Renderer,
}

impl SynthGraphNode {
  pub const CLASS: &'static str = "resona-synth";

  pub fn new(config: EngineConfig) -> Result<Self> {
    let (controller, renderer) = Engine::with_config(config)?.split();
    Ok(Self {
      controller,
      renderer,
    })
  }

  pub fn controller(&mut self) -> &mut Controller {
    &mut self.controller
  }

  pub fn load_bank(&mut self, id: BankId, bank: ModeBank) -> Result<()> {
    self.controller.load_bank(id, bank)
  }

  pub fn unload_bank(&mut self, id: BankId) -> Result<()> {
    self.controller.unload_bank(id)
  }

  pub fn push_event<E: Into<Event>>(&mut self, event: E) -> Result<()> {
    self.controller.push_event(event)
  }

  pub fn set_parameter(&mut self, param: Param, value: f32) -> Result<f32> {
    self.controller.set_parameter(param, value)
  }

  /// Sets a parameter by the name the host editor knows it by.
  pub fn set_parameter_by_name(&mut self, name: &str, value: f32) -> Result<f32> {
    let param = Param::from_name(name).ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
    self.controller.set_parameter(param, value)
  }

  pub fn parameter(&self, param: Param) -> f32 {
    self.controller.parameter(param)
  }

  /// Renders `frame_count` interleaved frames into `output`.
  pub fn render(&mut self, output: &mut [f32], frame_count: usize, sample_rate: f32) {
    self.renderer.render(output, frame_count, sample_rate);
  }

  pub fn now(&self) -> Timestamp {
    self.controller.now()
  }

  pub fn active_voices(&self) -> usize {
    self.renderer.active_voices()
  }

  pub fn diagnostics(&self) -> DiagnosticsSnapshot {
    self.controller.diagnostics()
  }

  pub fn report_diagnostics(&mut self) -> DiagnosticsSnapshot {
    self.controller.collect_garbage();
    self.controller.report_diagnostics()
  }

  pub fn split(self) -> (Controller, Renderer) {
    (self.controller, self.renderer)
  }
}

impl Processor for SynthGraphNode {
  fn static_descriptor() -> NodeDescriptor
  where
    Self: Sized,
  {
    NodeDescriptor::new(Self::CLASS)
      .parameters(Param::ALL.iter().map(|param| param.descriptor()).collect())
      .audio_outputs(EngineConfig::MAX_CHANNELS)
  }

  fn descriptor(&self) -> NodeDescriptor
  where
    Self: Sized,
  {
    Self::static_descriptor().audio_outputs(self.renderer.channels())
  }

  /// Follows the channel layout of the host buffer, whatever the configured count.
  fn render(&mut self, context: &mut ProcessorContext) {
    let frame_count = context.num_samples();
    let sample_rate = context.sample_rate();
    let channels = context.channels();
    self
      .renderer
      .render_channels(context.output(), frame_count, channels, sample_rate);
  }
}
