mod context;

use std::fmt::Formatter;

use crate::params::ParamDescriptor;
pub use context::ProcessorContext;

/// What a node looks like to the host graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
  pub class: String,
  pub parameters: Vec<ParamDescriptor>,
  pub audio_outputs: usize,
}

impl NodeDescriptor {
  pub fn new<S: Into<String>>(class: S) -> Self {
    Self {
      class: class.into(),
      parameters: Vec::new(),
      audio_outputs: 0,
    }
  }

  pub fn class(&self) -> &str {
    self.class.as_str()
  }

  pub fn parameters(mut self, params: Vec<ParamDescriptor>) -> Self {
    self.parameters = params;
    self
  }

  pub fn audio_outputs(mut self, channels: usize) -> Self {
    self.audio_outputs = channels;
    self
  }

  pub fn parameter(&self, name: &str) -> Option<&ParamDescriptor> {
    self.parameters.iter().find(|param| param.name == name)
  }
}

pub trait Processor {
  fn static_descriptor() -> NodeDescriptor
  where
    Self: Sized,
  {
    NodeDescriptor::new("processor")
  }

  fn descriptor(&self) -> NodeDescriptor
  where
    Self: Sized,
  {
    Self::static_descriptor()
  }

  fn render(&mut self, context: &mut ProcessorContext);
}

impl std::fmt::Debug for dyn Processor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str("Processor()")
  }
}
