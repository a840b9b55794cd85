use std::sync::Arc;

use ringbuf::RingBuffer;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::params::Parameters;
use crate::{Controller, EngineConfig, Renderer};

/// One engine instance, split into the part owned by the control thread
/// and the part owned by the audio thread.
pub struct Engine {
  controller: Controller,
  renderer: Renderer,
}

impl Engine {
  pub fn new() -> Result<Self> {
    Self::with_config(EngineConfig::default())
  }

  pub fn with_config(config: EngineConfig) -> Result<Self> {
    config.validate()?;

    let ring_buffer_capacity = config.event_queue_capacity;
    let (forward_tx, forward_rx) = RingBuffer::new(ring_buffer_capacity).split();
    let (backward_tx, backward_rx) = RingBuffer::new(ring_buffer_capacity).split();
    let parameters = Arc::new(Parameters::new());
    let diagnostics = Arc::new(Diagnostics::new());

    let controller = Controller::new(
      forward_tx,
      backward_rx,
      config.clone(),
      parameters.clone(),
      diagnostics.clone(),
    );
    let renderer = Renderer::new(backward_tx, forward_rx, config, parameters, diagnostics);

    Ok(Self {
      controller,
      renderer,
    })
  }

  pub fn controller(&mut self) -> &mut Controller {
    &mut self.controller
  }

  pub fn renderer(&mut self) -> &mut Renderer {
    &mut self.renderer
  }

  pub fn split(self) -> (Controller, Renderer) {
    let Self {
      controller,
      renderer,
    } = self;
    (controller, renderer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn invalid_config_is_rejected() {
    let result = Engine::with_config(EngineConfig::default().with_max_polyphony(0));
    assert!(
      matches!(result, Err(Error::InvalidConfig(_))),
      "Unexpected result: {:?}",
      result.err()
    );
  }

  #[test]
  fn shares_diagnostics() {
    let (controller, mut renderer) = Engine::new().unwrap().split();
    let mut output = vec![0.0; 64 * 2];
    renderer.render(&mut output, 64, 48000.0);
    assert_eq!(controller.diagnostics().rendered_frames, 64);
    assert_eq!(controller.now(), 64);
  }
}
