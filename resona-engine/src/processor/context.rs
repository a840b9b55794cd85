/// One host callback: where to write and how much.
pub struct ProcessorContext<'a> {
  num_samples: usize,
  sample_rate: f32,
  channels: usize,
  output: &'a mut [f32],
}

impl<'a> ProcessorContext<'a> {
  /// `output` holds `num_samples` interleaved frames of `channels` samples.
  pub fn new(num_samples: usize, sample_rate: f32, channels: usize, output: &'a mut [f32]) -> Self {
    Self {
      num_samples,
      sample_rate,
      channels,
      output,
    }
  }

  pub fn num_samples(&self) -> usize {
    self.num_samples
  }

  pub fn sample_rate(&self) -> f32 {
    self.sample_rate
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn output(&mut self) -> &mut [f32] {
    &mut *self.output
  }
}
