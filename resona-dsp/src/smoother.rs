use crate::float::Float;

pub type LinearStepsSmoother<F> = Smoother<F, LinearSteps<F>>;

/// Moves a value towards a target at sample rate, following a pluggable strategy.
#[derive(Debug, Clone)]
pub struct Smoother<F, S> {
  value: F,
  target: F,
  strategy: S,
}

impl<F, S> Smoother<F, S>
where
  F: Float,
  S: SmoothingStrategy<F>,
{
  pub fn new(value: F, strategy: S) -> Self {
    Self {
      value,
      target: value,
      strategy,
    }
  }

  pub fn target(&self) -> F {
    self.target
  }

  /// Only restarts the ramp when the target actually changes,
  /// so it can be called once per buffer with the latest parameter value.
  pub fn set_target(&mut self, target: F) {
    if target != self.target {
      self.target = target;
      self.strategy.target_updated(self.value, self.target);
    }
  }

  pub fn next_value(&mut self) -> F {
    self.value = self.strategy.next_value(self.value, self.target);
    self.value
  }
}

pub trait SmoothingStrategy<F> {
  fn target_updated(&mut self, value: F, target: F);
  fn next_value(&mut self, value: F, target: F) -> F;
}

#[derive(Debug, Clone)]
pub struct LinearSteps<F> {
  num_steps: usize,
  current_step: usize,
  value_delta: F,
}

impl<F> LinearSteps<F>
where
  F: Float,
{
  pub fn new(num_steps: usize) -> Self {
    Self {
      num_steps,
      current_step: num_steps,
      value_delta: F::zero(),
    }
  }

  pub fn from_time(sample_rate: F, time: F) -> Self {
    Self::new(F::floor(sample_rate * time).to_usize().unwrap_or(0))
  }
}

impl<F> SmoothingStrategy<F> for LinearSteps<F>
where
  F: Float,
{
  fn target_updated(&mut self, value: F, target: F) {
    self.current_step = 0;
    let num_steps = F::val(self.num_steps.max(1));
    self.value_delta = (target - value) / num_steps;
  }

  fn next_value(&mut self, value: F, target: F) -> F {
    if self.current_step + 1 < self.num_steps {
      self.current_step += 1;
      value + self.value_delta
    } else {
      self.current_step = self.num_steps;
      target
    }
  }
}
