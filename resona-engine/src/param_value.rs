use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` that can be written from the control thread and read from the audio thread
/// without locks or torn reads.
#[derive(Debug)]
pub struct ParamValue(AtomicU32);

impl ParamValue {
  pub fn new(value: f32) -> Self {
    Self(AtomicU32::new(value.to_bits()))
  }

  pub fn get(&self) -> f32 {
    f32::from_bits(self.0.load(Ordering::Relaxed))
  }

  pub fn set(&self, value: f32) {
    self.0.store(value.to_bits(), Ordering::Relaxed)
  }
}

impl Default for ParamValue {
  fn default() -> Self {
    Self::new(0.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_and_get() {
    let value = ParamValue::new(0.25);
    assert_eq!(value.get(), 0.25);
    value.set(-3.5);
    assert_eq!(value.get(), -3.5);
  }
}
