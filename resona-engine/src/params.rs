use crate::error::{Error, Result};
use crate::param_value::ParamValue;

/// Parameters an editor can bind to. Values are resolved once per rendered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
  /// Master output gain.
  Gain,
  /// Multiplier for the strength of every impact.
  Strength,
  /// Bank used by events that do not name one.
  Material,
  /// Transposition in semitones for instrument notes.
  Pitch,
  Attack,
  Decay,
  Sustain,
  Release,
  /// Multiplier for every mode decay rate.
  Damping,
  /// Amount of random variation per trigger.
  Jitter,
  /// Tone colour for events that do not carry one.
  Tone,
  /// Extra decay rate, per second, added to every mode when a note is released.
  Damper,
  /// Output limiting driven by the summed voice level. Zero disables it.
  Dynamics,
}

impl Param {
  pub const COUNT: usize = 13;

  pub const ALL: [Param; Param::COUNT] = [
    Param::Gain,
    Param::Strength,
    Param::Material,
    Param::Pitch,
    Param::Attack,
    Param::Decay,
    Param::Sustain,
    Param::Release,
    Param::Damping,
    Param::Jitter,
    Param::Tone,
    Param::Damper,
    Param::Dynamics,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn from_name(name: &str) -> Option<Param> {
    Self::ALL
      .iter()
      .copied()
      .find(|param| param.descriptor().name == name)
  }

  pub fn descriptor(self) -> ParamDescriptor {
    match self {
      Param::Gain => ParamDescriptor::new("gain").initial(1.0).max(2.0),
      Param::Strength => ParamDescriptor::new("strength").initial(1.0).max(4.0),
      Param::Material => ParamDescriptor::new("material").max(u16::MAX as f32),
      Param::Pitch => ParamDescriptor::new("pitch")
        .min(-48.0)
        .max(48.0)
        .unit("st"),
      Param::Attack => ParamDescriptor::new("attack")
        .initial(0.005)
        .min(0.0005)
        .max(10.0)
        .unit("s"),
      Param::Decay => ParamDescriptor::new("decay")
        .initial(0.1)
        .min(0.001)
        .max(10.0)
        .unit("s"),
      Param::Sustain => ParamDescriptor::new("sustain").initial(0.8),
      Param::Release => ParamDescriptor::new("release")
        .initial(0.3)
        .min(0.001)
        .max(20.0)
        .unit("s"),
      Param::Damping => ParamDescriptor::new("damping")
        .initial(1.0)
        .min(0.1)
        .max(10.0),
      Param::Jitter => ParamDescriptor::new("jitter"),
      Param::Tone => ParamDescriptor::new("tone").initial(1.0),
      Param::Damper => ParamDescriptor::new("damper").max(100.0).unit("1/s"),
      Param::Dynamics => ParamDescriptor::new("dynamics").max(2.0),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
  pub name: &'static str,
  pub initial: f32,
  pub min: f32,
  pub max: f32,
  pub unit: &'static str,
}

impl ParamDescriptor {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      initial: 0.0,
      min: 0.0,
      max: 1.0,
      unit: "",
    }
  }

  pub fn initial(mut self, value: f32) -> Self {
    self.initial = value;
    self
  }

  pub fn min(mut self, value: f32) -> Self {
    self.min = value;
    self
  }

  pub fn max(mut self, value: f32) -> Self {
    self.max = value;
    self
  }

  pub fn unit(mut self, unit: &'static str) -> Self {
    self.unit = unit;
    self
  }

  /// Non finite values are rejected, everything else is clamped into range.
  pub fn validate(&self, value: f32) -> Result<f32> {
    if value.is_finite() {
      Ok(value.clamp(self.min, self.max))
    } else {
      Err(Error::InvalidParameter {
        name: self.name,
        value,
      })
    }
  }
}

/// Shared between the controller, which writes, and the renderer, which reads.
#[derive(Debug)]
pub(crate) struct Parameters {
  values: [ParamValue; Param::COUNT],
}

impl Parameters {
  pub fn new() -> Self {
    Self {
      values: std::array::from_fn(|index| ParamValue::new(Param::ALL[index].descriptor().initial)),
    }
  }

  pub fn get(&self, param: Param) -> f32 {
    self.values[param.index()].get()
  }

  pub fn set(&self, param: Param, value: f32) {
    self.values[param.index()].set(value)
  }

  pub fn snapshot(&self) -> ParamSnapshot {
    ParamSnapshot {
      values: std::array::from_fn(|index| self.values[index].get()),
    }
  }
}

/// Parameter values frozen for one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
  values: [f32; Param::COUNT],
}

impl ParamSnapshot {
  pub fn get(&self, param: Param) -> f32 {
    self.values[param.index()]
  }
}

impl Default for ParamSnapshot {
  fn default() -> Self {
    Self {
      values: std::array::from_fn(|index| Param::ALL[index].descriptor().initial),
    }
  }
}
