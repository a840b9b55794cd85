use crate::float::Float;
use crate::mode::Mode;

/// Upper bound for a restruck mode, relative to the amplitude of the new strike.
pub const MAX_RESTRIKE_INCREMENT: f32 = 1.5;

/// A damped two-pole oscillator tuned to one mode.
///
/// Runs the recurrence `y[n] = a1 * y[n-1] - a2 * y[n-2] + x[n]` with
/// `a1 = 2 R cos(w)`, `a2 = R^2`, `R = exp(-decay / sample_rate)` and
/// `w = 2 pi frequency / sample_rate`, so a free ring decays by `exp(-decay * t)`.
/// All coefficients are computed by [`Resonator::tune`], the per sample path
/// only multiplies and adds.
#[derive(Debug, Clone)]
pub struct Resonator<F> {
  a1: F,
  a2: F,
  y1: F,
  y2: F,

  radius: F,
  cos_w: F,
  sin_w: F,
  sin_2w: F,
  cos_2w: F,
  inv_sin_w_sq: F,

  left: F,
  right: F,

  drive: Drive<F>,
  muted: bool,
  active: bool,
}

/// Sinusoidal input at the mode frequency, produced by a rotating phasor.
#[derive(Debug, Clone, Default)]
struct Drive<F> {
  enabled: bool,
  amplitude: F,
  gain: F,
  re: F,
  im: F,
}

impl<F: Float> Default for Resonator<F> {
  fn default() -> Self {
    Self {
      a1: F::zero(),
      a2: F::zero(),
      y1: F::zero(),
      y2: F::zero(),
      radius: F::zero(),
      cos_w: F::one(),
      sin_w: F::zero(),
      sin_2w: F::zero(),
      cos_2w: F::one(),
      inv_sin_w_sq: F::one(),
      left: F::one(),
      right: F::one(),
      drive: Drive::default(),
      muted: true,
      active: false,
    }
  }
}

impl<F: Float> Resonator<F> {
  pub fn new(mode: &Mode, sample_rate: F) -> Self {
    let mut resonator = Self::default();
    resonator.tune(F::val(mode.frequency), F::val(mode.decay), sample_rate);
    resonator.set_pan(F::val(mode.pan));
    resonator
  }

  /// Recomputes the coefficients. Keeps the current state so a ringing mode can be retuned.
  ///
  /// Frequencies at or above Nyquist, and decays that would not leave a stable pole,
  /// mute the resonator instead of aliasing or blowing up.
  pub fn tune(&mut self, frequency: F, decay: F, sample_rate: F) {
    let nyquist = sample_rate * F::val(0.5);
    let valid = frequency.is_finite()
      && frequency > F::zero()
      && frequency < nyquist
      && decay.is_finite()
      && decay > F::zero()
      && sample_rate.is_finite()
      && sample_rate > F::zero();

    if !valid {
      self.muted = true;
      self.reset();
      return;
    }

    let w = F::TAU * frequency / sample_rate;
    let radius = (-decay / sample_rate).exp();

    self.radius = radius;
    self.cos_w = w.cos();
    self.sin_w = w.sin();
    self.cos_2w = (w + w).cos();
    self.sin_2w = (w + w).sin();
    self.a1 = F::val(2.0) * radius * self.cos_w;
    self.a2 = radius * radius;

    let sin_w_sq = self.sin_w * self.sin_w;
    self.inv_sin_w_sq = if sin_w_sq > F::epsilon() {
      sin_w_sq.recip()
    } else {
      F::one()
    };

    self.muted = radius <= F::zero() || radius >= F::one();
    if self.muted {
      self.reset();
    }
  }

  /// Balance law: both sides at full level in the centre, the far side fades out linearly.
  pub fn set_pan(&mut self, pan: F) {
    let pan = pan.max(-F::one()).min(F::one());
    self.left = (F::one() - pan).min(F::one());
    self.right = (F::one() + pan).min(F::one());
  }

  pub fn pan_gains(&self) -> (F, F) {
    (self.left, self.right)
  }

  pub fn is_muted(&self) -> bool {
    self.muted
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn is_finite(&self) -> bool {
    self.y1.is_finite() && self.y2.is_finite()
  }

  pub fn reset(&mut self) {
    self.y1 = F::zero();
    self.y2 = F::zero();
    self.drive = Drive::default();
    self.active = false;
  }

  /// Impulsive excitation. Sets up the state so the ring continues as
  /// `amplitude * R^n * sin(w n)` from the next sample, on top of whatever was already ringing.
  pub fn strike(&mut self, amplitude: F) {
    if self.muted || amplitude == F::zero() {
      return;
    }
    self.y1 = self.y1 - amplitude * self.sin_w / self.radius;
    self.y2 = self.y2 - amplitude * self.sin_2w / (self.radius * self.radius);
    self.active = true;
  }

  /// Continuous excitation at the mode frequency with a steady state amplitude of `amplitude`.
  ///
  /// A silent resonator starts directly in the steady state, so there is no transient.
  pub fn drive(&mut self, amplitude: F) {
    if self.muted || amplitude == F::zero() {
      return;
    }

    let r = self.radius;
    let re = F::one() - r * self.cos_2w;
    let im = r * self.sin_2w;
    let phase = im.atan2(re);
    self.drive = Drive {
      enabled: true,
      amplitude,
      gain: amplitude * (F::one() - r) * (re * re + im * im).sqrt(),
      re: phase.cos(),
      im: phase.sin(),
    };

    if !self.active {
      self.y1 = -amplitude * self.sin_w;
      self.y2 = -amplitude * self.sin_2w;
    }
    self.active = true;
  }

  /// Excites a mode that may already be sounding, the way a key struck again adds to
  /// the vibration that is still there.
  ///
  /// The new steady state amplitude is the sum of the current and the new one, capped at
  /// [`MAX_RESTRIKE_INCREMENT`] times the new one. A softer strike never takes energy
  /// away. A driven mode keeps its phase, so the change is smooth.
  pub fn restrike_drive(&mut self, amplitude: F) {
    if self.muted || amplitude <= F::zero() {
      return;
    }

    let current = if self.drive.enabled {
      self.drive.amplitude
    } else {
      self.amplitude()
    };
    let ceiling = amplitude * F::val(MAX_RESTRIKE_INCREMENT);
    let target = current.max((current + amplitude).min(ceiling));

    if self.drive.enabled && current > F::zero() {
      self.drive.gain = self.drive.gain * target / current;
      self.drive.amplitude = target;
    } else {
      self.drive(target);
    }
  }

  /// Lets the mode ring out freely.
  pub fn stop_drive(&mut self) {
    self.drive.enabled = false;
  }

  #[inline]
  pub fn next_sample(&mut self) -> F {
    let mut y = self.a1 * self.y1 - self.a2 * self.y2;
    if self.drive.enabled {
      y = y + self.drive.gain * self.drive.im;
      let re = self.drive.re * self.cos_w - self.drive.im * self.sin_w;
      let im = self.drive.im * self.cos_w + self.drive.re * self.sin_w;
      self.drive.re = re;
      self.drive.im = im;
    }
    self.y2 = self.y1;
    self.y1 = y;
    y
  }

  /// Adds the panned output scaled by `gain` into `left` and `right`.
  pub fn render(&mut self, left: &mut [F], right: &mut [F], gain: F) {
    if self.muted || !self.active {
      return;
    }

    let left_gain = gain * self.left;
    let right_gain = gain * self.right;
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
      let y = self.next_sample();
      *l = *l + y * left_gain;
      *r = *r + y * right_gain;
    }

    if self.drive.enabled {
      self.renormalize_drive();
    }
  }

  /// Current oscillation amplitude, estimated from the last two outputs.
  pub fn amplitude(&self) -> F {
    if !self.active {
      return F::zero();
    }
    let energy = self.y1 * self.y1 - self.a1 * self.y1 * self.y2 + self.a2 * self.y2 * self.y2;
    (energy.max(F::zero()) * self.inv_sin_w_sq).sqrt()
  }

  /// Puts a free ringing resonator to sleep once it drops under `floor`.
  /// Returns whether it is still active.
  pub fn update_activity(&mut self, floor: F) -> bool {
    if self.active && !self.drive.enabled && self.amplitude() < floor {
      self.y1 = F::zero();
      self.y2 = F::zero();
      self.active = false;
    }
    self.active
  }

  fn renormalize_drive(&mut self) {
    let norm = self.drive.re * self.drive.re + self.drive.im * self.drive.im;
    let k = (F::val(3.0) - norm) * F::val(0.5);
    self.drive.re = self.drive.re * k;
    self.drive.im = self.drive.im * k;
  }
}
