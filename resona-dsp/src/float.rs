use core::f32::consts as f32_consts;
use core::f64::consts as f64_consts;
use core::fmt::Debug;

use num_traits::{NumCast, ToPrimitive};

pub trait Float: num_traits::Float + Copy + Default + Debug + Send + Sync + 'static {
  const PI: Self;
  const TAU: Self;
  const LN_2: Self;

  fn val<T: ToPrimitive>(v: T) -> Self {
    <Self as NumCast>::from(v).unwrap_or_else(Self::zero)
  }
}

impl Float for f32 {
  const PI: f32 = f32_consts::PI;
  const TAU: f32 = f32_consts::TAU;
  const LN_2: f32 = f32_consts::LN_2;
}

impl Float for f64 {
  const PI: f64 = f64_consts::PI;
  const TAU: f64 = f64_consts::TAU;
  const LN_2: f64 = f64_consts::LN_2;
}
