//! Ready made materials, given as (frequency ratio, amplitude, time to fade to ~5% in seconds).

use crate::mode::{AssetError, Mode, ModeBank};
use crate::pitch::hz_to_note;

type Partial = (f32, f32, f32);

const BELL: &[Partial] = &[
  (1.0, 1.0, 4.0),
  (2.0, 0.8, 3.5),
  (2.4, 0.6, 3.0),
  (3.0, 0.5, 2.5),
  (4.0, 0.4, 2.0),
  (5.0, 0.25, 1.5),
  (6.0, 0.15, 1.2),
  (8.0, 0.1, 1.0),
];

const CHIME: &[Partial] = &[
  (1.0, 1.0, 3.0),
  (2.76, 0.7, 2.5),
  (5.4, 0.5, 2.0),
  (8.93, 0.3, 1.5),
  (13.34, 0.15, 1.0),
  (18.64, 0.08, 0.7),
];

const MARIMBA: &[Partial] = &[
  (1.0, 1.0, 1.5),
  (4.0, 0.3, 0.8),
  (9.0, 0.15, 0.5),
  (16.0, 0.05, 0.3),
];

const GLOCKENSPIEL: &[Partial] = &[
  (1.0, 1.0, 2.5),
  (2.71, 0.7, 2.2),
  (5.28, 0.5, 1.8),
  (8.65, 0.35, 1.4),
  (12.81, 0.2, 1.0),
  (17.77, 0.1, 0.7),
];

const WOOD: &[Partial] = &[
  (1.0, 1.0, 0.25),
  (2.57, 0.5, 0.15),
  (4.21, 0.3, 0.1),
  (6.02, 0.15, 0.06),
];

const METAL_PLATE: &[Partial] = &[
  (1.0, 0.7, 2.0),
  (1.59, 1.0, 1.8),
  (2.14, 0.8, 1.6),
  (2.30, 0.6, 1.5),
  (2.65, 0.5, 1.3),
  (2.92, 0.45, 1.2),
  (3.16, 0.4, 1.1),
  (3.50, 0.3, 1.0),
  (3.60, 0.3, 0.9),
  (4.06, 0.25, 0.8),
  (4.15, 0.2, 0.7),
  (4.62, 0.15, 0.6),
];

const GLASS: &[Partial] = &[
  (1.0, 1.0, 1.2),
  (2.32, 0.6, 0.9),
  (4.25, 0.4, 0.6),
  (6.63, 0.25, 0.4),
  (9.38, 0.12, 0.3),
];

pub const NAMES: &[&str] = &[
  "bell",
  "chime",
  "marimba",
  "glockenspiel",
  "wood",
  "metal-plate",
  "glass",
];

pub fn bell(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, BELL)
}

pub fn chime(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, CHIME)
}

pub fn marimba(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, MARIMBA)
}

pub fn glockenspiel(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, GLOCKENSPIEL)
}

pub fn wood(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, WOOD)
}

pub fn metal_plate(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, METAL_PLATE)
}

pub fn glass(fundamental: f32) -> Result<ModeBank, AssetError> {
  build(fundamental, GLASS)
}

pub fn by_name(name: &str, fundamental: f32) -> Option<Result<ModeBank, AssetError>> {
  let partials = match name {
    "bell" => BELL,
    "chime" => CHIME,
    "marimba" => MARIMBA,
    "glockenspiel" => GLOCKENSPIEL,
    "wood" => WOOD,
    "metal-plate" => METAL_PLATE,
    "glass" => GLASS,
    _ => return None,
  };
  Some(build(fundamental, partials))
}

/// Upper partials are spread alternately left and right.
fn build(fundamental: f32, partials: &[Partial]) -> Result<ModeBank, AssetError> {
  let mut modes = heapless::Vec::<Mode, { crate::mode::MAX_MODES }>::new();
  for (index, &(ratio, amplitude, fade_time)) in partials.iter().enumerate() {
    let spread = (index as f32 * 0.1).min(0.5);
    let pan = if index % 2 == 0 { spread } else { -spread };
    let mode = Mode::new(fundamental * ratio, 3.0 / fade_time, amplitude).with_pan(pan);
    modes
      .push(mode)
      .map_err(|_| AssetError::TooManyModes(partials.len()))?;
  }
  ModeBank::with_reference_note(&modes, hz_to_note(fundamental))
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  #[test]
  fn all_presets_are_valid() {
    for name in NAMES {
      let bank = by_name(name, 220.0).unwrap().unwrap();
      assert!(bank.validate_for(44100.0).is_ok(), "{}", name);
      assert_approx_eq!(bank.reference_frequency(), 220.0, 1e-2);
    }
  }

  #[test]
  fn unknown_preset() {
    assert!(by_name("cardboard", 220.0).is_none());
  }

  #[test]
  fn invalid_fundamental() {
    let result = bell(-1.0);
    assert!(
      matches!(result, Err(AssetError::InvalidFrequency { index: 0, .. })),
      "Unexpected result: {:?}",
      result
    );
  }

  #[test]
  fn bell_modes() {
    let bank = bell(100.0).unwrap();
    assert_eq!(bank.len(), 8);
    let mode = bank.get(1).unwrap();
    assert_approx_eq!(mode.frequency, 200.0);
    assert_approx_eq!(mode.decay, 3.0 / 3.5);
    assert_approx_eq!(mode.pan, -0.1);
  }
}
