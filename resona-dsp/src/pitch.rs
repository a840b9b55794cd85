//! Pitch conversions. Notes are expressed in semitones with 69 = A4 = 440 Hz.

pub const MAX_PITCH_OFFSET: f32 = 48.0;

const A4_NOTE: f32 = 69.0;
const A4_FREQUENCY: f32 = 440.0;

pub fn note_to_hz(note: f32) -> f32 {
  A4_FREQUENCY * libm::exp2f((note - A4_NOTE) / 12.0)
}

pub fn hz_to_note(frequency: f32) -> f32 {
  A4_NOTE + 12.0 * libm::log2f(frequency / A4_FREQUENCY)
}

/// Frequency ratio for a shift of `semitones`, limited to +/- [`MAX_PITCH_OFFSET`].
pub fn semitones_to_ratio(semitones: f32) -> f32 {
  let semitones = if semitones.is_finite() {
    semitones.clamp(-MAX_PITCH_OFFSET, MAX_PITCH_OFFSET)
  } else {
    0.0
  };
  libm::exp2f(semitones / 12.0)
}
