pub mod envelope;
pub mod float;
pub mod mode;
pub mod pitch;
pub mod presets;
pub mod resonator;
pub mod smoother;
pub mod tone;
pub mod velocity;

pub use crate::envelope::{Adsr, AdsrStage, AdsrTimes};
pub use crate::float::Float;
pub use crate::mode::{AssetError, Jitter, Mode, ModeBank, MAX_MODES};
pub use crate::resonator::Resonator;
pub use crate::velocity::VelocityCurve;
