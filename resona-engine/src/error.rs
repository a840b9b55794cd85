use thiserror::Error;

use resona_dsp::AssetError;

use crate::banks::BankId;

pub type Result<T> = core::result::Result<T, Error>;

/// Failures reported synchronously to the control thread.
///
/// Problems found while rendering never show up here, they are counted in
/// [`crate::Diagnostics`] instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
  #[error("Invalid asset: {0}")]
  InvalidAsset(#[from] AssetError),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Unknown parameter '{0}'")]
  UnknownParameter(String),

  #[error("Invalid value {value} for parameter '{name}'")]
  InvalidParameter { name: &'static str, value: f32 },

  #[error("Invalid event: {0}")]
  InvalidEvent(String),

  #[error("Event queue is full, the event was dropped")]
  QueueOverflow,

  #[error("Bank {0} is not loaded")]
  BankNotLoaded(BankId),

  #[error("Cannot load more than {0} banks")]
  TooManyBanks(usize),
}
