use std::sync::Arc;

use resona_dsp::ModeBank;

use crate::banks::BankId;
use crate::events::Event;

pub enum Message {
  /// Controller to renderer.
  Event(Event),
  LoadBank(BankId, Arc<ModeBank>),
  UnloadBank(BankId),
  Reset,

  /// Renderer to controller: a bank the renderer no longer uses, dropped on the control thread.
  ReleaseBank(Arc<ModeBank>),
}
