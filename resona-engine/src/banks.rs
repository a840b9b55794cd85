use std::sync::Arc;

use derive_more::Display;

use resona_dsp::ModeBank;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "#{}", _0)]
pub struct BankId(pub u32);

impl BankId {
  /// Bank selected through the `material` parameter.
  pub fn from_param(value: f32) -> Self {
    Self(value.round().max(0.0) as u32)
  }
}

/// Render side table of loaded banks, sized up front so inserting never allocates.
pub(crate) struct BankTable {
  entries: Vec<(BankId, Arc<ModeBank>)>,
  capacity: usize,
}

impl BankTable {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Vec::with_capacity(capacity),
      capacity,
    }
  }

  pub fn get(&self, id: BankId) -> Option<&ModeBank> {
    self
      .entries
      .iter()
      .find(|(entry_id, _)| *entry_id == id)
      .map(|(_, bank)| bank.as_ref())
  }

  /// Returns the bank that was replaced, or the new one back if the table is full.
  pub fn insert(
    &mut self,
    id: BankId,
    bank: Arc<ModeBank>,
  ) -> Result<Option<Arc<ModeBank>>, Arc<ModeBank>> {
    if let Some(entry) = self.entries.iter_mut().find(|(entry_id, _)| *entry_id == id) {
      Ok(Some(std::mem::replace(&mut entry.1, bank)))
    } else if self.entries.len() < self.capacity {
      self.entries.push((id, bank));
      Ok(None)
    } else {
      Err(bank)
    }
  }

  pub fn remove(&mut self, id: BankId) -> Option<Arc<ModeBank>> {
    let index = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
    Some(self.entries.swap_remove(index).1)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
