use crate::events::{Event, Timestamp};

#[derive(Debug, Clone, Copy)]
struct Pending {
  seq: u64,
  event: Event,
}

/// Bounded list of events waiting for their timestamp, kept in arrival order
/// for equal timestamps. Never grows past the capacity it was created with.
pub struct EventsBuffer {
  data: Vec<Pending>,
  capacity: usize,
  head: usize,
  sorted: bool,
  next_seq: u64,
}

impl EventsBuffer {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      data: Vec::with_capacity(capacity),
      capacity,
      head: 0,
      sorted: true,
      next_seq: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.data.len() - self.head
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&mut self) {
    self.data.clear();
    self.head = 0;
    self.sorted = true;
  }

  pub fn push(&mut self, event: Event) -> Result<(), Event> {
    if self.data.len() >= self.capacity {
      self.compact();
    }
    if self.data.len() < self.capacity {
      let timestamp = event.timestamp();
      self.sorted = self.sorted
        && self.data[self.head..]
          .last()
          .map_or(true, |last| timestamp >= last.event.timestamp());
      self.data.push(Pending {
        seq: self.next_seq,
        event,
      });
      self.next_seq = self.next_seq.wrapping_add(1);
      Ok(())
    } else {
      Err(event)
    }
  }

  /// Orders pending events by timestamp. Uses an unstable sort keyed by arrival
  /// order as well, so it does not allocate.
  pub fn sort(&mut self) {
    if !self.sorted {
      self.data[self.head..]
        .sort_unstable_by_key(|pending| (pending.event.timestamp(), pending.seq));
      self.sorted = true;
    }
  }

  pub fn next_timestamp(&self) -> Option<Timestamp> {
    self.data.get(self.head).map(|pending| pending.event.timestamp())
  }

  /// Takes the earliest event if it is due before `end`. Expects [`EventsBuffer::sort`] to have run.
  pub fn pop_before(&mut self, end: Timestamp) -> Option<Event> {
    let pending = *self.data.get(self.head)?;
    if pending.event.timestamp() < end {
      self.head += 1;
      Some(pending.event)
    } else {
      None
    }
  }

  /// Drops consumed events from the front.
  pub fn compact(&mut self) {
    if self.head > 0 {
      self.data.drain(..self.head);
      self.head = 0;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::ExcitationEvent;

  fn strike(strength: f32, timestamp: Timestamp) -> Event {
    ExcitationEvent::new(strength).at(timestamp).into()
  }

  fn strengths(buffer: &mut EventsBuffer, end: Timestamp) -> Vec<f32> {
    let mut result = Vec::new();
    while let Some(event) = buffer.pop_before(end) {
      if let Event::Excitation(excitation) = event {
        result.push(excitation.strength);
      }
    }
    result
  }

  #[test]
  fn push_until_full() {
    let mut buffer = EventsBuffer::with_capacity(2);
    assert!(buffer.push(strike(1.0, 0)).is_ok());
    assert!(buffer.push(strike(2.0, 0)).is_ok());
    assert_eq!(buffer.push(strike(3.0, 0)), Err(strike(3.0, 0)));
    assert_eq!(buffer.len(), 2);
  }

  #[test]
  fn sorted_by_timestamp_then_arrival() {
    let mut buffer = EventsBuffer::with_capacity(8);
    buffer.push(strike(1.0, 20)).unwrap();
    buffer.push(strike(2.0, 10)).unwrap();
    buffer.push(strike(3.0, 10)).unwrap();
    buffer.push(strike(4.0, 10)).unwrap();
    buffer.push(strike(5.0, 5)).unwrap();

    buffer.sort();

    assert_eq!(buffer.next_timestamp(), Some(5));
    assert_eq!(strengths(&mut buffer, 11), vec![5.0, 2.0, 3.0, 4.0]);
    assert_eq!(buffer.len(), 1);
    assert_eq!(strengths(&mut buffer, 20), Vec::<f32>::new());
    assert_eq!(strengths(&mut buffer, 21), vec![1.0]);
    assert!(buffer.is_empty());
  }

  #[test]
  fn consumed_events_free_their_space() {
    let mut buffer = EventsBuffer::with_capacity(2);
    buffer.push(strike(1.0, 0)).unwrap();
    buffer.push(strike(2.0, 0)).unwrap();
    assert_eq!(strengths(&mut buffer, 1), vec![1.0, 2.0]);
    assert!(buffer.push(strike(3.0, 5)).is_ok());
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.next_timestamp(), Some(5));
  }
}
