//! Typed notification bus for document lifecycle events.
//!
//! Each subscriber owns a [`Subscription`] with its own channel. Dropping the
//! subscription unregisters it, so a subscriber can never outlive its slot on
//! the bus and nothing has to be unsubscribed by hand.

use std::{
  sync::{
    Arc,
    Weak,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
  time::Duration,
};

use crossbeam::channel::{
  self,
  Receiver,
  RecvTimeoutError,
  Sender,
  TryRecvError,
};
use hashbrown::HashMap;
use parking_lot::Mutex;
use the_core::DocId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocEvent {
  /// A lineage was deleted; ids pointing into it are dead.
  DocDeleted(DocId),
  /// A draft was consolidated into a committed version.
  Committed { old: DocId, new: DocId },
  /// The text or properties of a revision changed.
  RevisionUpdated(DocId),
  /// A file mirror was created, re-pointed or marked modified.
  MirrorUpdated(DocId),
  /// A new revision was forked.
  NewRevision(DocId),
  /// Metadata of a committed version changed (read flag).
  DocUpdated(DocId),
}

impl DocEvent {
  /// The id the event is about. For commits this is the new version.
  pub fn doc(&self) -> DocId {
    match *self {
      DocEvent::DocDeleted(id)
      | DocEvent::RevisionUpdated(id)
      | DocEvent::MirrorUpdated(id)
      | DocEvent::NewRevision(id)
      | DocEvent::DocUpdated(id) => id,
      DocEvent::Committed { new, .. } => new,
    }
  }
}

type Registry = Mutex<HashMap<u64, Sender<DocEvent>>>;

#[derive(Default)]
pub struct EventBus {
  subscribers: Arc<Registry>,
  next_id:     AtomicU64,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = channel::unbounded();
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    self.subscribers.lock().insert(id, tx);
    Subscription {
      id,
      rx,
      registry: Arc::downgrade(&self.subscribers),
    }
  }

  /// Delivers `event` to every live subscriber.
  ///
  /// Must not be called while holding a lock a subscriber might take.
  pub fn emit(&self, event: DocEvent) {
    log::trace!("emit {event:?}");
    let mut subscribers = self.subscribers.lock();
    subscribers.retain(|_, tx| tx.send(event).is_ok());
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().len()
  }
}

/// Receiving end of one bus subscription.
pub struct Subscription {
  id:       u64,
  rx:       Receiver<DocEvent>,
  registry: Weak<Registry>,
}

impl Subscription {
  pub fn try_recv(&self) -> Option<DocEvent> {
    match self.rx.try_recv() {
      Ok(event) => Some(event),
      Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
    }
  }

  pub fn recv_timeout(&self, timeout: Duration) -> Option<DocEvent> {
    match self.rx.recv_timeout(timeout) {
      Ok(event) => Some(event),
      Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
    }
  }

  /// Everything queued so far, without blocking.
  pub fn drain(&self) -> Vec<DocEvent> {
    self.rx.try_iter().collect()
  }

  pub fn receiver(&self) -> &Receiver<DocEvent> {
    &self.rx
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(registry) = self.registry.upgrade() {
      registry.lock().remove(&self.id);
    }
  }
}
