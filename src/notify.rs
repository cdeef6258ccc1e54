//! Minimal change-notification capability shared by the tree container
//! and the link manager.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Whether a mutating operation should report the change to subscribers.
///
/// Batched callers pass [`Notify::Silent`] to suppress the per-call
/// notification and emit their own single batch notification at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Emit,
    Silent,
}

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe.
pub type SubscriberHandle = u64;

type Callback = Rc<dyn Fn()>;

/// Subscriber registry with snapshot dispatch.
///
/// Dispatch runs over a snapshot of the subscriber list, so a listener
/// may subscribe or unsubscribe during `notify()` without skipping or
/// double-calling any listener of the current batch.
#[derive(Default)]
pub struct Notifier {
    subscribers: RefCell<Vec<(SubscriberHandle, Callback)>>,
    next_handle: Cell<SubscriberHandle>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zero-argument callback. Returns the handle needed to
    /// unsubscribe it again.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriberHandle {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.subscribers
            .borrow_mut()
            .push((handle, Rc::new(callback)));
        handle
    }

    /// Remove a subscriber. Returns false if the handle is unknown.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|(h, _)| *h != handle);
        subs.len() != before
    }

    /// Invoke every currently registered callback.
    pub fn notify(&self) {
        // Snapshot first: listeners may mutate the subscriber list.
        let snapshot: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in snapshot {
            cb();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
