use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

enum ReplyState<R> {
    Pending,
    Replied(R),
    TimedOut,
    Failed(String),
}

struct ReplySlotInner<R> {
    state: Mutex<ReplyState<R>>,
    signal: Condvar,
}

impl<R> ReplySlotInner<R> {
    fn new() -> Self {
        ReplySlotInner {
            state: Mutex::new(ReplyState::Pending),
            signal: Condvar::new(),
        }
    }
}

/// The outcome a blocking emitter observes after waiting on a [`ReplySlot`].
pub enum Outcome<R> {
    Replied(R),
    TimedOut,
    Failed(String),
}

/// One emitter-side half of the reply rendezvous: created when a blocking
/// molecule is emitted, paired with a [`ReplyHandle`] stored alongside the
/// value in the bag.
pub struct ReplySlot<R> {
    inner: Arc<ReplySlotInner<R>>,
}

impl<R> ReplySlot<R> {
    pub fn new() -> (Self, ReplyHandle<R>) {
        let inner = Arc::new(ReplySlotInner::new());
        (
            ReplySlot {
                inner: inner.clone(),
            },
            ReplyHandle {
                inner,
                used: AtomicBool::new(false),
            },
        )
    }

    /// Blocks the calling thread until replied, timed out, or failed.
    /// `deadline` of `None` waits indefinitely.
    pub fn wait(&self, deadline: Option<Instant>) -> Outcome<R> {
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                ReplyState::Pending => match deadline {
                    None => self.inner.signal.wait(&mut state),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            if matches!(&*state, ReplyState::Pending) {
                                *state = ReplyState::TimedOut;
                            }
                            continue;
                        }
                        self.inner.signal.wait_for(&mut state, deadline - now);
                    }
                },
                ReplyState::Replied(_) => {
                    let ReplyState::Replied(value) =
                        std::mem::replace(&mut *state, ReplyState::TimedOut)
                    else {
                        unreachable!()
                    };
                    return Outcome::Replied(value);
                }
                ReplyState::TimedOut => return Outcome::TimedOut,
                ReplyState::Failed(reason) => return Outcome::Failed(reason.clone()),
            }
        }
    }
}

/// The reaction-side half of the reply rendezvous. Bound into a reaction's
/// environment via [`crate::bindings::reply_handle`]; calling [`reply`] more
/// than once, or letting the handle drop without ever calling it, is a
/// [`RuntimeProtocolError`](crate::error::EmitError) surfaced to the
/// blocked emitter.
///
/// [`reply`]: ReplyHandle::reply
pub struct ReplyHandle<R> {
    inner: Arc<ReplySlotInner<R>>,
    used: AtomicBool,
}

impl<R> ReplyHandle<R> {
    /// Resolves the waiting emitter with `value`. A second call (from a
    /// cloned `Arc<ReplyHandle<R>>`, since the handle is shared through the
    /// type-erased bindings tuple) is dropped with a logged warning; so is
    /// a reply that arrives after the emitter already timed out.
    pub fn reply(&self, value: R) {
        if self.used.swap(true, Ordering::AcqRel) {
            tracing::warn!("reply invoked more than once; extra reply dropped");
            return;
        }
        let mut state = self.inner.state.lock();
        match &*state {
            ReplyState::Pending => {
                *state = ReplyState::Replied(value);
                drop(state);
                self.inner.signal.notify_all();
            }
            _ => {
                tracing::warn!(
                    "reply invoked after the emitter already observed an outcome; dropped"
                );
            }
        }
    }
}

impl<R> Drop for ReplyHandle<R> {
    fn drop(&mut self) {
        if self.used.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.inner.state.lock();
        if matches!(&*state, ReplyState::Pending) {
            *state = ReplyState::Failed(
                "reaction consumed the blocking molecule without ever calling reply".to_string(),
            );
            drop(state);
            self.inner.signal.notify_all();
            tracing::error!("runtime protocol violation: blocking molecule dropped without a reply");
        }
    }
}

pub fn deadline_from(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|d| Instant::now() + d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_wakes_waiter_with_value() {
        let (slot, handle) = ReplySlot::<i32>::new();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.reply(42);
        });
        match slot.wait(None) {
            Outcome::Replied(v) => assert_eq!(v, 42),
            _ => panic!("expected a reply"),
        }
        t.join().unwrap();
    }

    #[test]
    fn timeout_without_reply_returns_timed_out() {
        let (slot, _handle) = ReplySlot::<i32>::new();
        let deadline = deadline_from(Some(Duration::from_millis(20)));
        match slot.wait(deadline) {
            Outcome::TimedOut => {}
            _ => panic!("expected a timeout"),
        }
    }

    #[test]
    fn drop_without_reply_is_a_protocol_failure() {
        let (slot, handle) = ReplySlot::<i32>::new();
        drop(handle);
        match slot.wait(None) {
            Outcome::Failed(reason) => assert!(reason.contains("without ever calling reply")),
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn second_reply_is_dropped() {
        let (slot, handle) = ReplySlot::<i32>::new();
        handle.reply(1);
        handle.reply(2);
        match slot.wait(None) {
            Outcome::Replied(v) => assert_eq!(v, 1),
            _ => panic!("expected the first reply to win"),
        }
    }
}
