use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use relaylink_frame::Frame;

/// The single pending-reply correlation point of a session.
///
/// A caller arms the slot before writing its request; the reassembler hands
/// the next valid frame to whoever armed it. Frames that arrive while the
/// slot is empty have no owner and are discarded by the caller of
/// [`ReplySlot::deliver`].
#[derive(Default)]
pub(crate) struct ReplySlot {
    waiter: Mutex<Option<SyncSender<Frame>>>,
}

impl ReplySlot {
    /// Install a fresh waiter, replacing any previous one.
    pub(crate) fn arm(&self) -> Receiver<Frame> {
        let (tx, rx) = sync_channel(1);
        *lock(&self.waiter) = Some(tx);
        rx
    }

    /// Hand `frame` to the armed waiter. Returns false if nobody took it.
    pub(crate) fn deliver(&self, frame: Frame) -> bool {
        match lock(&self.waiter).take() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter; a blocked receiver wakes up disconnected.
    pub(crate) fn disarm(&self) {
        lock(&self.waiter).take();
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
