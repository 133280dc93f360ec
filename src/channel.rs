//! A multi-producer, multi-consumer FIFO of [`Message`]s.
//!
//! A [`Channel`] is cheap to clone; every clone is another handle to the same
//! underlying queue, which is destroyed when the last handle is dropped. Any
//! number of threads may send and receive concurrently - the channel is the
//! only shared mutable state in this crate, and it never holds a lock across
//! a blocking wait (that guarantee is delegated to the backend).
//!
//! The backend is a configuration option, not a behavioral difference: by
//! default `crossbeam-channel` is used, and the `flume` or `loole` features
//! select those implementations instead. At most one backend feature may be
//! enabled.
//!
//! # Termination protocol
//!
//! [`Channel::end`] enqueues one sentinel, and each sentinel terminates
//! exactly one [`Channel::messages`] iterator. This is the fan-out
//! mechanism: a pool of N workers each iterating the same channel needs
//! exactly N sentinels to shut down. Sending fewer leaves workers blocked
//! forever; sending more leaves surplus sentinels in the queue for any
//! subsequent reader to consume (harmless but wasteful).

use crate::message::{Envelope, Message};
use crate::sort::{sorted, Sorted};
use crate::worker::Pool;
use crate::Panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prelude::*;

#[cfg(not(any(feature = "flume", feature = "loole")))]
mod prelude {
    pub use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
}

#[cfg(all(feature = "flume", not(feature = "loole")))]
mod prelude {
    pub use flume::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
}

#[cfg(all(feature = "loole", not(feature = "flume")))]
mod prelude {
    pub use loole::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
}

/// How long a blocking receive waits before re-checking for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A FIFO queue of [`Message`]s shared between any number of producers and
/// consumers.
pub struct Channel<T> {
    tx: Sender<Envelope<T>>,
    rx: Receiver<Envelope<T>>,
}

impl<T> Channel<T> {
    /// Creates a new, empty channel.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Channel { tx, rx }
    }

    /// Enqueues a message without blocking.
    pub fn send(&self, msg: Message<T>) {
        self.push(Envelope::Data(msg));
    }

    /// Enqueues `data` wrapped in a default [`Message`] without blocking.
    pub fn put(&self, data: T) {
        self.send(Message::new(data));
    }

    /// Enqueues one end-of-stream sentinel. Each sentinel terminates exactly
    /// one [`messages`](Self::messages) iterator.
    pub fn end(&self) {
        self.push(Envelope::End);
    }

    fn push(&self, envelope: Envelope<T>) {
        // cannot disconnect: this handle holds a receiver of its own, so the
        // queue outlives every sender
        let _ = self.tx.send(envelope);
    }

    /// Returns the number of envelopes currently queued, including any
    /// unconsumed sentinels.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no envelopes are currently queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Returns a blocking iterator over the messages in this channel.
    ///
    /// The iterator polls the queue in bounded slices, treating a momentarily
    /// empty queue as a transient condition to retry. It terminates when it
    /// consumes one sentinel (which is never yielded) or when the channel
    /// disconnects. Multiple threads may iterate the same channel
    /// concurrently; each message goes to exactly one of them.
    pub fn messages(&self) -> Messages<T> {
        Messages {
            rx: self.rx.clone(),
            cancel: None,
            blocking: true,
            done: false,
        }
    }

    /// Like [`messages`](Self::messages), but also stops (without consuming a
    /// sentinel) once `cancel` is set.
    ///
    /// The token is checked between poll slices, so a blocked iterator
    /// notices cancellation within the poll interval (50ms).
    pub fn messages_until(&self, cancel: &Cancel) -> Messages<T> {
        Messages {
            rx: self.rx.clone(),
            cancel: Some(cancel.clone()),
            blocking: true,
            done: false,
        }
    }

    /// Ends this channel and returns a non-blocking iterator over the
    /// messages already queued.
    ///
    /// The iterator stops at the first sentinel or as soon as the queue is
    /// momentarily empty, so it must not race with live producers; call
    /// [`stop`](Self::stop) on the input channel first.
    pub fn drain(&self) -> Messages<T> {
        self.end();
        Messages {
            rx: self.rx.clone(),
            cancel: None,
            blocking: false,
            done: false,
        }
    }

    /// Ends this channel and returns an iterator over its messages in
    /// ascending [`order`](Message::order), starting from key 0.
    ///
    /// This is [`messages`](Self::messages) composed with
    /// [`sorted`](crate::sort::sorted): results produced out of order by a
    /// worker pool come out in submission order, with only out-of-order runs
    /// ever buffered.
    pub fn sorted(&self) -> Sorted<Messages<T>, fn(&Message<T>) -> u64> {
        self.end();
        sorted(self.messages(), 0, order_key::<T> as fn(&Message<T>) -> u64)
    }

    /// Tells `workers` to finish and blocks until every one of them has.
    ///
    /// Sends exactly one sentinel per worker, then joins them all. When this
    /// returns, no further output will arrive on any channel fed by these
    /// workers, so it is safe to [`end`](Self::end) or
    /// [`sorted`](Self::sorted) an output channel next.
    ///
    /// If any worker panicked, the first captured panic is returned - but
    /// only after every worker has been joined, so the barrier holds even on
    /// failure. A worker that never observes its sentinel (e.g. one that
    /// stopped reading its input channel) blocks this call forever; that
    /// liveness hazard is inherent to the protocol and is not detected.
    pub fn stop(&self, workers: impl Into<Pool>) -> Result<(), Panic> {
        let pool = workers.into();
        for _ in 0..pool.len() {
            self.end();
        }
        pool.join()
    }
}

fn order_key<T>(msg: &Message<T>) -> u64 {
    msg.order
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a Channel<T> {
    type Item = Message<T>;
    type IntoIter = Messages<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages()
    }
}

/// Iterator over the messages in a [`Channel`], created by
/// [`Channel::messages`], [`Channel::messages_until`], or [`Channel::drain`].
///
/// The iterator is finite and non-restartable: once it has consumed a
/// sentinel (or been cancelled) it yields `None` forever.
pub struct Messages<T> {
    rx: Receiver<Envelope<T>>,
    cancel: Option<Cancel>,
    blocking: bool,
    done: bool,
}

impl<T> Iterator for Messages<T> {
    type Item = Message<T>;

    fn next(&mut self) -> Option<Message<T>> {
        while !self.done {
            if self.cancel.as_ref().is_some_and(Cancel::is_set) {
                break;
            }
            if self.blocking {
                match self.rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Envelope::Data(msg)) => return Some(msg),
                    // the queue might not actually be empty; poll again
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(Envelope::End) | Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.rx.try_recv() {
                    Ok(Envelope::Data(msg)) => return Some(msg),
                    Ok(Envelope::End) => break,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        self.done = true;
        None
    }
}

/// A cancellation token for cooperatively stopping consumer loops.
///
/// Cloning a `Cancel` creates another handle to the same flag. Cancellation
/// is advisory, not preemptive: a [`Messages`] iterator created with
/// [`Channel::messages_until`] checks the token between poll slices, and a
/// long-running worker may check [`is_set`](Self::is_set) itself.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    /// Creates a new, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the token. Every clone observes the change.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if the token has been set.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker;

    #[test]
    fn test_messages_consumes_one_sentinel() {
        let q = Channel::new();
        for _ in 0..1000 {
            q.put(1u64);
        }
        q.end();
        let total: u64 = q.messages().map(|msg| msg.data).sum();
        assert_eq!(1000, total);
    }

    #[test]
    fn test_messages_stops_at_sentinel() {
        let q = Channel::new();
        q.put("a");
        q.end();
        q.put("b");
        let first: Vec<_> = q.messages().map(|msg| msg.data).collect();
        assert_eq!(vec!["a"], first);
        // the message after the sentinel is still there for a later reader
        let rest: Vec<_> = q.drain().map(|msg| msg.data).collect();
        assert_eq!(vec!["b"], rest);
    }

    #[test]
    fn test_surplus_sentinels_are_harmless() {
        let q = Channel::<u8>::new();
        q.end();
        q.end();
        assert_eq!(0, q.messages().count());
        assert_eq!(0, q.messages().count());
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_does_not_block() {
        let q = Channel::new();
        for i in 0..10 {
            q.put(i);
        }
        let drained: Vec<_> = q.drain().map(|msg| msg.data).collect();
        assert_eq!((0..10).collect::<Vec<_>>(), drained);
    }

    #[test]
    fn test_cancel_set_before_iteration() {
        let q = Channel::new();
        q.put(1);
        let cancel = Cancel::new();
        cancel.set();
        assert_eq!(0, q.messages_until(&cancel).count());
        // the message was not consumed
        assert_eq!(1, q.len());
    }

    #[test]
    fn test_cancel_unblocks_waiting_consumer() {
        let q = Channel::<u8>::new();
        let cancel = Cancel::new();
        let consumer = {
            let (q, cancel) = (q.clone(), cancel.clone());
            worker::run(move || {
                // no sentinel is ever sent; only the token can stop this
                assert_eq!(0, q.messages_until(&cancel).count());
            })
        };
        cancel.set();
        assert!(consumer.join().is_ok());
    }

    #[test]
    fn test_sorted_restores_order() {
        let q = Channel::new();
        for order in [3u64, 0, 2, 4, 1] {
            q.send(Message::new(()).with_order(order));
        }
        let keys: Vec<_> = q.sorted().map(|msg| msg.order).collect();
        assert_eq!(vec![0, 1, 2, 3, 4], keys);
    }

    #[test]
    fn test_sorted_with_gap() {
        // orders 990..995 are missing; the tail is flushed at the end
        let q = Channel::new();
        let orders: Vec<u64> = (0..990).chain(995..1000).collect();
        for &order in orders.iter().rev() {
            q.send(Message::new(()).with_order(order));
        }
        let keys: Vec<_> = q.sorted().map(|msg| msg.order).collect();
        assert_eq!(orders, keys);
    }
}
