//! Fan work out to a pool of parallel workers over a message [`Channel`],
//! signal the workers to stop, and reassemble their results in a
//! caller-defined order even though the workers complete out of order.
//!
//! Three primitives do all the work:
//! * [`Channel`]: a multi-producer, multi-consumer FIFO of [`Message`]s with
//!   a sentinel-based termination protocol - one sentinel ends exactly one
//!   consumer, so a pool of N workers is stopped with N sentinels.
//! * [`sorted`]: an iterator adapter that turns an out-of-order stream of
//!   sequence-keyed items back into key order with minimal buffering.
//! * [`Pool`]/[`run`]: eagerly-started worker threads and the
//!   [`Channel::stop`] barrier that sends the sentinels and joins them all.
//!
//! [`util::map`] composes the three for the common case of applying a
//! function to a batch of inputs in parallel while keeping the output order.
//!
//! There are optional features for the channel backend (at most one may be
//! enabled; `crossbeam-channel` is used by default):
//! * `flume`: use `flume`'s channels.
//! * `loole`: use `loole`'s channels.
//!
//! # Examples
//!
//! Sum the numbers 0..1000 across one worker per CPU:
//!
//! ```
//! use ezq::{num_cpus, Channel, Pool};
//!
//! let q: Channel<u64> = Channel::new();
//! let out: Channel<u64> = Channel::new();
//! let pool = Pool::spawn(num_cpus(), |_| {
//!     let (q, out) = (q.clone(), out.clone());
//!     move || {
//!         // each worker sums its share of the messages
//!         out.put(q.messages().map(|msg| msg.data).sum());
//!     }
//! });
//!
//! for i in 0..1000 {
//!     q.put(i);
//! }
//! q.stop(pool).unwrap();
//!
//! let total: u64 = out.drain().map(|msg| msg.data).sum();
//! assert_eq!(499_500, total);
//! ```
//!
//! Workers finish out of order, but results tagged with an `order` key come
//! back in submission order through [`Channel::sorted`]:
//!
//! ```
//! use ezq::{Channel, Message, Pool};
//!
//! let q: Channel<u64> = Channel::new();
//! let out: Channel<u64> = Channel::new();
//! let pool = Pool::spawn(4, |_| {
//!     let (q, out) = (q.clone(), out.clone());
//!     move || {
//!         for msg in &q {
//!             out.send(Message::new(msg.data * 2).with_order(msg.order));
//!         }
//!     }
//! });
//!
//! for i in 0..10 {
//!     q.send(Message::new(i).with_order(i));
//! }
//! q.stop(pool).unwrap();
//!
//! let doubled: Vec<u64> = out.sorted().map(|msg| msg.data).collect();
//! assert_eq!(vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18], doubled);
//! ```

pub mod channel;
mod message;
mod panic;
pub mod sort;
pub mod util;
pub mod worker;

pub use channel::{Cancel, Channel, Messages};
pub use message::Message;
pub use panic::Panic;
pub use sort::{sorted, Sorted};
pub use worker::{num_cpus, num_threads, run, Pool, Worker};
