//! Reassembly of an out-of-order stream into key order.
//!
//! Workers pulling from a shared channel finish in whatever order the
//! scheduler allows, so results keyed by submission index arrive scrambled.
//! [`sorted`] wraps any iterator of keyed items and yields them in
//! non-decreasing key order, holding an item back only as long as necessary:
//! an item whose key is the next one expected passes straight through
//! without ever being buffered, so an already-ordered stream costs nothing.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Yields the items of `items` in non-decreasing order of the key returned
/// by `key`, starting from `start`.
///
/// Each input item is yielded exactly once. Items arriving ahead of a
/// missing key are buffered until the run becomes contiguous again; when the
/// input ends, anything still buffered is flushed in ascending key order
/// regardless of gaps. This makes the adapter a draining mechanism, not a
/// blocking one: it never waits for a key that will not arrive, but items
/// after a permanent gap only surface once the input is exhausted.
///
/// Duplicate keys are tolerated and yielded in arrival order. A key below
/// the expected one (already passed) can never rejoin the run and surfaces
/// only in the final flush, out of true order.
///
/// # Examples
///
/// ```
/// let keys = [2u64, 0, 1, 4, 3];
/// let in_order: Vec<u64> = ezq::sorted(keys, 0, |k| *k).collect();
/// assert_eq!(vec![0, 1, 2, 3, 4], in_order);
/// ```
pub fn sorted<I, F>(items: I, start: u64, key: F) -> Sorted<I::IntoIter, F>
where
    I: IntoIterator,
    F: Fn(&I::Item) -> u64,
{
    Sorted {
        items: items.into_iter(),
        key,
        next_key: start,
        seq: 0,
        pending: BinaryHeap::new(),
        done: false,
    }
}

/// Iterator adapter returned by [`sorted`].
pub struct Sorted<I: Iterator, F> {
    items: I,
    key: F,
    /// The key the next yielded item must have while the input is live.
    next_key: u64,
    /// Arrival counter; breaks ties between duplicate keys.
    seq: u64,
    pending: BinaryHeap<Entry<I::Item>>,
    done: bool,
}

impl<I: Iterator, F> Sorted<I, F> {
    /// Returns the number of items currently held back waiting for an
    /// earlier key to arrive.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

impl<I, F> Iterator for Sorted<I, F>
where
    I: Iterator,
    F: Fn(&I::Item) -> u64,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        // emit from the buffer first: either the run continues, or the input
        // has ended and whatever is left drains in key order
        if let Some(entry) = self.pending.peek() {
            if self.done || entry.key == self.next_key {
                let entry = self.pending.pop()?;
                self.next_key = self.next_key.max(entry.key + 1);
                return Some(entry.item);
            }
        }
        if self.done {
            return None;
        }
        for item in self.items.by_ref() {
            let key = (self.key)(&item);
            if self.pending.is_empty() && key == self.next_key {
                // fast path: the stream is in order, nothing to buffer
                self.next_key += 1;
                return Some(item);
            }
            self.pending.push(Entry {
                key,
                seq: self.seq,
                item,
            });
            self.seq += 1;
            if self.pending.peek().map(|entry| entry.key) == Some(self.next_key) {
                let entry = self.pending.pop()?;
                self.next_key = entry.key + 1;
                return Some(entry.item);
            }
        }
        self.done = true;
        self.pending.pop().map(|entry| entry.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.items.size_hint();
        let buffered = self.pending.len();
        (lower + buffered, upper.map(|upper| upper + buffered))
    }
}

/// A held-back item. Ordered as a min-heap entry: the smallest `(key, seq)`
/// pair is the heap maximum, so `peek`/`pop` return the earliest item.
struct Entry<T> {
    key: u64,
    seq: u64,
    item: T,
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.key, other.seq).cmp(&(self.key, self.seq))
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.key, self.seq) == (other.key, other.seq)
    }
}

impl<T> Eq for Entry<T> {}
