//! Convenience functions for simple fan-out/fan-in use cases.
//!
//! These take care of creating the channels, spawning the pool, sending the
//! sentinels, and reassembling the results in order.

use crate::channel::Channel;
use crate::message::Message;
use crate::worker::Pool;

/// Applies `f` to every input on a pool of `num_workers` worker threads and
/// returns the results in input order, regardless of completion order.
///
/// Each input is tagged with its enumeration index as the message `order`
/// key, dispatched to the pool over a shared channel, and the output channel
/// is drained through [`sorted`](crate::sort::sorted). To map over several
/// parallel sequences, zip them first.
///
/// If a worker panics, the panic is resumed on the calling thread after all
/// workers have been joined.
///
/// # Panics
///
/// Panics if `num_workers` is zero.
///
/// # Examples
///
/// ```
/// let outputs = ezq::util::map(4, (0..10u64).zip((1..=10u64).rev()), |(a, b)| a + b);
/// assert_eq!(vec![10; 10], outputs);
/// ```
pub fn map<I, O, Inputs, F>(num_workers: usize, inputs: Inputs, f: F) -> Vec<O>
where
    I: Send + 'static,
    O: Send + 'static,
    Inputs: IntoIterator<Item = I>,
    F: FnMut(I) -> O + Send + Clone + 'static,
{
    assert!(num_workers > 0, "map requires at least one worker");
    let input: Channel<I> = Channel::new();
    let output: Channel<O> = Channel::new();
    let pool = Pool::spawn(num_workers, |_| {
        let (input, output, mut f) = (input.clone(), output.clone(), f.clone());
        move || {
            for msg in input.messages() {
                output.send(Message::new(f(msg.data)).with_order(msg.order));
            }
        }
    });
    for (index, data) in inputs.into_iter().enumerate() {
        input.send(Message::new(data).with_order(index as u64));
    }
    if let Err(panic) = input.stop(pool) {
        panic.resume();
    }
    output.sorted().map(|msg| msg.data).collect()
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_map() {
        let outputs = super::map(4, 0..100, |i| i + 1);
        assert_eq!((1..=100).collect::<Vec<_>>(), outputs);
    }

    #[test]
    fn test_map_single_worker() {
        let outputs = super::map(1, 0..10u64, |i| i * i);
        assert_eq!(vec![0, 1, 4, 9, 16, 25, 36, 49, 64, 81], outputs);
    }

    #[test]
    fn test_map_preserves_order_under_reverse_completion() {
        // one worker per input; earlier inputs sleep longer, so results
        // arrive on the output channel in roughly reverse submission order
        let outputs = super::map(10, (0..10u64).zip((1..=10u64).rev()), |(a, b)| {
            thread::sleep(Duration::from_millis(b * 3));
            a + b
        });
        assert_eq!(vec![10; 10], outputs);
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_map_resumes_worker_panic() {
        super::map(2, 0..10, |i| if i == 5 { panic!("boom") } else { i });
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_map_rejects_zero_workers() {
        super::map(0, 0..10, |i| i);
    }
}
