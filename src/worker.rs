//! Worker threads and the pool lifecycle protocol.
//!
//! A [`Worker`] wraps an OS thread that starts eagerly and runs a single
//! function to completion; [`join`](Worker::join) blocks until it returns. A
//! [`Pool`] is a fixed set of workers, typically all consuming the same
//! input [`Channel`](crate::channel::Channel). The pool is shut down with
//! [`Channel::stop`](crate::channel::Channel::stop), which sends one
//! sentinel per worker and joins them all - the synchronization barrier that
//! guarantees no further output is in flight once it returns.

use crate::panic::Panic;
use std::thread::{self, JoinHandle};

/// Returns the number of CPUs on this machine.
///
/// This is the sensible worker count for CPU-bound pools and is only ever a
/// default; the crate is agnostic to the number actually chosen.
pub fn num_cpus() -> usize {
    ::num_cpus::get()
}

/// Returns the default worker count for I/O-bound pools: `num_cpus() + 4`,
/// capped at 32.
pub fn num_threads() -> usize {
    32.min(num_cpus() + 4)
}

/// Runs `f` on a new worker thread.
///
/// The thread starts immediately. Dropping the returned [`Worker`] detaches
/// it; call [`join`](Worker::join) to wait for `f` to return.
pub fn run<F>(f: F) -> Worker
where
    F: FnOnce() + Send + 'static,
{
    Worker::spawn("ezq-worker".into(), f)
}

/// Handle to a running worker thread.
pub struct Worker {
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn<F>(name: String, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(f)
            .expect("failed to spawn worker thread");
        Worker { handle }
    }

    /// Returns `true` if the worker's function has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker's function returns.
    ///
    /// For a typical worker this means its input channel's message iterator
    /// reached a sentinel. If the function panicked, the captured payload is
    /// returned as a [`Panic`].
    pub fn join(self) -> Result<(), Panic> {
        self.handle.join().map_err(Panic::new)
    }
}

/// A fixed-size set of [`Worker`]s.
pub struct Pool {
    workers: Vec<Worker>,
}

impl Pool {
    /// Spawns `count` numbered workers.
    ///
    /// `factory` is called once per worker with the worker's index (0-based)
    /// and returns the function that worker will run. All threads are
    /// started eagerly, before this returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use ezq::{Channel, Pool};
    ///
    /// let q: Channel<u64> = Channel::new();
    /// let pool = Pool::spawn(4, |index| {
    ///     let q = q.clone();
    ///     move || {
    ///         for msg in q.messages() {
    ///             // numbered workers can partition work by index
    ///             let _ = (index, msg.data);
    ///         }
    ///     }
    /// });
    /// (0..100).for_each(|i| q.put(i));
    /// q.stop(pool).unwrap();
    /// ```
    pub fn spawn<F, W>(count: usize, mut factory: F) -> Self
    where
        F: FnMut(usize) -> W,
        W: FnOnce() + Send + 'static,
    {
        let workers = (0..count)
            .map(|index| Worker::spawn(format!("ezq-worker-{index}"), factory(index)))
            .collect();
        Pool { workers }
    }

    /// Returns the number of workers in this pool, including finished ones.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` if this pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Blocks until every worker's function has returned.
    ///
    /// Every worker is joined even if some panicked; the first captured
    /// panic is returned afterwards, so this is a complete barrier either
    /// way.
    pub fn join(self) -> Result<(), Panic> {
        let mut first = None;
        for worker in self.workers {
            if let Err(panic) = worker.join() {
                first.get_or_insert(panic);
            }
        }
        match first {
            Some(panic) => Err(panic),
            None => Ok(()),
        }
    }
}

impl From<Worker> for Pool {
    fn from(worker: Worker) -> Self {
        Pool {
            workers: vec![worker],
        }
    }
}

impl From<Vec<Worker>> for Pool {
    fn from(workers: Vec<Worker>) -> Self {
        Pool { workers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;

    fn summer(q: &Channel<u64>, out: &Channel<u64>) -> impl FnOnce() + Send + 'static {
        let (q, out) = (q.clone(), out.clone());
        move || {
            let total: u64 = q.messages().map(|msg| msg.data).sum();
            out.put(total);
        }
    }

    #[test]
    fn test_stop_joins_all_workers() {
        let q: Channel<u64> = Channel::new();
        let out = Channel::new();
        let pool = Pool::spawn(4, |_| summer(&q, &out));
        assert_eq!(4, pool.len());
        q.stop(pool).unwrap();
        // one partial sum per worker, even though no work was sent
        assert_eq!(4, out.drain().count());
    }

    #[test]
    fn test_fan_out_sum() {
        for count in [1, num_cpus()] {
            let q = Channel::new();
            let out = Channel::new();
            let pool = Pool::spawn(count, |_| summer(&q, &out));
            for i in 0..1000 {
                q.put(i);
            }
            q.stop(pool).unwrap();
            let total: u64 = out.drain().map(|msg| msg.data).sum();
            assert_eq!(499_500, total, "{count} workers");
        }
    }

    #[test]
    fn test_stop_single_worker() {
        let q: Channel<u64> = Channel::new();
        let out = Channel::new();
        let worker = run(summer(&q, &out));
        q.put(7);
        q.stop(worker).unwrap();
        assert_eq!(Some(7), out.drain().next().map(|msg| msg.data));
    }

    #[test]
    fn test_join_reports_panic() {
        let worker = run(|| panic!("boom"));
        let panic = worker.join().unwrap_err();
        assert_eq!(Some("boom"), panic.message());
    }

    #[test]
    fn test_stop_joins_remaining_workers_after_panic() {
        let q: Channel<u64> = Channel::new();
        let out = Channel::new();
        let pool = Pool::spawn(3, |index| {
            let (q, out) = (q.clone(), out.clone());
            move || {
                if index == 1 {
                    panic!("boom");
                }
                out.put(q.messages().count() as u64);
            }
        });
        let panic = q.stop(pool).unwrap_err();
        assert_eq!(Some("boom"), panic.message());
        // the two surviving workers still ran to completion
        assert_eq!(2, out.drain().count());
    }

    #[test]
    fn test_is_finished() {
        let q: Channel<u64> = Channel::new();
        let worker = run({
            let q = q.clone();
            move || q.messages().for_each(drop)
        });
        assert!(!worker.is_finished());
        q.end();
        worker.join().unwrap();
    }

    #[test]
    fn test_num_threads_is_capped() {
        assert!(num_threads() <= 32);
        assert!(num_threads() > num_cpus().min(28));
    }
}
