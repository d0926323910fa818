use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::error::PoolError;

type Task = Box<dyn FnOnce() + Send>;

/// An RAII token returned by [`ThreadPoolContract::enter_idle`]. Dropping it
/// ends the idle scope. Pools that cannot grow (like
/// [`FixedPool`]) hand out a no-op guard.
pub struct IdleGuard {
    _inner: Option<Box<dyn Send>>,
}

impl IdleGuard {
    fn noop() -> Self {
        IdleGuard { _inner: None }
    }
}

/// The interface a pool must provide to run join-definition decision passes
/// or reaction bodies. See [`mark_idle`] for the scoped-growth helper built
/// on [`enter_idle`](ThreadPoolContract::enter_idle).
pub trait ThreadPoolContract: Send + Sync {
    /// Submits `task` for execution. Fails fast (rather than silently
    /// dropping) if the pool cannot accept more work.
    fn submit(&self, task: Task) -> Result<(), PoolError>;

    /// Marks the calling worker as idle for the duration of the returned
    /// guard, so the pool can (if it supports it) temporarily grow to make
    /// up the lost capacity.
    fn enter_idle(&self) -> IdleGuard;

    fn shutdown_now(&self);
}

/// Runs `scope` with the pool told that this worker is momentarily idle
/// (blocked on I/O or a reply), so blocking-aware pools can backfill
/// capacity for the duration.
pub fn mark_idle<R>(pool: &dyn ThreadPoolContract, scope: impl FnOnce() -> R) -> R {
    let _guard = pool.enter_idle();
    scope()
}

/// A fixed-size pool backed by `rayon`. Cannot grow: a reaction pool built
/// from this alone will deadlock if every worker ends up blocked on an
/// unsatisfied blocking molecule (see the hard requirement in the
/// concurrency model). Suitable for the decision pool, which never blocks
/// itself absent a misbehaving guard.
pub struct FixedPool {
    pool: rayon::ThreadPool,
}

impl FixedPool {
    pub fn new(size: usize) -> Arc<dyn ThreadPoolContract> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size.max(1))
            .thread_name(|i| format!("joinrun-fixed-{i}"))
            .build()
            .expect("failed to build fixed thread pool");
        Arc::new(FixedPool { pool })
    }
}

impl ThreadPoolContract for FixedPool {
    fn submit(&self, task: Task) -> Result<(), PoolError> {
        self.pool.spawn(move || task());
        Ok(())
    }

    fn enter_idle(&self) -> IdleGuard {
        IdleGuard::noop()
    }

    fn shutdown_now(&self) {
        // rayon pools drain and stop when dropped; nothing to do eagerly.
    }
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    queue_not_empty: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn worker_loop(self: Arc<Self>, retire: Arc<AtomicBool>) {
        loop {
            let mut queue = self.queue.lock();
            loop {
                if self.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    drop(queue);
                    task();
                    if retire.load(Ordering::Acquire) {
                        return;
                    }
                    break;
                }
                if retire.load(Ordering::Acquire) {
                    return;
                }
                self.queue_not_empty
                    .wait_for(&mut queue, std::time::Duration::from_millis(50));
            }
        }
    }
}

/// A pool built on plain OS threads whose `enter_idle` spawns one
/// supplementary worker for the duration of the scope, so that a reaction
/// pool fully occupied by reactions blocked on replies does not starve the
/// reactions that would unblock them. `rayon`'s pool is a fixed size by
/// design, so this worker-augmentation scheme is implemented directly on
/// `std::thread` rather than by trying to resize a `rayon::ThreadPool`.
pub struct BlockingAwarePool {
    shared: Arc<Shared>,
    core_retire_flags: Vec<Arc<AtomicBool>>,
}

impl BlockingAwarePool {
    pub fn new(initial: usize) -> Arc<dyn ThreadPoolContract> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            queue_not_empty: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let mut core_retire_flags = Vec::with_capacity(initial.max(1));
        for i in 0..initial.max(1) {
            let retire = Arc::new(AtomicBool::new(false));
            core_retire_flags.push(retire.clone());
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("joinrun-blocking-{i}"))
                .spawn(move || shared.worker_loop(retire))
                .expect("failed to spawn blocking-aware pool worker");
        }
        Arc::new(BlockingAwarePool {
            shared,
            core_retire_flags,
        })
    }
}

struct HelperWorker {
    retire: Arc<AtomicBool>,
}

impl Drop for HelperWorker {
    fn drop(&mut self) {
        self.retire.store(true, Ordering::Release);
    }
}

impl ThreadPoolContract for BlockingAwarePool {
    fn submit(&self, task: Task) -> Result<(), PoolError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::ShuttingDown);
        }
        self.shared.queue.lock().push_back(task);
        self.shared.queue_not_empty.notify_one();
        Ok(())
    }

    fn enter_idle(&self) -> IdleGuard {
        let retire = Arc::new(AtomicBool::new(false));
        let shared = self.shared.clone();
        let spawned_retire = retire.clone();
        let handle = thread::Builder::new()
            .name("joinrun-blocking-helper".to_string())
            .spawn(move || shared.worker_loop(spawned_retire));
        match handle {
            Ok(_join_handle) => IdleGuard {
                _inner: Some(Box::new(HelperWorker { retire })),
            },
            Err(e) => {
                tracing::warn!("failed to spawn idle-compensation worker: {e}");
                IdleGuard::noop()
            }
        }
    }

    fn shutdown_now(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for flag in &self.core_retire_flags {
            flag.store(true, Ordering::Release);
        }
        self.shared.queue_not_empty.notify_all();
    }
}

pub fn new_fixed_pool(size: usize) -> Arc<dyn ThreadPoolContract> {
    FixedPool::new(size)
}

pub fn new_blocking_aware_pool(initial: usize) -> Arc<dyn ThreadPoolContract> {
    BlockingAwarePool::new(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn fixed_pool_runs_submitted_tasks() {
        let pool = new_fixed_pool(2);
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || tx.send(7).unwrap())).unwrap();
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), 7);
    }

    #[test]
    fn blocking_aware_pool_runs_submitted_tasks() {
        let pool = new_blocking_aware_pool(2);
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || tx.send(9).unwrap())).unwrap();
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), 9);
        pool.shutdown_now();
    }

    #[test]
    fn mark_idle_keeps_pool_responsive_under_full_occupancy() {
        let pool = new_blocking_aware_pool(1);
        let (unblock_tx, unblock_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let pool_for_task = pool.clone();
        pool.submit(Box::new(move || {
            mark_idle(pool_for_task.as_ref(), || {
                unblock_rx.recv().unwrap();
            });
        }))
        .unwrap();
        // With only one core worker busy waiting above, this second task
        // can only complete if `enter_idle` actually backfilled capacity.
        pool.submit(Box::new(move || {
            done_tx.send(()).unwrap();
        }))
        .unwrap();
        assert!(done_rx.recv_timeout(std::time::Duration::from_secs(1)).is_ok());
        unblock_tx.send(()).unwrap();
        pool.shutdown_now();
    }
}
