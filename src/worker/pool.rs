//! Fixed-queue worker pool
//!
//! Workers share one bounded job channel. A full queue drops the
//! submitted job rather than blocking the caller. Each worker also
//! carries a private retire channel so individual workers can be
//! stopped without disturbing the rest of the pool; a retire signal is
//! only observed between jobs, so in-flight work always completes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use crossbeam_utils::CachePadded;
use log::{debug, warn};

use crate::error::CacheError;

/// Unit of work executed on a pool thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct WorkerHandle {
    retire_tx: Sender<()>,
    thread: std::thread::JoinHandle<()>,
}

/// Pool of named worker threads draining a shared bounded queue.
pub struct WorkerPool {
    job_tx: Sender<Job>,
    job_rx: Receiver<Job>,
    workers: Mutex<Vec<WorkerHandle>>,
    worker_count: CachePadded<AtomicUsize>,
    next_worker_id: AtomicUsize,
    jobs_dropped: CachePadded<AtomicU64>,
}

impl WorkerPool {
    /// Create a pool with `initial` workers and the given queue bound.
    pub fn new(initial: usize, queue_capacity: usize) -> Result<Self, CacheError> {
        let (job_tx, job_rx) = bounded(queue_capacity);
        let pool = Self {
            job_tx,
            job_rx,
            workers: Mutex::new(Vec::new()),
            worker_count: CachePadded::new(AtomicUsize::new(0)),
            next_worker_id: AtomicUsize::new(0),
            jobs_dropped: CachePadded::new(AtomicU64::new(0)),
        };
        for _ in 0..initial {
            pool.spawn_worker()?;
        }
        Ok(pool)
    }

    /// Enqueue a job; returns false (and counts the drop) on a full or
    /// closed queue.
    pub fn submit(&self, job: Job) -> bool {
        match self.job_tx.try_send(job) {
            Ok(()) => true,
            Err(_) => {
                let dropped = self.jobs_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("worker queue full, job dropped (total dropped: {})", dropped);
                false
            }
        }
    }

    /// Add one worker thread to the pool.
    pub fn spawn_worker(&self) -> Result<(), CacheError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let job_rx = self.job_rx.clone();
        let (retire_tx, retire_rx) = bounded(1);
        let thread = std::thread::Builder::new()
            .name(format!("loggerhead-worker-{}", id))
            .spawn(move || Self::worker_loop(job_rx, retire_rx))
            .map_err(|e| CacheError::storage(format!("spawn worker: {}", e)))?;

        let mut workers = self.lock_workers();
        workers.push(WorkerHandle { retire_tx, thread });
        self.worker_count.store(workers.len(), Ordering::Relaxed);
        debug!("worker {} started ({} active)", id, workers.len());
        Ok(())
    }

    /// Retire one worker. The worker finishes its current job before
    /// exiting. No-op on an empty pool.
    pub fn scale_down(&self) {
        let handle = {
            let mut workers = self.lock_workers();
            let handle = workers.pop();
            self.worker_count.store(workers.len(), Ordering::Relaxed);
            handle
        };
        if let Some(handle) = handle {
            let _ = handle.retire_tx.send(());
            if handle.thread.join().is_err() {
                warn!("worker thread panicked during retirement");
            }
        }
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Relaxed)
    }

    /// Jobs dropped because the queue was full.
    pub fn jobs_dropped(&self) -> u64 {
        self.jobs_dropped.load(Ordering::Relaxed)
    }

    /// Jobs currently waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.job_tx.len()
    }

    /// Retire every worker and join the threads. Queued jobs that no
    /// worker picked up before retirement are discarded.
    pub fn shutdown(&self) {
        let handles: Vec<WorkerHandle> = {
            let mut workers = self.lock_workers();
            self.worker_count.store(0, Ordering::Relaxed);
            workers.drain(..).collect()
        };
        for handle in &handles {
            let _ = handle.retire_tx.send(());
        }
        for handle in handles {
            if handle.thread.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<WorkerHandle>> {
        self.workers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn worker_loop(job_rx: Receiver<Job>, retire_rx: Receiver<()>) {
        loop {
            select! {
                recv(job_rx) -> msg => match msg {
                    Ok(job) => job(),
                    Err(_) => break,
                },
                recv(retire_rx) -> _ => break,
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn jobs_run_on_pool_threads() {
        let pool = WorkerPool::new(2, 16).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            assert!(pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        }
        // Workers drain the queue shortly after submission.
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 8 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        pool.shutdown();
    }

    #[test]
    fn full_queue_drops_jobs() {
        // No workers, so nothing drains the two-slot queue.
        let pool = WorkerPool::new(0, 2).unwrap();
        assert!(pool.submit(Box::new(|| {})));
        assert!(pool.submit(Box::new(|| {})));
        assert!(!pool.submit(Box::new(|| {})));
        assert_eq!(pool.jobs_dropped(), 1);
    }

    #[test]
    fn scale_down_finishes_current_job() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let done = Arc::new(AtomicU32::new(0));
        let done_clone = Arc::clone(&done);
        pool.submit(Box::new(move || {
            std::thread::sleep(Duration::from_millis(50));
            done_clone.fetch_add(1, Ordering::SeqCst);
        }));
        std::thread::sleep(Duration::from_millis(10));
        pool.scale_down();
        assert_eq!(pool.worker_count(), 0);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_worker_drains_already_queued_jobs() {
        let pool = WorkerPool::new(0, 4).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            assert!(pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        pool.spawn_worker().unwrap();
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn worker_count_tracks_spawn_and_retire() {
        let pool = WorkerPool::new(2, 4).unwrap();
        assert_eq!(pool.worker_count(), 2);
        pool.spawn_worker().unwrap();
        assert_eq!(pool.worker_count(), 3);
        pool.scale_down();
        assert_eq!(pool.worker_count(), 2);
        pool.shutdown();
        assert_eq!(pool.worker_count(), 0);
    }
}
