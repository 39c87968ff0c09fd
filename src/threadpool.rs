//! Fixed-size collaborator thread pool with an inline-execution
//! backpressure valve.
//!
//! A bounded number of jobs may be in flight at once (`queue_size +
//! nb_threads` slots, sized as a counting semaphore). When a slot is
//! available the job is handed to the `rayon` pool; when the backlog
//! is full, the submitting thread runs the job itself instead of
//! blocking, which keeps overall progress moving rather than stalling
//! the caller on a busy pool.

use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::ThreadPool as RayonPool;
use std::sync::{Arc, Condvar, Mutex};

type JobFn = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    pending: usize,
}

/// Thread pool handle.
pub struct TPool {
    pool: Arc<RayonPool>,
    /// Bounded channel used as a counting semaphore: a token in the
    /// channel represents one free slot. `submit_job` tries to take a
    /// token before spawning into the pool; a worker returns its token
    /// on completion.
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Arc<(Mutex<PoolState>, Condvar)>,
}

impl TPool {
    /// Returns `None` if `nb_threads` or `queue_size` is zero, or if the
    /// underlying rayon pool fails to start.
    pub fn new(nb_threads: usize, queue_size: usize) -> Option<Self> {
        if nb_threads < 1 || queue_size < 1 {
            return None;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nb_threads)
            .build()
            .ok()?;

        let capacity = queue_size + nb_threads;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx.send(()).ok()?;
        }

        let state = Arc::new((Mutex::new(PoolState { pending: 0 }), Condvar::new()));

        Some(TPool {
            pool: Arc::new(pool),
            slot_tx,
            slot_rx,
            state,
        })
    }

    /// Submits `job`. If a slot is free, it runs on the pool; if the
    /// backlog is full, `job` runs synchronously on the calling thread
    /// instead of waiting for one.
    pub fn submit_job(&self, job: JobFn) {
        match self.slot_rx.try_recv() {
            Ok(()) => self.spawn_with_slot(job),
            Err(_) => job(),
        }
    }

    fn spawn_with_slot(&self, job: JobFn) {
        {
            let (lock, _cvar) = &*self.state;
            let mut s = lock.lock().unwrap();
            s.pending += 1;
        }

        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            job();

            let (lock, cvar) = &*state;
            let mut s = lock.lock().unwrap();
            s.pending -= 1;
            if s.pending == 0 {
                cvar.notify_all();
            }
            drop(s);
            let _ = slot_tx.send(());
        });
    }

    /// Blocks until every job submitted so far has finished executing.
    /// Does not shut down the pool — further jobs may be submitted
    /// afterwards.
    pub fn jobs_completed(&self) {
        let (lock, cvar) = &*self.state;
        let mut s = lock.lock().unwrap();
        while s.pending > 0 {
            s = cvar.wait(s).unwrap();
        }
    }
}

impl Drop for TPool {
    fn drop(&mut self) {
        self.jobs_completed();
    }
}
