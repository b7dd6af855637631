//! Decode worker pool
//!
//! Owns the fixed set of parallel decode workers. Startup is lazy and
//! memoized: the first `ensure_ready` call spawns all workers, and every
//! concurrent caller awaits the same outcome instead of spawning a second
//! worker set. The pool is `Ready` only after all workers independently
//! signal readiness; a single startup failure fails the pool for every
//! pending and future load until `shutdown` resets it.
//!
//! All pool state (lifecycle, worker list, round-robin index) lives behind
//! one mutex that is never held across an await point. Workers never mutate
//! pool state; their readiness events are fed back in by the frame router.

use crate::error::{Error, Result};
use crate::events::{DecodeJob, WorkerEvent};
use crate::worker::{CodecFactory, WorkerHandle};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Outcome of one startup attempt, shared by all waiters
type StartupOutcome = std::result::Result<(), String>;

/// Pool lifecycle state
enum PoolState {
    Uninitialized,
    /// Workers spawned, not all ready yet; waiters share the watch channel
    Initializing(watch::Receiver<Option<StartupOutcome>>),
    Ready,
    /// Sticky until `shutdown` resets the pool
    Failed(String),
}

impl PoolState {
    fn name(&self) -> &'static str {
        match self {
            PoolState::Uninitialized => "Uninitialized",
            PoolState::Initializing(_) => "Initializing",
            PoolState::Ready => "Ready",
            PoolState::Failed(_) => "Failed",
        }
    }
}

struct PoolInner {
    state: PoolState,
    workers: Vec<WorkerHandle>,
    /// Round-robin assignment cursor, wraps at `workers.len()`
    next_worker: usize,
    /// Readiness signals still outstanding during `Initializing`
    remaining: usize,
    /// Completion side of the memoized startup
    startup_tx: Option<watch::Sender<Option<StartupOutcome>>>,
    /// Startup attempt counter; workers stamp it into their startup events
    /// so signals from a torn-down worker set cannot be counted toward a
    /// later attempt
    generation: u64,
}

/// A worker slot claimed by round-robin assignment
///
/// Carries the worker index (recorded on the player) and a one-job submit.
pub(crate) struct AssignedWorker {
    pub worker_id: usize,
    job_tx: mpsc::UnboundedSender<DecodeJob>,
}

impl AssignedWorker {
    pub fn submit(&self, job: DecodeJob) -> Result<()> {
        self.job_tx
            .send(job)
            .map_err(|_| Error::InvalidState("decode worker is gone".to_string()))
    }
}

/// Fixed-size pool of parallel decode workers
pub struct DecodeWorkerPool {
    workers_limit: usize,
    factory: Arc<dyn CodecFactory>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    inner: Mutex<PoolInner>,
}

impl DecodeWorkerPool {
    pub fn new(
        workers_limit: usize,
        factory: Arc<dyn CodecFactory>,
        event_tx: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            workers_limit: workers_limit.max(1),
            factory,
            event_tx,
            inner: Mutex::new(PoolInner {
                state: PoolState::Uninitialized,
                workers: Vec::new(),
                next_worker: 0,
                remaining: 0,
                startup_tx: None,
                generation: 0,
            }),
        }
    }

    /// Await pool readiness, starting the workers on the first call
    ///
    /// Memoized: concurrent callers during startup share one outcome.
    /// `Failed` is returned as-is until an explicit `shutdown`.
    pub async fn ensure_ready(&self) -> Result<()> {
        let mut rx = {
            let mut inner = self.inner.lock().unwrap();
            match &inner.state {
                PoolState::Ready => return Ok(()),
                PoolState::Failed(message) => {
                    return Err(Error::WorkerStartup(message.clone()))
                }
                PoolState::Initializing(rx) => rx.clone(),
                PoolState::Uninitialized => self.start_workers(&mut inner),
            }
        };

        let outcome = {
            let guard = rx.wait_for(|o| o.is_some()).await.map_err(|_| {
                Error::WorkerStartup("pool shut down during startup".to_string())
            })?;
            guard.as_ref().cloned()
        };

        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(Error::WorkerStartup(message)),
            None => Err(Error::InvalidState(
                "startup signal observed without outcome".to_string(),
            )),
        }
    }

    /// Spawn all workers and enter `Initializing`
    fn start_workers(&self, inner: &mut PoolInner) -> watch::Receiver<Option<StartupOutcome>> {
        inner.generation += 1;
        let generation = inner.generation;
        info!(
            "Starting {} decode workers (generation {})",
            self.workers_limit, generation
        );

        let (tx, rx) = watch::channel(None);
        inner.startup_tx = Some(tx);
        inner.remaining = self.workers_limit;
        inner.next_worker = 0;
        inner.workers = (0..self.workers_limit)
            .map(|id| {
                WorkerHandle::spawn(
                    id,
                    generation,
                    Arc::clone(&self.factory),
                    self.event_tx.clone(),
                )
            })
            .collect();
        inner.state = PoolState::Initializing(rx.clone());

        rx
    }

    /// One worker signalled readiness (router callback)
    ///
    /// Signals stamped with a generation other than the current startup
    /// attempt come from a worker set already torn down and are ignored:
    /// `Ready` requires all N readiness signals from the current set.
    pub(crate) fn note_worker_ready(&self, worker_id: usize, generation: u64) {
        let mut inner = self.inner.lock().unwrap();
        if generation != inner.generation {
            debug!(
                "Stale ready signal from worker {} (generation {}, current {}) ignored",
                worker_id, generation, inner.generation
            );
            return;
        }
        if !matches!(inner.state, PoolState::Initializing(_)) {
            debug!(
                "Ready signal from worker {} in state {} ignored",
                worker_id,
                inner.state.name()
            );
            return;
        }

        debug!("Worker {} ready", worker_id);
        inner.remaining = inner.remaining.saturating_sub(1);
        if inner.remaining == 0 {
            info!("All {} decode workers ready", self.workers_limit);
            inner.state = PoolState::Ready;
            if let Some(tx) = &inner.startup_tx {
                let _ = tx.send(Some(Ok(())));
            }
        }
    }

    /// One worker failed to start: fail the pool for all waiters (router callback)
    ///
    /// Stale-generation failures are ignored so a torn-down worker set
    /// cannot fail a healthy later startup.
    pub(crate) fn note_startup_failed(&self, worker_id: usize, generation: u64, message: String) {
        let mut inner = self.inner.lock().unwrap();
        if generation != inner.generation {
            debug!(
                "Stale startup failure from worker {} (generation {}, current {}) ignored",
                worker_id, generation, inner.generation
            );
            return;
        }
        if matches!(inner.state, PoolState::Failed(_)) {
            return;
        }

        warn!("Worker {} startup failed, failing pool: {}", worker_id, message);
        inner.state = PoolState::Failed(message.clone());
        if let Some(tx) = &inner.startup_tx {
            let _ = tx.send(Some(Err(message)));
        }
    }

    /// Claim the next worker in round-robin order
    ///
    /// Only valid while `Ready`; the cursor advances on every claim and
    /// wraps at the worker count.
    pub(crate) fn assign_worker(&self) -> Result<AssignedWorker> {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, PoolState::Ready) {
            return Err(Error::InvalidState(format!(
                "cannot assign decode work in state {}",
                inner.state.name()
            )));
        }

        let index = inner.next_worker;
        inner.next_worker = (index + 1) % inner.workers.len();

        let worker = &inner.workers[index];
        let job_tx = worker
            .job_sender()
            .ok_or_else(|| Error::InvalidState("decode worker is gone".to_string()))?;

        Ok(AssignedWorker {
            worker_id: worker.id,
            job_tx,
        })
    }

    /// Terminate all workers and reset to `Uninitialized`
    ///
    /// Safe to call in any state; a subsequent load re-runs full startup.
    pub fn shutdown(&self) {
        let workers = {
            let mut inner = self.inner.lock().unwrap();
            inner.state = PoolState::Uninitialized;
            inner.next_worker = 0;
            inner.remaining = 0;
            inner.startup_tx = None;
            std::mem::take(&mut inner.workers)
        };

        if workers.is_empty() {
            return;
        }

        info!("Shutting down {} decode workers", workers.len());
        for worker in workers {
            let id = worker.id;
            worker.terminate();
            debug!("Worker {} terminated", id);
        }
    }

    /// Whether the pool has completed startup (diagnostics)
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, PoolState::Ready)
    }

    /// Number of live workers (diagnostics)
    pub fn worker_count(&self) -> usize {
        self.inner.lock().unwrap().workers.len()
    }
}
