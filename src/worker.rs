//! Decode worker threads
//!
//! Each worker is an OS thread owning one opaque codec instance. Workers
//! receive [`DecodeJob`]s over a per-worker channel and emit tagged
//! [`WorkerEvent`]s back to the coordinating context. They never touch pool
//! state directly.

use crate::events::{DecodeJob, WorkerEvent};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Sink the codec drives while decoding one job
///
/// `loaded` is expected once (frame count + frame rate), followed by zero or
/// more `frame` calls in frame order.
pub trait FrameSink {
    fn loaded(&mut self, frame_count: u32, frame_rate: f64);
    fn frame(&mut self, frame_no: u32, data: Vec<u8>);
}

/// Opaque animation codec run by each decode worker
///
/// The decode algorithm itself is out of scope here; this crate only
/// orchestrates around it.
pub trait AnimationCodec: Send {
    fn decode(
        &mut self,
        job: &DecodeJob,
        sink: &mut dyn FrameSink,
    ) -> std::result::Result<(), String>;
}

/// Creates codec instances, one per worker
pub trait CodecFactory: Send + Sync {
    /// Whether this environment can run the codec at all
    ///
    /// Evaluated once, at loader construction. When `false` the pool is
    /// never started and every load fails fast.
    fn probe(&self) -> bool;

    fn create_codec(&self) -> std::result::Result<Box<dyn AnimationCodec>, String>;
}

/// Forwards codec output as tagged events for one request
struct EventSink {
    req_id: Uuid,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl FrameSink for EventSink {
    fn loaded(&mut self, frame_count: u32, frame_rate: f64) {
        let _ = self.event_tx.send(WorkerEvent::Loaded {
            req_id: self.req_id,
            frame_count,
            frame_rate,
        });
    }

    fn frame(&mut self, frame_no: u32, data: Vec<u8>) {
        let _ = self.event_tx.send(WorkerEvent::Frame {
            req_id: self.req_id,
            frame_no,
            data,
        });
    }
}

/// Handle to one running worker thread
pub(crate) struct WorkerHandle {
    pub id: usize,
    job_tx: Option<mpsc::UnboundedSender<DecodeJob>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn worker `id` for one pool `generation`; readiness is reported
    /// asynchronously on `event_tx`, stamped with that generation
    pub fn spawn(
        id: usize,
        generation: u64,
        factory: std::sync::Arc<dyn CodecFactory>,
        event_tx: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();

        let startup_tx = event_tx.clone();
        let thread = match thread::Builder::new()
            .name(format!("anim-decode-{}", id))
            .spawn(move || worker_loop(id, generation, factory, job_rx, event_tx))
        {
            Ok(thread) => Some(thread),
            Err(e) => {
                let _ = startup_tx.send(WorkerEvent::StartupFailed {
                    worker_id: id,
                    generation,
                    message: format!("thread spawn failed: {}", e),
                });
                None
            }
        };

        Self {
            id,
            job_tx: Some(job_tx),
            thread,
        }
    }

    /// Clone of this worker's job sender
    pub fn job_sender(&self) -> Option<mpsc::UnboundedSender<DecodeJob>> {
        self.job_tx.clone()
    }

    /// Close the job channel and join the thread
    ///
    /// A job already in flight finishes before the worker exits; there is no
    /// forced preemption.
    pub fn terminate(mut self) {
        self.job_tx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Decode worker {} panicked during shutdown", self.id);
            }
        }
    }
}

/// Worker thread main loop
fn worker_loop(
    worker_id: usize,
    generation: u64,
    factory: std::sync::Arc<dyn CodecFactory>,
    mut job_rx: mpsc::UnboundedReceiver<DecodeJob>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    let mut codec = match factory.create_codec() {
        Ok(codec) => {
            debug!("Worker {} ready (generation {})", worker_id, generation);
            let _ = event_tx.send(WorkerEvent::Ready {
                worker_id,
                generation,
            });
            codec
        }
        Err(message) => {
            error!("Worker {} startup failed: {}", worker_id, message);
            let _ = event_tx.send(WorkerEvent::StartupFailed {
                worker_id,
                generation,
                message,
            });
            return;
        }
    };

    // Channel closure is the shutdown signal
    while let Some(job) = job_rx.blocking_recv() {
        let req_id = job.req_id;
        debug!(
            "Worker {} decoding {} ({}x{}, req_id={})",
            worker_id, job.asset.name, job.width, job.height, req_id
        );

        let mut sink = EventSink {
            req_id,
            event_tx: event_tx.clone(),
        };

        if let Err(message) = codec.decode(&job, &mut sink) {
            error!(
                "Worker {} decode failed for {} (req_id={}): {}",
                worker_id, job.asset.name, req_id, message
            );
            let _ = event_tx.send(WorkerEvent::DecodeFailed { req_id, message });
        }
    }

    debug!("Worker {} exiting", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::AnimationAsset;
    use std::sync::Arc;

    struct OneFrameCodec;

    impl AnimationCodec for OneFrameCodec {
        fn decode(
            &mut self,
            _job: &DecodeJob,
            sink: &mut dyn FrameSink,
        ) -> std::result::Result<(), String> {
            sink.loaded(1, 30.0);
            sink.frame(0, vec![1, 2, 3]);
            Ok(())
        }
    }

    struct OneFrameFactory;

    impl CodecFactory for OneFrameFactory {
        fn probe(&self) -> bool {
            true
        }

        fn create_codec(&self) -> std::result::Result<Box<dyn AnimationCodec>, String> {
            Ok(Box::new(OneFrameCodec))
        }
    }

    fn test_job(req_id: Uuid) -> DecodeJob {
        DecodeJob {
            req_id,
            asset: AnimationAsset {
                name: "test".to_string(),
                data: vec![0u8; 8],
            },
            width: 16,
            height: 16,
            color: None,
            tone_index: None,
        }
    }

    #[tokio::test]
    async fn test_worker_emits_ready_then_ordered_decode_events() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(7, 1, Arc::new(OneFrameFactory), event_tx);

        assert!(matches!(
            event_rx.recv().await,
            Some(WorkerEvent::Ready {
                worker_id: 7,
                generation: 1
            })
        ));

        let req_id = Uuid::new_v4();
        worker.job_sender().unwrap().send(test_job(req_id)).unwrap();

        match event_rx.recv().await {
            Some(WorkerEvent::Loaded {
                req_id: id,
                frame_count,
                ..
            }) => {
                assert_eq!(id, req_id);
                assert_eq!(frame_count, 1);
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
        match event_rx.recv().await {
            Some(WorkerEvent::Frame {
                req_id: id,
                frame_no,
                data,
            }) => {
                assert_eq!(id, req_id);
                assert_eq!(frame_no, 0);
                assert_eq!(data, vec![1, 2, 3]);
            }
            other => panic!("expected Frame, got {:?}", other),
        }

        worker.terminate();
    }

    #[tokio::test]
    async fn test_worker_startup_failure_reports_worker_id() {
        struct BrokenFactory;
        impl CodecFactory for BrokenFactory {
            fn probe(&self) -> bool {
                true
            }
            fn create_codec(&self) -> std::result::Result<Box<dyn AnimationCodec>, String> {
                Err("no codec".to_string())
            }
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(3, 2, Arc::new(BrokenFactory), event_tx);

        match event_rx.recv().await {
            Some(WorkerEvent::StartupFailed {
                worker_id,
                generation,
                message,
            }) => {
                assert_eq!(worker_id, 3);
                assert_eq!(generation, 2);
                assert_eq!(message, "no codec");
            }
            other => panic!("expected StartupFailed, got {:?}", other),
        }

        worker.terminate();
    }
}
