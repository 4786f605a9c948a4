use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::worker::job::{JobDispatcher, JobHandler, JobTicket};

/// Fixed set of OS threads draining a bounded ticket queue.
///
/// `dispatch` never blocks: a full queue rejects the ticket.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<JobTicket>>>,
    capacity: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(
        handler: Arc<dyn JobHandler>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be greater than zero".to_string(),
            ));
        }
        let capacity = queue_capacity.max(1);
        let (sender, receiver) = bounded::<JobTicket>(capacity);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rx = receiver.clone();
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("csvpipe-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, rx, handler))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            capacity,
            workers: Mutex::new(workers),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Stops intake. Tickets already queued still run.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down worker pool...");
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    /// Stops intake, drains the queue, and joins every worker.
    pub fn wait(&self) {
        self.shutdown();

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl JobDispatcher for WorkerPool {
    fn dispatch(&self, ticket: JobTicket) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }
        let sender = self
            .sender
            .lock()
            .map_err(|_| WorkerError::ChannelClosed)?
            .clone()
            .ok_or(WorkerError::ChannelClosed)?;

        sender.try_send(ticket).map_err(|e| match e {
            TrySendError::Full(ticket) => {
                warn!("Queue full, rejecting job {}", ticket.job_id);
                WorkerError::QueueFull {
                    capacity: self.capacity,
                }
            }
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.wait();
    }
}

fn run_worker(worker_id: usize, receiver: Receiver<JobTicket>, handler: Arc<dyn JobHandler>) {
    debug!("Worker {} started", worker_id);

    for ticket in receiver.iter() {
        debug!("Worker {} processing job {}", worker_id, ticket.job_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&ticket)));
        if outcome.is_err() {
            error!("Worker {} panicked while running job {}", worker_id, ticket.job_id);
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter {
        handled: AtomicUsize,
    }

    impl JobHandler for Counter {
        fn handle(&self, ticket: &JobTicket) {
            if ticket.job_id == "panic" {
                panic!("handler failure");
            }
            thread::sleep(Duration::from_millis(2));
            self.handled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let handler = Arc::new(Counter::default());
        assert!(WorkerPool::new(handler, 0, 4).is_err());
    }

    #[test]
    fn test_wait_drains_queue() {
        let handler = Arc::new(Counter::default());
        let pool = WorkerPool::new(handler.clone(), 2, 32).unwrap();

        for i in 0..20 {
            pool.dispatch(JobTicket::new(format!("j{}", i), "f1")).unwrap();
        }
        pool.wait();

        assert_eq!(handler.handled.load(Ordering::SeqCst), 20);
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_dispatch_after_shutdown_fails() {
        let handler = Arc::new(Counter::default());
        let pool = WorkerPool::new(handler, 1, 4).unwrap();
        pool.shutdown();

        let err = pool.dispatch(JobTicket::new("late", "f1")).unwrap_err();
        assert!(matches!(err, WorkerError::ChannelClosed));
    }

    /// Handler that blocks until the test opens the gate.
    struct Gated {
        started: crossbeam_channel::Sender<()>,
        gate: Receiver<()>,
    }

    impl JobHandler for Gated {
        fn handle(&self, _ticket: &JobTicket) {
            let _ = self.started.send(());
            let _ = self.gate.recv();
        }
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let (started_tx, started_rx) = bounded(1);
        let (gate_tx, gate_rx) = bounded(0);
        let handler = Arc::new(Gated {
            started: started_tx,
            gate: gate_rx,
        });
        let pool = WorkerPool::new(handler, 1, 1).unwrap();

        pool.dispatch(JobTicket::new("running", "f1")).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.dispatch(JobTicket::new("queued", "f1")).unwrap();

        let begin = std::time::Instant::now();
        let err = pool.dispatch(JobTicket::new("rejected", "f1")).unwrap_err();
        assert!(begin.elapsed() < Duration::from_millis(500));
        assert!(matches!(err, WorkerError::QueueFull { capacity: 1 }));

        drop(gate_tx);
        pool.wait();
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let handler = Arc::new(Counter::default());
        let pool = WorkerPool::new(handler.clone(), 1, 4).unwrap();

        pool.dispatch(JobTicket::new("panic", "f1")).unwrap();
        pool.dispatch(JobTicket::new("after", "f1")).unwrap();
        pool.wait();

        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    }
}
