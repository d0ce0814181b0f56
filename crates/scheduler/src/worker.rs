//! Render worker thread.
//!
//! Executes dispatched render tickets on a dedicated thread and reports each
//! completion back over a channel, so the owner of the scheduler stays
//! single-threaded and only observes completions when it polls for them.

use crate::scheduler::{RenderTicket, TicketId};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Errors raised by the render worker
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render worker is no longer running")]
    Disconnected,
}

/// Result of executing one ticket.
#[derive(Debug)]
pub struct Completion<R> {
    /// Ticket the result belongs to
    pub ticket: TicketId,

    /// Whatever the executor returned
    pub result: R,
}

/// A single background thread that runs render jobs one at a time.
///
/// # Example
///
/// ```
/// use pageview_scheduler::{RenderScheduler, RenderWorker};
/// use std::time::Duration;
///
/// let worker = RenderWorker::spawn(|page: u32| page * 2).expect("worker should start");
/// let mut scheduler = RenderScheduler::new();
///
/// let ticket = scheduler.request(21).expect("idle scheduler starts immediately");
/// worker.dispatch(ticket).expect("worker should accept the job");
///
/// let completion = worker
///     .wait_completion(Duration::from_secs(5))
///     .expect("worker should still be running")
///     .expect("job should finish");
/// assert_eq!(completion.result, 42);
/// ```
pub struct RenderWorker<J, R> {
    jobs: Option<Sender<RenderTicket<J>>>,
    completions: Receiver<Completion<R>>,
    thread: Option<JoinHandle<()>>,
}

impl<J, R> RenderWorker<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Start the worker thread with the given executor.
    pub fn spawn<F>(mut executor: F) -> Result<Self, WorkerError>
    where
        F: FnMut(J) -> R + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<RenderTicket<J>>();
        let (done_tx, done_rx) = mpsc::channel();

        let thread = thread::Builder::new().name("pageview-render-worker".to_owned()).spawn(
            move || {
                for ticket in job_rx {
                    let result = executor(ticket.job);
                    if done_tx.send(Completion { ticket: ticket.id, result }).is_err() {
                        break;
                    }
                }
                tracing::debug!("render worker exiting");
            },
        )?;

        Ok(Self { jobs: Some(job_tx), completions: done_rx, thread: Some(thread) })
    }

    /// Hand a ticket to the worker. Never blocks.
    pub fn dispatch(&self, ticket: RenderTicket<J>) -> Result<(), WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Disconnected)?;
        jobs.send(ticket).map_err(|_| WorkerError::Disconnected)
    }

    /// Take a completion if one is ready.
    pub fn try_completion(&self) -> Option<Completion<R>> {
        self.completions.try_recv().ok()
    }

    /// Block up to `timeout` for the next completion. `Ok(None)` means the
    /// timeout elapsed; an error means the worker thread is gone and nothing
    /// in flight will ever complete.
    pub fn wait_completion(
        &self,
        timeout: Duration,
    ) -> Result<Option<Completion<R>>, WorkerError> {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Ok(Some(completion)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("render worker disconnected while waiting for completion");
                Err(WorkerError::Disconnected)
            }
        }
    }

    /// Stop accepting work and wait for the thread to finish its current job.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<J, R> RenderWorker<J, R> {
    fn stop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("render worker panicked");
            }
        }
    }
}

impl<J, R> Drop for RenderWorker<J, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{RenderOutcome, RenderScheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn executes_dispatched_job() {
        let worker = RenderWorker::spawn(|page: u32| format!("page-{page}")).expect("spawn");

        worker.dispatch(RenderTicket { id: 1, job: 4 }).expect("dispatch");
        let completion = worker.wait_completion(WAIT).expect("running").expect("completion");

        assert_eq!(completion.ticket, 1);
        assert_eq!(completion.result, "page-4");
        worker.shutdown();
    }

    #[test]
    fn try_completion_is_empty_when_nothing_ran() {
        let worker = RenderWorker::spawn(|page: u32| page).expect("spawn");
        assert!(worker.try_completion().is_none());
    }

    #[test]
    fn wait_reports_timeout_and_dead_worker() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let worker = RenderWorker::spawn(move |page: u32| {
            let _ = gate_rx.recv();
            if page == 13 {
                panic!("executor gave up on page {page}");
            }
            page
        })
        .expect("spawn");

        worker.dispatch(RenderTicket { id: 1, job: 13 }).expect("dispatch");
        assert!(matches!(worker.wait_completion(Duration::from_millis(20)), Ok(None)));

        gate_tx.send(()).expect("release job");
        assert!(matches!(worker.wait_completion(WAIT), Err(WorkerError::Disconnected)));
        assert!(matches!(
            worker.dispatch(RenderTicket { id: 2, job: 1 }),
            Err(WorkerError::Disconnected)
        ));
    }

    #[test]
    fn scheduler_and_worker_render_only_latest_page() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let worker = {
            let rendered = rendered.clone();
            let running = running.clone();
            let max_running = max_running.clone();
            RenderWorker::spawn(move |page: u32| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                let _ = gate_rx.recv();
                rendered.lock().expect("rendered lock").push(page);
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .expect("spawn")
        };

        let mut scheduler = RenderScheduler::new();
        let first = scheduler.request(3).expect("idle");
        worker.dispatch(first).expect("dispatch");
        assert!(scheduler.request(1).is_none());
        assert!(scheduler.request(2).is_none());
        assert!(scheduler.request(1).is_none());

        gate_tx.send(()).expect("release first render");
        let done = worker.wait_completion(WAIT).expect("running").expect("first completion");
        let next = scheduler.complete(done.ticket, RenderOutcome::Succeeded).expect("pending");
        worker.dispatch(next).expect("dispatch");

        gate_tx.send(()).expect("release second render");
        let done = worker.wait_completion(WAIT).expect("running").expect("second completion");
        assert!(scheduler.complete(done.ticket, RenderOutcome::Succeeded).is_none());

        assert_eq!(*rendered.lock().expect("rendered lock"), vec![3, 1]);
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        worker.shutdown();
    }
}
