//! Session worker
//!
//! Each open session gets one named OS thread that connects and then runs
//! queued jobs in order. Callers keep observing the session (busy flag,
//! status, state) from their own thread while a job blocks on the device.

use crate::communication::session::DeviceSession;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info};

/// Unit of work run against a session on its worker thread
pub type Job = Box<dyn FnOnce(&DeviceSession) -> fabkit_core::Result<()> + Send + 'static>;

/// Worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A command is in flight or a job is queued
    #[error("Component is busy")]
    Busy,

    /// The worker was shut down
    #[error("Session worker has stopped")]
    Stopped,

    /// The OS refused to create the thread
    #[error("Failed to spawn session worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Owns the worker thread of one session
pub struct SessionWorker {
    session: Arc<DeviceSession>,
    sender: Option<mpsc::Sender<Job>>,
    pending: Arc<AtomicUsize>,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Spawn the worker; the thread connects before taking jobs
    pub fn open(session: DeviceSession) -> Result<Self, WorkerError> {
        Self::spawn(Arc::new(session), true)
    }

    /// Spawn a worker for a session that is already connected
    pub fn attach(session: Arc<DeviceSession>) -> Result<Self, WorkerError> {
        Self::spawn(session, false)
    }

    fn spawn(session: Arc<DeviceSession>, connect: bool) -> Result<Self, WorkerError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let stopping = Arc::new(AtomicBool::new(false));

        let name = format!("session-{}", session.descriptor().ip());
        let thread_session = Arc::clone(&session);
        let thread_pending = Arc::clone(&pending);
        let thread_stopping = Arc::clone(&stopping);

        let handle = thread::Builder::new().name(name).spawn(move || {
            if connect {
                if let Err(err) = thread_session.connect() {
                    error!("Worker could not connect: {}", err);
                }
            }

            while let Ok(job) = receiver.recv() {
                if thread_stopping.load(Ordering::SeqCst) {
                    thread_pending.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&thread_session)));
                thread_pending.fetch_sub(1, Ordering::SeqCst);

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!("Job failed: {}", err);
                        thread_session.set_status(err.to_string());
                    }
                    Err(_) => {
                        error!("Job panicked");
                        thread_session.set_status("Internal error: job panicked");
                    }
                }
            }
            debug!("Session worker exiting");
        })?;

        Ok(Self {
            session,
            sender: Some(sender),
            pending,
            stopping,
            handle: Some(handle),
        })
    }

    /// The session this worker drives
    pub fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }

    /// Number of jobs queued or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queue a job behind any others
    pub fn submit<F>(&self, job: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&DeviceSession) -> fabkit_core::Result<()> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(WorkerError::Stopped)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        sender.send(Box::new(job)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            WorkerError::Stopped
        })
    }

    /// Queue a job only if nothing is running or waiting
    pub fn try_submit<F>(&self, job: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&DeviceSession) -> fabkit_core::Result<()> + Send + 'static,
    {
        if self.session.is_busy() || self.pending() > 0 {
            return Err(WorkerError::Busy);
        }
        self.submit(job)
    }

    /// Stop taking jobs, join the thread and close the session
    ///
    /// A job already running finishes first; queued jobs are dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        drop(sender);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Session worker thread panicked");
            }
        }
        self.session.close();
        info!("Session worker for {} stopped", self.session.descriptor().ip());
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
