//! Change notifications and the background sync worker.

use crate::engine::SyncEngine;
use crate::error::{EngineError, EngineResult};
use crate::stats::SyncReport;
use erpsync_core::{MapperStore, Record};
use erpsync_rpc::RemoteClient;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// A change in the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A local object was saved.
    Saved(Record),
    /// A local object was deleted.
    Deleted(Record),
    /// An order was placed successfully.
    OrderSucceeded(Record),
}

impl ChangeEvent {
    /// The record the event carries.
    pub fn record(&self) -> &Record {
        match self {
            ChangeEvent::Saved(record)
            | ChangeEvent::Deleted(record)
            | ChangeEvent::OrderSucceeded(record) => record,
        }
    }
}

/// Receives change notifications from the host.
pub trait ChangeListener: Send + Sync {
    /// Handles one event.
    fn notify(&self, event: ChangeEvent) -> EngineResult<()>;
}

impl<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> SyncEngine<R, S> {
    /// Applies one change event.
    pub fn handle(&self, event: &ChangeEvent) -> EngineResult<SyncReport> {
        match event {
            ChangeEvent::Saved(record) => self.on_save(record),
            ChangeEvent::Deleted(record) => self.on_delete(record),
            ChangeEvent::OrderSucceeded(order) => self.on_order_success(order),
        }
    }
}

impl<R: RemoteClient + ?Sized, S: MapperStore + ?Sized> ChangeListener for SyncEngine<R, S> {
    fn notify(&self, event: ChangeEvent) -> EngineResult<()> {
        self.handle(&event).map(|_| ())
    }
}

enum Message {
    Event(ChangeEvent),
    Flush(Sender<()>),
    Stop,
}

/// Sending side of a [`SyncWorker`].
///
/// Cheap to clone; events are applied in the order they were sent.
#[derive(Clone)]
pub struct EventQueue {
    sender: Sender<Message>,
}

impl EventQueue {
    /// Queues an event.
    pub fn send(&self, event: ChangeEvent) -> EngineResult<()> {
        self.sender
            .send(Message::Event(event))
            .map_err(|_| EngineError::WorkerStopped)
    }

    /// Blocks until every event sent before this call has been applied.
    pub fn flush(&self) -> EngineResult<()> {
        let (done, wait) = mpsc::channel();
        self.sender
            .send(Message::Flush(done))
            .map_err(|_| EngineError::WorkerStopped)?;
        wait.recv().map_err(|_| EngineError::WorkerStopped)
    }
}

impl ChangeListener for EventQueue {
    fn notify(&self, event: ChangeEvent) -> EngineResult<()> {
        self.send(event)
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue").finish_non_exhaustive()
    }
}

/// Totals of a worker's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Events applied.
    pub events: usize,
    /// Combined outcome.
    pub report: SyncReport,
    /// Events that failed with an engine error.
    pub errors: usize,
}

/// Applies change events on a dedicated thread.
#[derive(Debug)]
pub struct SyncWorker {
    queue: EventQueue,
    handle: JoinHandle<WorkerSummary>,
}

impl SyncWorker {
    /// Starts a worker for an engine.
    pub fn spawn<R, S>(engine: Arc<SyncEngine<R, S>>) -> Self
    where
        R: RemoteClient + ?Sized + 'static,
        S: MapperStore + ?Sized + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run(&engine, receiver));
        Self {
            queue: EventQueue { sender },
            handle,
        }
    }

    /// Returns a handle for sending events.
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    /// Applies the queued events, stops the thread and returns its totals.
    pub fn shutdown(self) -> EngineResult<WorkerSummary> {
        self.queue
            .sender
            .send(Message::Stop)
            .map_err(|_| EngineError::WorkerStopped)?;
        self.handle.join().map_err(|_| EngineError::WorkerStopped)
    }
}

fn run<R, S>(engine: &SyncEngine<R, S>, receiver: Receiver<Message>) -> WorkerSummary
where
    R: RemoteClient + ?Sized,
    S: MapperStore + ?Sized,
{
    let mut summary = WorkerSummary::default();
    for message in receiver {
        match message {
            Message::Event(event) => {
                summary.events += 1;
                match engine.handle(&event) {
                    Ok(report) => {
                        if !report.is_success() {
                            warn!(
                                object = %event.record().key(),
                                failed = report.failed,
                                "event left dirty rows"
                            );
                        }
                        summary.report.merge(report);
                    }
                    Err(e) => {
                        error!(object = %event.record().key(), error = %e, "event failed");
                        summary.errors += 1;
                    }
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
            Message::Stop => break,
        }
    }
    debug!(events = summary.events, "sync worker stopped");
    summary
}
