//! Async driver for a [`SyncCoordinator`].
//!
//! Runs the coordinator on its own tokio task. Form events arrive over an mpsc
//! channel and every visible form state is published on a watch channel. The
//! debounce timer is the coordinator's next deadline, so a new event simply
//! replaces the sleep on the next loop iteration.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::sync::{ConnectionFormData, FormField, SyncCoordinator};
use crate::error::{Error, Result};

const INBOX_CAPACITY: usize = 64;

/// Input accepted by a running [`SyncDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    Field { field: FormField, value: String },
    Uri(String),
    DbType(String),
    Resync,
}

/// Handle to a coordinator running on a background task.
pub struct SyncDriver {
    inbox: mpsc::Sender<FormEvent>,
    outbox: watch::Receiver<ConnectionFormData>,
    task: JoinHandle<ConnectionFormData>,
}

impl SyncDriver {
    /// Spawn the coordinator onto the current tokio runtime.
    pub fn spawn(coordinator: SyncCoordinator) -> Self {
        let (inbox, events) = mpsc::channel(INBOX_CAPACITY);
        let (publisher, outbox) = watch::channel(coordinator.form().clone());
        let task = tokio::spawn(run(coordinator, events, publisher));
        Self { inbox, outbox, task }
    }

    /// Queue an edit.
    pub async fn send(&self, event: FormEvent) -> Result<()> {
        self.inbox
            .send(event)
            .await
            .map_err(|_| Error::Other("Connection form sync task stopped".into()))
    }

    pub async fn field(&self, field: FormField, value: impl Into<String>) -> Result<()> {
        self.send(FormEvent::Field {
            field,
            value: value.into(),
        })
        .await
    }

    pub async fn uri(&self, value: impl Into<String>) -> Result<()> {
        self.send(FormEvent::Uri(value.into())).await
    }

    /// Latest published form state.
    pub fn form(&self) -> ConnectionFormData {
        self.outbox.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionFormData> {
        self.outbox.clone()
    }

    /// Stop accepting events, flush any pending window and return the final form.
    pub async fn finish(self) -> Result<ConnectionFormData> {
        drop(self.inbox);
        self.task
            .await
            .map_err(|e| Error::Other(format!("Connection form sync task failed: {}", e)))
    }
}

async fn run(
    mut coordinator: SyncCoordinator,
    mut events: mpsc::Receiver<FormEvent>,
    publisher: watch::Sender<ConnectionFormData>,
) -> ConnectionFormData {
    loop {
        let deadline = coordinator.next_deadline().map(Instant::from_std);
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let now = Instant::now().into_std();
                match event {
                    FormEvent::Field { field, value } => coordinator.handle_field_change(field, value, now),
                    FormEvent::Uri(value) => coordinator.handle_uri_change(value, now),
                    FormEvent::DbType(db_type) => coordinator.set_db_type(db_type),
                    FormEvent::Resync => {
                        coordinator.resync_uri();
                    }
                }
            }
            _ = timer => {
                coordinator.poll(Instant::now().into_std());
            }
        }

        publish(&publisher, coordinator.form());
    }

    if let Some(outcome) = coordinator.flush() {
        debug!(?outcome, "Flushed pending connection form sync on shutdown");
    }
    publish(&publisher, coordinator.form());
    coordinator.into_form()
}

fn publish(publisher: &watch::Sender<ConnectionFormData>, form: &ConnectionFormData) {
    publisher.send_if_modified(|current| {
        if current == form {
            false
        } else {
            *current = form.clone();
            true
        }
    });
}
