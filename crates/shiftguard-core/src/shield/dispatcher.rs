use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::{ShieldAdapter, WorkSchedule};
use crate::error::ShieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldOperation {
    Arm,
    Disarm,
    Bypass,
}

impl fmt::Display for ShieldOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShieldOperation::Arm => "arm",
            ShieldOperation::Disarm => "disarm",
            ShieldOperation::Bypass => "bypass",
        })
    }
}

/// Non-fatal warning: a shield call accompanying a transition failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shield {operation} failed: {reason}")]
pub struct ShieldUnavailable {
    pub operation: ShieldOperation,
    pub reason: ShieldError,
}

#[derive(Debug)]
enum Command {
    Arm(WorkSchedule),
    Disarm,
    Bypass,
}

impl Command {
    fn operation(&self) -> ShieldOperation {
        match self {
            Command::Arm(_) => ShieldOperation::Arm,
            Command::Disarm => ShieldOperation::Disarm,
            Command::Bypass => ShieldOperation::Bypass,
        }
    }
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), ShieldError>>,
}

/// Pending result of a queued shield call.
///
/// Dropping the ticket does not cancel the call; failures are still logged.
#[derive(Debug)]
pub struct ShieldTicket {
    operation: ShieldOperation,
    rx: oneshot::Receiver<Result<(), ShieldError>>,
}

impl ShieldTicket {
    fn resolved(operation: ShieldOperation, result: Result<(), ShieldError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { operation, rx }
    }

    pub fn operation(&self) -> ShieldOperation {
        self.operation
    }

    /// Wait for the call; `Some` carries the warning to show the worker.
    pub async fn outcome(self) -> Option<ShieldUnavailable> {
        let result = self.rx.await.unwrap_or(Err(ShieldError::DispatcherClosed));
        result.err().map(|reason| ShieldUnavailable {
            operation: self.operation,
            reason,
        })
    }
}

/// Serialises shield calls on a background task in submission order.
///
/// A disarm queued while an arm is still in flight runs after it, never
/// instead of it.
#[derive(Clone)]
pub struct ShieldDispatcher {
    tx: Option<mpsc::UnboundedSender<Request>>,
    adapter: Option<Arc<dyn ShieldAdapter>>,
}

impl fmt::Debug for ShieldDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShieldDispatcher")
            .field("running", &self.tx.is_some())
            .field(
                "enabled",
                &self.adapter.as_ref().map(|a| a.is_enabled()).unwrap_or(false),
            )
            .finish()
    }
}

impl ShieldDispatcher {
    /// Start the dispatcher task. Must be called from within a Tokio runtime.
    pub fn spawn(adapter: Arc<dyn ShieldAdapter>) -> Result<Self, ShieldError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| ShieldError::Unavailable(format!("no async runtime: {e}")))?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run(Arc::clone(&adapter), rx));
        Ok(Self {
            tx: Some(tx),
            adapter: Some(adapter),
        })
    }

    /// A dispatcher with no platform behind it; every ticket resolves to success.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            adapter: None,
        }
    }

    pub fn adapter(&self) -> Option<&Arc<dyn ShieldAdapter>> {
        self.adapter.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_enabled())
    }

    pub fn arm(&self, schedule: WorkSchedule) -> ShieldTicket {
        self.submit(Command::Arm(schedule))
    }

    pub fn disarm(&self) -> ShieldTicket {
        self.submit(Command::Disarm)
    }

    pub fn bypass(&self) -> ShieldTicket {
        self.submit(Command::Bypass)
    }

    fn submit(&self, command: Command) -> ShieldTicket {
        let operation = command.operation();
        let Some(tx) = &self.tx else {
            return ShieldTicket::resolved(operation, Ok(()));
        };
        let (reply, rx) = oneshot::channel();
        if tx.send(Request { command, reply }).is_err() {
            tracing::warn!("shield dispatcher is gone, {} not sent", operation);
            return ShieldTicket::resolved(operation, Err(ShieldError::DispatcherClosed));
        }
        ShieldTicket { operation, rx }
    }
}

async fn run(adapter: Arc<dyn ShieldAdapter>, mut rx: mpsc::UnboundedReceiver<Request>) {
    while let Some(Request { command, reply }) = rx.recv().await {
        let operation = command.operation();
        let worker = Arc::clone(&adapter);
        let result = tokio::task::spawn_blocking(move || execute(worker.as_ref(), &command))
            .await
            .unwrap_or_else(|e| Err(ShieldError::Unavailable(format!("shield call panicked: {e}"))));
        match &result {
            Ok(()) => tracing::debug!("shield {} completed", operation),
            Err(e) => tracing::warn!("shield {} failed: {}", operation, e),
        }
        let _ = reply.send(result);
    }
    tracing::debug!("shield dispatcher stopped");
}

fn execute(adapter: &dyn ShieldAdapter, command: &Command) -> Result<(), ShieldError> {
    if !adapter.is_enabled() {
        return Ok(());
    }
    match command {
        Command::Arm(schedule) => adapter.start_work_limit(schedule),
        Command::Disarm => adapter.stop_work_limit(),
        Command::Bypass => adapter.request_bypass(),
    }
}
