//! Shield attempt/bypass event stream.
//!
//! Events fan out over a tokio broadcast channel. A [`ShieldSubscription`] is
//! a cancellable stream; [`ShieldEventBus::on_event`] is the callback form.
//! Both guarantee nothing is delivered once unsubscribed. Delivery is
//! at-most-once: a subscriber that falls behind loses the oldest events.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::AppToken;
use crate::error::ShieldError;

/// Capacity of the event channel before slow subscribers start lagging.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShieldEventKind {
    /// The worker tried to open a restricted app.
    Attempt,
    /// The worker overrode the restriction.
    Bypass,
    /// A temporary grace period was granted.
    Grace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldEvent {
    #[serde(rename = "type")]
    pub kind: ShieldEventKind,
    #[serde(default)]
    pub app_token: Option<AppToken>,
    pub at: DateTime<Utc>,
}

impl ShieldEvent {
    pub fn new(kind: ShieldEventKind, app_token: Option<AppToken>, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            app_token,
            at,
        }
    }
}

/// Fan-out point owned by a shield adapter.
#[derive(Debug, Clone)]
pub struct ShieldEventBus {
    tx: broadcast::Sender<ShieldEvent>,
}

impl Default for ShieldEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ShieldEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; returns how many subscribers will see it.
    pub fn publish(&self, event: ShieldEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => {
                tracing::trace!("shield event delivered to {} subscribers", count);
                count
            }
            Err(_) => {
                tracing::debug!("shield event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self) -> ShieldSubscription {
        ShieldSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Register a callback invoked for every event until the returned guard
    /// is unsubscribed or dropped.
    ///
    /// Must be called from within a Tokio runtime. The callback must not
    /// unsubscribe its own guard; that would deadlock.
    pub fn on_event<F>(&self, callback: F) -> Result<Unsubscribe, ShieldError>
    where
        F: Fn(&ShieldEvent) + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| ShieldError::Unavailable(format!("no async runtime: {e}")))?;
        let gate = Arc::new(Mutex::new(true));
        let task_gate = Arc::clone(&gate);
        let mut subscription = self.subscribe();
        let task = handle.spawn(async move {
            while let Some(event) = subscription.recv().await {
                let open = task_gate.lock().unwrap_or_else(|e| e.into_inner());
                if !*open {
                    break;
                }
                callback(&event);
            }
        });
        Ok(Unsubscribe {
            gate,
            task: Some(task),
        })
    }
}

/// A cancellable stream of shield events.
#[derive(Debug)]
pub struct ShieldSubscription {
    rx: broadcast::Receiver<ShieldEvent>,
}

impl ShieldSubscription {
    /// Next event, or `None` once the adapter is gone.
    pub async fn recv(&mut self) -> Option<ShieldEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("shield subscriber lagged, {} events dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ShieldEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!("shield subscriber lagged, {} events dropped", missed);
                }
                Err(_) => return None,
            }
        }
    }

    /// Stop receiving. Buffered events are discarded.
    pub fn unsubscribe(self) {}
}

/// Guard returned by [`ShieldEventBus::on_event`].
///
/// Once [`Unsubscribe::unsubscribe`] returns (or the guard is dropped) the
/// callback is never invoked again; an invocation already running is waited on.
#[derive(Debug)]
pub struct Unsubscribe {
    gate: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Unsubscribe {
    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event(kind: ShieldEventKind) -> ShieldEvent {
        ShieldEvent::new(kind, None, Utc::now())
    }

    #[tokio::test]
    async fn subscription_receives_published_events() {
        let bus = ShieldEventBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(bus.publish(event(ShieldEventKind::Attempt)), 1);
        let got = sub.recv().await.unwrap();
        assert_eq!(got.kind, ShieldEventKind::Attempt);
    }

    #[tokio::test]
    async fn nothing_delivered_after_unsubscribe() {
        let bus = ShieldEventBus::new();
        let sub = bus.subscribe();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(event(ShieldEventKind::Bypass)), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest() {
        let bus = ShieldEventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        bus.publish(event(ShieldEventKind::Attempt));
        bus.publish(event(ShieldEventKind::Bypass));
        bus.publish(event(ShieldEventKind::Grace));
        assert_eq!(sub.try_recv().unwrap().kind, ShieldEventKind::Bypass);
        assert_eq!(sub.try_recv().unwrap().kind, ShieldEventKind::Grace);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn callback_stops_after_unsubscribe() {
        let bus = ShieldEventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let guard = bus
            .on_event(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(event(ShieldEventKind::Attempt));
        for _ in 0..50 {
            if seen.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        guard.unsubscribe();
        bus.publish(event(ShieldEventKind::Attempt));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_event_outside_runtime_is_an_error() {
        let bus = ShieldEventBus::new();
        assert!(bus.on_event(|_| {}).is_err());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let at = Utc::now();
        let json = serde_json::to_value(ShieldEvent::new(ShieldEventKind::Bypass, None, at)).unwrap();
        assert_eq!(json["type"], "bypass");
    }
}
