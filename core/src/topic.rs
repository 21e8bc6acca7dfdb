//! Topic port for SILTA
//!
//! A [`Topic`] is a named, directional, at-most-once pub/sub channel of
//! opaque byte payloads. The governance runtime consumes one inbound topic
//! per event pipeline and produces on one outbound topic; the transport
//! behind the port (message bus, broker, in-process channel) is not this
//! crate's concern.
//!
//! # Delivery contract
//!
//! - At-most-once: a payload handed to [`Topic::send`] is delivered zero
//!   or one times to each listener; there is no replay.
//! - No ordering guarantee between payloads, or between `send` and
//!   listener invocation.
//! - The listener has no error channel. Whatever a listener does with a
//!   payload — including failing — stays on its side of the boundary.

use crate::error::{GovernanceError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Receiver side of a topic subscription
///
/// Invoked once per inbound payload. Implementations must be cheap to
/// share across tasks; one invocation may still be running when the next
/// begins.
#[async_trait]
pub trait TopicListener: Send + Sync {
    /// Handle one payload
    ///
    /// No return value: the topic contract has no error channel, so
    /// listeners log and absorb their own failures.
    async fn on_message(&self, payload: Bytes);
}

/// Port to a named asynchronous message channel
#[async_trait]
pub trait Topic: Send + Sync {
    /// Topic name, for logging and wiring
    fn name(&self) -> &str;

    /// Open the channel; listeners start receiving after this returns
    async fn start(&self) -> Result<()>;

    /// Close the channel; subsequent sends fail
    async fn stop(&self) -> Result<()>;

    /// Publish one payload
    async fn send(&self, payload: Bytes) -> Result<()>;

    /// Attach a listener for inbound payloads
    ///
    /// May be called before or after [`Topic::start`]; listeners attached
    /// while stopped simply receive nothing until the topic starts.
    fn subscribe(&self, listener: Arc<dyn TopicListener>);
}

/// In-process topic for tests and single-process deployments
///
/// Fans each payload out to every listener on its own spawned task, which
/// matches the at-most-once, unordered contract exactly: a panicking or
/// slow listener never affects the others, and nothing is redelivered.
pub struct InMemoryTopic {
    name: String,
    listeners: RwLock<Vec<Arc<dyn TopicListener>>>,
    started: AtomicBool,
}

impl InMemoryTopic {
    /// Create a stopped topic with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[async_trait]
impl Topic for InMemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        debug!(topic = %self.name, "topic started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.started.store(false, Ordering::SeqCst);
        debug!(topic = %self.name, "topic stopped");
        Ok(())
    }

    async fn send(&self, payload: Bytes) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(GovernanceError::property_server(format!(
                "topic '{}' is not started",
                self.name
            )));
        }
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            let payload = payload.clone();
            tokio::spawn(async move {
                listener.on_message(payload).await;
            });
        }
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn TopicListener>) {
        self.listeners.write().push(listener);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Listener that captures every payload it receives
    struct CaptureListener {
        received: Mutex<Vec<Bytes>>,
    }

    impl CaptureListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: Mutex::new(Vec::new()),
            })
        }

        fn received(&self) -> Vec<Bytes> {
            self.received.lock().clone()
        }
    }

    #[async_trait]
    impl TopicListener for CaptureListener {
        async fn on_message(&self, payload: Bytes) {
            self.received.lock().push(payload);
        }
    }

    #[tokio::test]
    async fn test_send_before_start_fails() {
        let topic = InMemoryTopic::new("events");
        let err = topic.send(Bytes::from_static(b"x")).await;
        assert!(matches!(err, Err(GovernanceError::PropertyServer { .. })));
    }

    #[tokio::test]
    async fn test_send_after_stop_fails() {
        let topic = InMemoryTopic::new("events");
        topic.start().await.unwrap();
        topic.stop().await.unwrap();
        assert!(topic.send(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn test_every_listener_receives_each_payload_once() {
        let topic = InMemoryTopic::new("events");
        let first = CaptureListener::new();
        let second = CaptureListener::new();
        topic.subscribe(first.clone());
        topic.subscribe(second.clone());
        topic.start().await.unwrap();

        topic.send(Bytes::from_static(b"hello")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.received(), vec![Bytes::from_static(b"hello")]);
        assert_eq!(second.received(), vec![Bytes::from_static(b"hello")]);
    }

    #[tokio::test]
    async fn test_listener_attached_while_stopped_receives_nothing() {
        let topic = InMemoryTopic::new("events");
        let listener = CaptureListener::new();
        topic.subscribe(listener.clone());

        assert!(topic.send(Bytes::from_static(b"lost")).await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(listener.received().is_empty());
    }
}
