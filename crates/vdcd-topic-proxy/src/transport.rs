use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Delivery guarantee requested from the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A message received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

impl TopicMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: Qos::default(),
            retain: false,
        }
    }

    /// Payload as UTF-8, lossy
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Callback invoked for a received message
pub type MessageHandler = Arc<dyn Fn(&TopicMessage) + Send + Sync>;

/// Whether two handles point at the same handler
pub fn same_handler(a: &MessageHandler, b: &MessageHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Errors reported by a transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A publish/subscribe transport
///
/// Subscribing twice to the same pattern replaces the earlier handler. A
/// message matching several patterns that share one handler reaches that
/// handler once.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn subscribe(&self, pattern: &str, qos: Qos, handler: MessageHandler) -> TransportResult<()>;

    async fn publish(&self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> TransportResult<()>;
}

/// Whether `topic` matches the MQTT style `filter`
///
/// `+` matches one level, a trailing `#` matches any number of levels
/// including none. Wildcards in the first level never match `$` topics.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
