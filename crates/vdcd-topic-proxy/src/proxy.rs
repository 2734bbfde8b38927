use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::{MessageHandler, PubSubTransport, Qos, TopicMessage, TransportResult};

/// Handler lists keyed by normalized topic pattern
type HandlerMap = DashMap<String, Vec<MessageHandler>>;

/// Fan-out key for a topic pattern: a trailing multi-level wildcard is
/// dropped, so `zigbee2mqtt/#` and `zigbee2mqtt` share one entry
pub fn normalize_pattern(pattern: &str) -> &str {
    pattern.strip_suffix("/#").unwrap_or(pattern)
}

/// Many handlers per topic on top of a one-handler-per-pattern transport
///
/// The first handler for a normalized pattern issues the only real
/// subscription. Every real subscription shares one dispatcher, so a
/// transport that skips repeated handlers delivers each message to the
/// proxy once even when it matches several patterns. Incoming messages are
/// delivered to the handlers registered for their exact topic, in
/// registration order. A message whose topic has no handler list, e.g. one
/// that only matched a wildcard, is dropped.
pub struct TopicProxy {
    transport: Arc<dyn PubSubTransport>,
    handlers: Arc<HandlerMap>,
    dispatcher: MessageHandler,
    qos: Qos,
}

impl TopicProxy {
    pub fn new(transport: Arc<dyn PubSubTransport>) -> Self {
        let handlers: Arc<HandlerMap> = Arc::new(DashMap::new());
        let shared = Arc::clone(&handlers);
        let dispatcher: MessageHandler =
            Arc::new(move |message: &TopicMessage| dispatch(&shared, message));

        Self {
            transport,
            handlers,
            dispatcher,
            qos: Qos::AtMostOnce,
        }
    }

    /// QoS used for the underlying subscriptions and for publishing
    pub fn with_qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    /// Register `handler` for `pattern`
    ///
    /// The handler is in place before the transport subscription is issued,
    /// so retained messages delivered right away are not missed.
    #[instrument(skip(self, handler))]
    pub async fn subscribe<F>(&self, pattern: &str, handler: F) -> TransportResult<()>
    where
        F: Fn(&TopicMessage) + Send + Sync + 'static,
    {
        let key = normalize_pattern(pattern).to_string();

        let first = {
            let mut entry = self.handlers.entry(key.clone()).or_default();
            entry.push(Arc::new(handler));
            entry.len() == 1
        };

        if !first {
            debug!(key = %key, "Topic already subscribed, adding handler");
            return Ok(());
        }

        debug!(key = %key, "Subscribing to topic");
        self.transport
            .subscribe(pattern, self.qos, Arc::clone(&self.dispatcher))
            .await
    }

    /// Publish through the underlying transport
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> TransportResult<()> {
        trace!(topic = %topic, "Publishing");
        self.transport
            .publish(topic, self.qos, false, payload.into())
            .await
    }

    /// Number of handlers registered under the normalized `pattern`
    pub fn handler_count(&self, pattern: &str) -> usize {
        self.handlers
            .get(normalize_pattern(pattern))
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

fn dispatch(handlers: &HandlerMap, message: &TopicMessage) {
    // Clone the list so no map guard is held while handlers run
    let Some(list) = handlers.get(&message.topic).map(|h| h.clone()) else {
        trace!(topic = %message.topic, "No handlers for topic");
        return;
    };

    for handler in list {
        handler(message);
    }
}
