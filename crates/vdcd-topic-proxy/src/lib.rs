//! Topic proxy for publish/subscribe transports
//!
//! Some transports keep only one handler per topic pattern: subscribing
//! again silently replaces the previous handler. [`TopicProxy`] sits in
//! front of such a transport, issues one real subscription per normalized
//! pattern and fans every message out to all handlers registered for its
//! exact topic.
//!
//! With the `mqtt` feature (on by default) [`MqttTransport`] provides the
//! transport on top of `rumqttc`.

#[cfg(feature = "mqtt")]
mod mqtt;
mod proxy;
mod transport;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSettings, MqttTransport, DEFAULT_MQTT_PORT};
pub use proxy::{normalize_pattern, TopicProxy};
pub use transport::{
    same_handler, topic_matches, MessageHandler, PubSubTransport, Qos, TopicMessage,
    TransportError, TransportResult,
};
