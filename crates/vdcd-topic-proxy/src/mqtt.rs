//! MQTT transport on top of `rumqttc`
//!
//! Keeps one handler per subscription pattern, like most MQTT client
//! libraries: subscribing to the same pattern again replaces the handler.
//! Every subscription is issued again after the broker acknowledges a
//! (re)connect.

use async_trait::async_trait;
use dashmap::DashMap;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    same_handler, topic_matches, MessageHandler, PubSubTransport, Qos, TopicMessage,
    TransportError, TransportResult,
};

/// Default MQTT broker port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 64;

/// Pause after an event loop error before polling again
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

impl From<Qos> for QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

impl From<QoS> for Qos {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => Qos::AtMostOnce,
            QoS::AtLeastOnce => Qos::AtLeastOnce,
            QoS::ExactlyOnce => Qos::ExactlyOnce,
        }
    }
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Generated when not set
    pub client_id: Option<String>,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            client_id: None,
            keep_alive: Duration::from_secs(30),
        }
    }

    fn options(&self) -> MqttOptions {
        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("vdcd-bridge-{}", Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

type Subscriptions = DashMap<String, (Qos, MessageHandler)>;

/// [`PubSubTransport`] backed by an MQTT broker
pub struct MqttTransport {
    client: AsyncClient,
    subscriptions: Arc<Subscriptions>,
    cancel: CancellationToken,
}

impl MqttTransport {
    /// Create the client and spawn its event loop on the current runtime
    ///
    /// Connecting happens in the background; subscriptions made before the
    /// broker answers are sent once the connection is up.
    pub fn start(settings: &MqttSettings) -> Self {
        info!(host = %settings.host, port = settings.port, "Connecting to MQTT broker");
        let (client, event_loop) = AsyncClient::new(settings.options(), REQUEST_CAPACITY);
        let subscriptions = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            Arc::clone(&subscriptions),
            cancel.clone(),
        ));

        Self {
            client,
            subscriptions,
            cancel,
        }
    }

    /// Disconnect and stop the event loop
    pub async fn shutdown(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect failed");
        }
        self.cancel.cancel();
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn subscribe(&self, pattern: &str, qos: Qos, handler: MessageHandler) -> TransportResult<()> {
        self.subscriptions
            .insert(pattern.to_string(), (qos, handler));

        self.client
            .subscribe(pattern, qos.into())
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(&self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> TransportResult<()> {
        self.client
            .publish(topic, qos.into(), retain, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    subscriptions: Arc<Subscriptions>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = TopicMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    qos: publish.qos.into(),
                    retain: publish.retain,
                };
                deliver(&subscriptions, &message);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT broker connection acknowledged");
                resubscribe(&client, &subscriptions);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }
    debug!("MQTT event loop stopped");
}

/// Call every handler whose pattern matches, each distinct handler once
fn deliver(subscriptions: &Subscriptions, message: &TopicMessage) {
    let mut handlers: Vec<MessageHandler> = Vec::new();
    for entry in subscriptions.iter() {
        let handler = &entry.value().1;
        if topic_matches(entry.key(), &message.topic)
            && !handlers.iter().any(|h| same_handler(h, handler))
        {
            handlers.push(Arc::clone(handler));
        }
    }

    for handler in handlers {
        handler(message);
    }
}

/// Queue every known subscription again without waiting on the event loop
fn resubscribe(client: &AsyncClient, subscriptions: &Subscriptions) {
    let patterns: Vec<(String, Qos)> = subscriptions
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().0))
        .collect();

    for (pattern, qos) in patterns {
        if let Err(e) = client.try_subscribe(pattern.as_str(), qos.into()) {
            error!(error = %e, pattern = %pattern, "Failed to resubscribe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicProxy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stores subscriptions the way [`MqttTransport`] does, without a broker
    #[derive(Default)]
    struct SubscriptionStore {
        subscriptions: Arc<Subscriptions>,
    }

    #[async_trait]
    impl PubSubTransport for SubscriptionStore {
        async fn subscribe(&self, pattern: &str, qos: Qos, handler: MessageHandler) -> TransportResult<()> {
            self.subscriptions
                .insert(pattern.to_string(), (qos, handler));
            Ok(())
        }

        async fn publish(&self, _topic: &str, _qos: Qos, _retain: bool, _payload: Vec<u8>) -> TransportResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_qos_conversion() {
        for qos in [Qos::AtMostOnce, Qos::AtLeastOnce, Qos::ExactlyOnce] {
            assert_eq!(Qos::from(QoS::from(qos)), qos);
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = MqttSettings::new("broker.local");
        assert_eq!(settings.port, 1883);
        assert!(settings.client_id.is_none());
        assert_eq!(settings.keep_alive, Duration::from_secs(30));
    }

    #[test]
    fn test_generated_client_id() {
        let options = MqttSettings::new("broker.local").options();
        assert!(options.client_id().starts_with("vdcd-bridge-"));

        let mut settings = MqttSettings::new("broker.local");
        settings.client_id = Some("fixed".to_string());
        assert_eq!(settings.options().client_id(), "fixed");
    }

    #[test]
    fn test_deliver_matches_patterns() {
        let subscriptions = Subscriptions::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for pattern in ["zigbee2mqtt/#", "zigbee2mqtt/lamp", "tasmota/#"] {
            let hits = Arc::clone(&hits);
            let handler: MessageHandler = Arc::new(move |_: &TopicMessage| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            subscriptions.insert(pattern.to_string(), (Qos::AtMostOnce, handler));
        }

        deliver(&subscriptions, &TopicMessage::new("zigbee2mqtt/lamp", "{}"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_proxy_handler_fires_once_for_overlapping_patterns() {
        let store = Arc::new(SubscriptionStore::default());
        let subscriptions = Arc::clone(&store.subscriptions);
        let proxy = TopicProxy::new(store);

        let discovery = Arc::new(AtomicUsize::new(0));
        let lamp = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&discovery);
        proxy
            .subscribe("zigbee2mqtt/#", move |_: &TopicMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        let counter = Arc::clone(&lamp);
        proxy
            .subscribe("zigbee2mqtt/lamp", move |_: &TopicMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(subscriptions.len(), 2);

        deliver(&subscriptions, &TopicMessage::new("zigbee2mqtt/lamp", "{}"));

        assert_eq!(lamp.load(Ordering::SeqCst), 1);
        assert_eq!(discovery.load(Ordering::SeqCst), 0);
    }
}
