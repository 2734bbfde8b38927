//! vdcd bridge
//!
//! Main entry point: connects to the vdcd controller, optionally to an MQTT
//! broker for device adapters, and dispatches controller messages until
//! Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vdcd_client::VdcdClient;
use vdcd_config::{load_config, BridgeConfig, MqttConfig};
use vdcd_topic_proxy::{MqttTransport, TopicProxy};

#[derive(Parser, Debug)]
#[command(name = "vdcd-bridge")]
#[command(about = "Bridge devices into a plan44 vdcd controller", version)]
struct Cli {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// vdcd controller host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// vdcd controller port
    #[arg(short, long)]
    port: Option<u16>,

    /// Model name for created devices
    #[arg(long = "modelname")]
    model_name: Option<String>,

    /// Vendor name for created devices
    #[arg(long = "vendorname")]
    vendor_name: Option<String>,

    /// Connect but skip the init handshake
    #[arg(long)]
    dry_mode: bool,

    /// MQTT broker host
    #[arg(long)]
    mqtt_host: Option<String>,

    #[arg(long)]
    mqtt_username: Option<String>,

    #[arg(long)]
    mqtt_password: Option<String>,
}

impl Cli {
    /// File, then environment, then command line
    fn into_config(self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => BridgeConfig::default(),
        };
        config.apply_env()?;

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model_name) = self.model_name {
            config.model_name = model_name;
        }
        if let Some(vendor_name) = self.vendor_name {
            config.vendor_name = vendor_name;
        }
        if self.dry_mode {
            config.dry_mode = true;
        }
        if let Some(host) = self.mqtt_host {
            match &mut config.mqtt {
                Some(mqtt) => mqtt.host = host,
                None => config.mqtt = Some(MqttConfig::new(host)),
            }
        }
        if let Some(mqtt) = &mut config.mqtt {
            if self.mqtt_username.is_some() {
                mqtt.username = self.mqtt_username;
            }
            if self.mqtt_password.is_some() {
                mqtt.password = self.mqtt_password;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// The running bridge
pub struct Bridge {
    /// Connection to the vdcd controller
    pub client: Arc<VdcdClient>,
    /// Shared topic subscriptions for MQTT based device adapters
    pub topics: Option<Arc<TopicProxy>>,
    mqtt: Option<Arc<MqttTransport>>,
}

impl Bridge {
    /// Connect to the controller and, when configured, the MQTT broker
    pub async fn start(config: &BridgeConfig) -> Result<Self> {
        let client = Arc::new(VdcdClient::new(config.client_config()));
        client.connect().await.context("connecting to vdcd")?;

        let (mqtt, topics) = match config.mqtt_settings() {
            Some(settings) => {
                let transport = Arc::new(MqttTransport::start(&settings));
                let topics = Arc::new(TopicProxy::new(transport.clone()));
                (Some(transport), Some(topics))
            }
            None => (None, None),
        };

        Ok(Self {
            client,
            topics,
            mqtt,
        })
    }

    /// Dispatch controller messages until Ctrl-C or a fatal connection error
    pub async fn run(&self) -> Result<()> {
        self.client.listen().await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.client.close().await;
        if let Some(mqtt) = &self.mqtt {
            mqtt.shutdown().await;
        }
    }
}

fn init_logging() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Cli::parse().into_config()?;
    info!(
        host = %config.host,
        port = config.port,
        dry_mode = config.dry_mode,
        "Starting vdcd bridge"
    );

    let bridge = Bridge::start(&config).await?;
    if bridge.topics.is_some() {
        info!("MQTT topic proxy ready");
    }
    info!("vdcd bridge is running");

    let result = bridge.run().await;
    if let Err(e) = &result {
        error!(error = %e, "vdcd connection lost");
    }

    info!("Shutting down...");
    bridge.shutdown().await;
    result
}
