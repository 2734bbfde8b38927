use std::time::Duration;

/// Port the vdcd external device API listens on by default
pub const DEFAULT_PORT: u16 = 8999;

/// Dial attempts before giving up
pub const DEFAULT_DIAL_RETRIES: u32 = 5;

/// Fixed pause between dial attempts
pub const DEFAULT_DIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Connection settings for [`crate::VdcdClient`]
///
/// Pure configuration, building one does no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Model name stamped on every device created against the client
    pub model_name: String,
    /// Vendor name stamped on every device created against the client
    pub vendor_name: String,
    /// Skip the init handshake, used for discovery-only runs
    pub dry_mode: bool,
    pub dial_retries: u32,
    pub dial_backoff: Duration,
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        model_name: impl Into<String>,
        vendor_name: impl Into<String>,
        dry_mode: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            model_name: model_name.into(),
            vendor_name: vendor_name.into(),
            dry_mode,
            dial_retries: DEFAULT_DIAL_RETRIES,
            dial_backoff: DEFAULT_DIAL_BACKOFF,
        }
    }

    pub fn with_dial_retries(mut self, retries: u32) -> Self {
        self.dial_retries = retries;
        self
    }

    pub fn with_dial_backoff(mut self, backoff: Duration) -> Self {
        self.dial_backoff = backoff;
        self
    }

    /// `host:port` as used for dialing
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT, "vdcd-bridge", "vdcd-bridge", false)
    }
}
