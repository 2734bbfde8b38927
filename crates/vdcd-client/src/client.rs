use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use vdcd_core::{ChannelType, OutboundMessage, LINE_TERMINATOR};
use vdcd_device::{ChannelSink, Device};

use crate::dispatch;
use crate::registry::DeviceRegistry;
use crate::{ClientConfig, ClientError, ClientResult};

/// Capacity of the queue between the reader task and the dispatch loop
const RECEIVE_QUEUE_CAPACITY: usize = 256;

type LineReader = BufReader<OwnedReadHalf>;
type WriteHalf = Box<dyn AsyncWrite + Send + Unpin>;
type LineWriter = BufWriter<WriteHalf>;

/// Reconnecting client for the vdcd external device API
///
/// Share it as `Arc<VdcdClient>`: devices hold a weak handle to it and
/// [`VdcdClient::listen`] hands a clone to the reader task.
pub struct VdcdClient {
    config: ClientConfig,
    registry: DeviceRegistry,
    writer: AsyncMutex<Option<LineWriter>>,
    /// Read half parked between `connect` and `listen`
    reader: Mutex<Option<LineReader>>,
    closed: AtomicBool,
}

impl VdcdClient {
    /// Create a client; no connection is made until [`connect`](Self::connect)
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: DeviceRegistry::new(),
            writer: AsyncMutex::new(None),
            reader: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dial the controller
    ///
    /// Tries up to `dial_retries` times with a fixed `dial_backoff` pause.
    /// Exhausting the budget returns [`ClientError::DialExhausted`], which
    /// callers are expected to treat as fatal.
    #[instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn connect(&self) -> ClientResult<()> {
        let reader = self.establish().await?;
        let mut slot = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(reader);
        Ok(())
    }

    /// Dial, install the new write half and return the read half
    async fn establish(&self) -> ClientResult<LineReader> {
        let stream = self.dial().await?;
        let (read, write) = stream.into_split();
        *self.writer.lock().await = Some(BufWriter::new(Box::new(write) as WriteHalf));
        self.closed.store(false, Ordering::Release);
        Ok(BufReader::new(read))
    }

    async fn dial(&self) -> ClientResult<TcpStream> {
        let address = self.config.address();
        let attempts = self.config.dial_retries.max(1);
        info!(address = %address, "Trying to connect to vdcd");

        for attempt in 1..=attempts {
            match TcpStream::connect(address.as_str()).await {
                Ok(stream) => {
                    info!(address = %address, "Connected to vdcd");
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Dial failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.dial_backoff).await;
                    }
                }
            }
        }

        error!(address = %address, "Failed to connect to vdcd");
        Err(ClientError::DialExhausted { address, attempts })
    }

    /// Say goodbye to the controller and close the connection
    pub async fn close(&self) {
        info!("Closing connection to vdcd");
        self.closed.store(true, Ordering::Release);

        if let Err(e) = self.send_message(&OutboundMessage::Bye).await {
            warn!(error = %e, "Failed to send bye message");
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "Failed to close connection to vdcd");
            }
        }
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        info!("Connection to vdcd closed");
    }

    /// Register a device and send the init handshake for anything pending
    pub async fn add_device(&self, device: Arc<Device>) {
        self.registry.add(device);
        self.initialize().await;
    }

    /// Register several devices and announce them in a single init batch
    pub async fn add_devices(&self, devices: impl IntoIterator<Item = Arc<Device>>) {
        for device in devices {
            self.registry.add(device);
        }
        self.initialize().await;
    }

    /// Send the init handshake for every device not yet initialized
    ///
    /// A single pending device is sent as one object, several as one array.
    /// Devices are claimed while the writer is locked, so no channel update
    /// for a device can be written ahead of its init message.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        if self.config.dry_mode {
            debug!("Dry mode, skipping init handshake");
            return;
        }

        let mut writer = self.writer.lock().await;
        let pending = self.registry.claim_pending();

        let result = match pending.as_slice() {
            [] => {
                debug!("Cannot initialize, no pending devices");
                return;
            }
            [device] => {
                info!(unique_id = %device.unique_id(), tag = %device.tag(), "Sending init message");
                let message = OutboundMessage::init(device.init_descriptor());
                write_message(&mut writer, &message).await
            }
            devices => {
                info!(count = devices.len(), "Sending batched init message");
                let batch: Vec<OutboundMessage> = devices
                    .iter()
                    .map(|d| OutboundMessage::init(d.init_descriptor()))
                    .collect();
                write_message(&mut writer, &batch).await
            }
        };

        if let Err(e) = result {
            error!(error = %e, "Failed to send init message");
        }
    }

    /// Run the dispatch loop until Ctrl-C
    pub async fn listen(self: &Arc<Self>) -> ClientResult<()> {
        self.listen_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Unable to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            debug!("Interrupt received");
        })
        .await
    }

    /// Run the dispatch loop until `cancel` fires
    pub async fn listen_with_cancel(self: &Arc<Self>, cancel: CancellationToken) -> ClientResult<()> {
        self.listen_until(cancel.cancelled()).await
    }

    /// Spawn the reader task and dispatch inbound lines until `shutdown`
    /// completes
    ///
    /// Returns an error when the reader gives up: a failed reconnect after
    /// EOF, or any other read error. The reader task is not joined on
    /// shutdown; it ends once the socket is closed.
    async fn listen_until<F>(self: &Arc<Self>, shutdown: F) -> ClientResult<()>
    where
        F: Future<Output = ()>,
    {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ClientError::NotConnected)?;

        info!("Start listening for vdcd messages");
        let (tx, mut rx) = mpsc::channel(RECEIVE_QUEUE_CAPACITY);
        tokio::spawn(read_loop(Arc::clone(self), reader, tx));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Returning from listening loop");
                    return Ok(());
                }
                received = rx.recv() => match received {
                    Some(Ok(line)) => dispatch::handle_line(&self.registry, &line),
                    Some(Err(e)) => return Err(e),
                    None => return Err(ClientError::ReadFailed("reader stopped".to_string())),
                },
            }
        }
    }

    /// Report the current value of a channel, once the device is initialized
    pub async fn update_value(&self, device: &Device, channel_name: &str, channel_type: ChannelType) {
        match device.get_value(channel_name) {
            Ok(value) => {
                self.send_channel_value(device, channel_name, value, channel_type)
                    .await
            }
            Err(e) => error!(error = %e, unique_id = %device.unique_id(), "Value not found"),
        }
    }

    async fn send_channel_value(
        &self,
        device: &Device,
        channel_name: &str,
        value: f32,
        channel_type: ChannelType,
    ) {
        if !device.is_init_done() {
            debug!(
                unique_id = %device.unique_id(),
                channel = %channel_name,
                "Device not initialized, channel update dropped"
            );
            return;
        }

        info!(
            unique_id = %device.unique_id(),
            name = %device.name(),
            channel = %channel_name,
            value,
            "Update value"
        );
        let message = OutboundMessage::channel(device.tag(), channel_name, value, channel_type);
        self.send_logged(&message).await;
    }

    pub async fn send_sensor_message(&self, value: f32, tag: &str, sensor_id: &str, index: u32) {
        debug!(tag = %tag, sensor = %sensor_id, value, index, "Sending sensor message");
        self.send_logged(&OutboundMessage::sensor(tag, sensor_id, value, index))
            .await;
    }

    pub async fn send_button_message(&self, value: f32, tag: &str, index: u32) {
        debug!(tag = %tag, value, index, "Sending button message");
        self.send_logged(&OutboundMessage::button(tag, value, index))
            .await;
    }

    pub fn get_device_by_unique_id(&self, unique_id: &str) -> Option<Arc<Device>> {
        let device = self.registry.by_unique_id(unique_id);
        if device.is_none() {
            debug!(unique_id = %unique_id, "Device not found by unique id");
        }
        device
    }

    pub fn get_device_by_unique_id_and_sub_device_index(
        &self,
        unique_id: &str,
        sub_device_index: u32,
    ) -> Option<Arc<Device>> {
        let device = self
            .registry
            .by_unique_id_and_sub_device_index(unique_id, sub_device_index);
        if device.is_none() {
            debug!(unique_id = %unique_id, sub_device_index, "Device not found by unique id and sub device index");
        }
        device
    }

    pub fn get_device_by_tag(&self, tag: &str) -> Option<Arc<Device>> {
        let device = self.registry.by_tag(tag);
        if device.is_none() {
            debug!(tag = %tag, "Device not found by tag");
        }
        device
    }

    /// Snapshot of all registered devices in registration order
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.registry.all()
    }

    async fn send_logged<T: Serialize + ?Sized>(&self, message: &T) {
        if let Err(e) = self.send_message(message).await {
            error!(error = %e, "Send message failed");
        }
    }

    /// Serialize and write one message, terminated by CRLF
    ///
    /// A failed write drops the message but leaves the connection in place
    /// for the next one.
    async fn send_message<T: Serialize + ?Sized>(&self, message: &T) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        write_message(&mut writer, message).await
    }
}

async fn write_message<T: Serialize + ?Sized>(
    slot: &mut Option<LineWriter>,
    message: &T,
) -> ClientResult<()> {
    let payload = serde_json::to_string(message)?;
    let writer = slot.as_mut().ok_or(ClientError::NotConnected)?;
    let result = write_line(writer, &payload).await;

    // Discard what is still buffered so the next message starts a fresh line
    if result.is_err() {
        if let Some(writer) = slot.take() {
            *slot = Some(BufWriter::new(writer.into_inner()));
        }
    }
    result
}

async fn write_line(writer: &mut LineWriter, payload: &str) -> ClientResult<()> {
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(LINE_TERMINATOR.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read lines into the dispatch queue, reconnecting on EOF
async fn read_loop(
    client: Arc<VdcdClient>,
    mut reader: LineReader,
    tx: mpsc::Sender<ClientResult<String>>,
) {
    debug!("Starting receive loop for vdcd messages");
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                if client.closed.load(Ordering::Acquire) {
                    debug!("Connection closed, stopping receive loop");
                    return;
                }
                warn!("vdcd closed the connection, reconnecting");
                match client.establish().await {
                    Ok(fresh) => reader = fresh,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            // A partial line at EOF is lost with the connection
            Ok(_) if !line.ends_with('\n') => {
                debug!(raw = %line, "Dropping incomplete line");
            }
            Ok(_) => {
                if tx.send(Ok(line.clone())).await.is_err() {
                    debug!("Dispatch loop gone, stopping receive loop");
                    return;
                }
            }
            Err(e) => {
                if client.closed.load(Ordering::Acquire) {
                    return;
                }
                error!(error = %e, "Failed to read from vdcd");
                let _ = tx.send(Err(ClientError::ReadFailed(e.to_string()))).await;
                return;
            }
        }
    }
}

#[async_trait]
impl ChannelSink for VdcdClient {
    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn vendor_name(&self) -> &str {
        &self.config.vendor_name
    }

    async fn send_channel_update(
        &self,
        device: &Device,
        channel_name: &str,
        value: f32,
        channel_type: ChannelType,
    ) {
        self.send_channel_value(device, channel_name, value, channel_type)
            .await;
    }

    async fn send_sensor_value(&self, value: f32, tag: &str, sensor_id: &str, index: u32) {
        self.send_sensor_message(value, tag, sensor_id, index).await;
    }

    async fn send_button_value(&self, value: f32, tag: &str, index: u32) {
        self.send_button_message(value, tag, index).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use std::time::Duration;

    /// Writer that fails a set number of writes, then records everything
    #[derive(Clone, Default)]
    struct FlakyWriter {
        failures: Arc<AtomicUsize>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl FlakyWriter {
        fn failing(failures: usize) -> Self {
            Self {
                failures: Arc::new(AtomicUsize::new(failures)),
                ..Default::default()
            }
        }

        fn lines(&self) -> Vec<String> {
            let written = String::from_utf8(self.written.lock().unwrap().clone()).unwrap();
            written.split_terminator("\r\n").map(str::to_string).collect()
        }
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn unreachable_config() -> ClientConfig {
        // Port 1 on loopback refuses connections
        ClientConfig::new("127.0.0.1", 1, "model", "vendor", false)
            .with_dial_retries(2)
            .with_dial_backoff(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_dial_exhaustion_is_an_error() {
        let client = VdcdClient::new(unreachable_config());
        let err = client.connect().await.unwrap_err();

        match err {
            ClientError::DialExhausted { address, attempts } => {
                assert_eq!(address, "127.0.0.1:1");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_listen_requires_connection() {
        let client = Arc::new(VdcdClient::new(unreachable_config()));
        let err = client
            .listen_with_cancel(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_send_without_connection_is_not_fatal() {
        let client = Arc::new(VdcdClient::new(unreachable_config()));
        let device = Arc::new(Device::new_light(&client, "AA:BB", true));

        client.add_device(Arc::clone(&device)).await;
        assert!(device.is_init_done());

        let err = client.send_message(&OutboundMessage::Bye).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        assert!(device.update_value(10.0, "brightness", ChannelType::Brightness).await);
        client.send_sensor_message(1.0, "AA:BB", "t", 0).await;
        client.close().await;
    }

    #[tokio::test]
    async fn test_failed_write_drops_only_that_message() {
        let client = Arc::new(VdcdClient::new(unreachable_config()));
        let writer = FlakyWriter::failing(1);
        *client.writer.lock().await = Some(BufWriter::new(Box::new(writer.clone()) as WriteHalf));

        let device = Arc::new(Device::new_light(&client, "AA:BB", true));
        device.set_tag("AA:BB");
        device.set_init_done();

        let err = client
            .send_message(&OutboundMessage::channel("AA:BB", "brightness", 1.0, ChannelType::Brightness))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
        assert_eq!(writer.failures.load(Ordering::SeqCst), 0);

        assert!(device.update_value(2.0, "brightness", ChannelType::Brightness).await);

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        let sent: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(sent["message"], "channel");
        assert_eq!(sent["value"].as_f64(), Some(2.0));
    }

    #[tokio::test]
    async fn test_devices_take_names_from_config() {
        let client = Arc::new(VdcdClient::new(unreachable_config()));
        let device = Device::new(&client, "x");
        assert_eq!(device.descriptor().model_name, "model");
        assert_eq!(device.descriptor().vendor_name, "vendor");
    }
}
