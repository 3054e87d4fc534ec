use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument};

use crate::client::{EventStream, GattClient};
use crate::error::CliError;
use crate::gatt::{ConnectTarget, GattEvent, Peripheral, SchedulerConfig};
use crate::hw::LinkBackend;

use super::command::TargetArgs;

/// A client with a ready link to the peripheral a command targets.
pub(crate) struct ConnectedSession {
    client: GattClient,
    events: EventStream,
    peripheral: Peripheral,
}

impl ConnectedSession {
    /// Scans until `target` resolves, connects and waits for service discovery.
    #[instrument(skip(backend, config, target), level = "info", fields(device = %target.device()))]
    pub(crate) async fn establish(
        backend: Box<dyn LinkBackend>,
        config: SchedulerConfig,
        target: &TargetArgs,
    ) -> Result<Self> {
        let (client, mut events) = GattClient::open(backend, config).await?;
        client.start_scanning().await?;

        let waited = target.scan_duration();
        let found = timeout(waited, wait_for_device(&mut events, target.device())).await;
        if !matches!(found, Ok(true)) {
            client.shutdown().await;
            return Err(CliError::DeviceNotDiscovered {
                target: target.device().to_string(),
                waited: humantime::format_duration(waited).to_string(),
            }
            .into());
        }
        client.stop_scanning().await?;
        client.connect(target.device().clone()).await?;

        match wait_for_ready(&mut events).await {
            Ok(peripheral) => {
                info!(address = peripheral.address(), "session ready");
                Ok(Self {
                    client,
                    events,
                    peripheral,
                })
            }
            Err(reason) => {
                client.shutdown().await;
                Err(CliError::ConnectionNotReady {
                    target: target.device().to_string(),
                    reason,
                }
                .into())
            }
        }
    }

    pub(crate) fn client(&self) -> &GattClient {
        &self.client
    }

    pub(crate) fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Disconnects and stops the client.
    pub(crate) async fn close(self) {
        if let Err(error) = self.client.disconnect().await {
            debug!(%error, "disconnect on close failed");
        }
        self.client.shutdown().await;
    }
}

/// Collects `DeviceFound` events for the whole scan window.
pub(crate) async fn scan_for(
    backend: Box<dyn LinkBackend>,
    config: SchedulerConfig,
    scan_duration: Duration,
) -> Result<Vec<Peripheral>> {
    let (client, mut events) = GattClient::open(backend, config).await?;
    client.start_scanning().await?;

    let collect = async {
        while let Some(event) = events.next().await {
            if let GattEvent::DeviceFound { peripheral } = event {
                debug!(address = peripheral.address(), "device found during scan");
            }
        }
    };
    let _elapsed = timeout(scan_duration, collect).await;

    client.stop_scanning().await?;
    let snapshot = client.snapshot().await?;
    client.shutdown().await;
    Ok(snapshot.devices().to_vec())
}

/// Returns `true` once the directory can resolve `target`; `false` if the
/// event stream ends first.
async fn wait_for_device(events: &mut EventStream, target: &ConnectTarget) -> bool {
    let mut seen = 0usize;
    while let Some(event) = events.next().await {
        let GattEvent::DeviceFound { peripheral } = event else {
            continue;
        };
        seen += 1;
        let resolved = match target {
            ConnectTarget::Index(index) => seen > *index,
            ConnectTarget::Address(address) => peripheral.address().eq_ignore_ascii_case(address),
        };
        if resolved {
            return true;
        }
    }
    false
}

async fn wait_for_ready(events: &mut EventStream) -> Result<Peripheral, String> {
    while let Some(event) = events.next().await {
        match event {
            GattEvent::Connected { peripheral } => return Ok(peripheral),
            GattEvent::Error(report) => return Err(report.detail().to_string()),
            _ => {}
        }
    }
    Err("the connection task stopped".to_string())
}
