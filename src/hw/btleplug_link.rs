use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use btleplug::api::bleuuid::uuid_from_u16;
use btleplug::api::{
    Central as _, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::timeout;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::error::LinkError;
use crate::gatt::{ConnectFailure, DisconnectCause, GattStatus, GattTarget, LinkEvent};

use super::link::{
    AdapterStatus, HardwareLink, LinkBackend, LinkEventSender, NotifySetup, WriteMode,
};
use super::model::{CharacteristicInfo, ServiceInfo};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid = uuid_from_u16(0x2902);

/// Opens a [`HardwareLink`] on the first adapter the platform reports.
#[derive(Debug, Clone, Builder)]
pub struct BtleplugBackend {
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,
}

impl Default for BtleplugBackend {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl LinkBackend for BtleplugBackend {
    #[instrument(skip(self, events), level = "debug")]
    async fn open(
        self: Box<Self>,
        events: LinkEventSender,
    ) -> Result<Box<dyn HardwareLink>, LinkError> {
        let manager = Manager::new().await?;
        let adapter = manager.adapters().await?.into_iter().next();
        if adapter.is_none() {
            warn!("no BLE adapters were found");
        }

        let shared = Arc::new(LinkShared::default());
        let shutdown = CancellationToken::new();
        if let Some(adapter) = &adapter {
            let central_events = adapter.events().await?;
            tokio::spawn(pump_central_events(
                adapter.clone(),
                central_events,
                Arc::clone(&shared),
                events.clone(),
                shutdown.clone(),
            ));
        }

        Ok(Box::new(BtleplugLink {
            _manager: manager,
            adapter,
            shared,
            events,
            connect_timeout: self.connect_timeout,
            shutdown,
            link_token: None,
        }))
    }
}

#[derive(Debug, Default)]
struct LinkShared {
    peripheral: Mutex<Option<Peripheral>>,
    characteristics: Mutex<HashMap<GattTarget, Characteristic>>,
    scanning: AtomicBool,
    gatt_busy: AtomicBool,
}

impl LinkShared {
    fn current(&self) -> Option<Peripheral> {
        lock(&self.peripheral).clone()
    }

    /// Forgets the peripheral if it is `id`; returns whether it was current.
    fn release_if_current(&self, id: &PeripheralId) -> bool {
        let mut current = lock(&self.peripheral);
        if current.as_ref().is_some_and(|peripheral| &peripheral.id() == id) {
            current.take();
            lock(&self.characteristics).clear();
            true
        } else {
            false
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the single GATT slot until the call it guards has finished.
struct GattSlot(Arc<LinkShared>);

impl GattSlot {
    fn acquire(shared: &Arc<LinkShared>) -> Result<Self, LinkError> {
        shared
            .gatt_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LinkError::Busy)?;
        Ok(Self(Arc::clone(shared)))
    }
}

impl Drop for GattSlot {
    fn drop(&mut self) {
        self.0.gatt_busy.store(false, Ordering::Release);
    }
}

/// A [`HardwareLink`] backed by the platform BLE stack.
///
/// Each call spawns the matching btleplug future and reports its outcome as
/// a [`LinkEvent`]. Only one GATT call runs at a time; overlapping calls are
/// refused with [`LinkError::Busy`].
pub struct BtleplugLink {
    _manager: Manager,
    adapter: Option<Adapter>,
    shared: Arc<LinkShared>,
    events: LinkEventSender,
    connect_timeout: Duration,
    shutdown: CancellationToken,
    link_token: Option<CancellationToken>,
}

impl BtleplugLink {
    fn adapter(&self) -> Result<Adapter, LinkError> {
        self.adapter.clone().ok_or(LinkError::AdapterUnavailable)
    }

    fn resolve(&self, target: &GattTarget) -> Result<(Peripheral, Characteristic), LinkError> {
        let peripheral = self.shared.current().ok_or(LinkError::NotConnected)?;
        let characteristic = lock(&self.shared.characteristics)
            .get(target)
            .cloned()
            .ok_or(LinkError::UnknownCharacteristic { target: *target })?;
        Ok((peripheral, characteristic))
    }
}

impl Drop for BtleplugLink {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl HardwareLink for BtleplugLink {
    fn adapter_status(&self) -> AdapterStatus {
        if self.adapter.is_some() {
            AdapterStatus::Ready
        } else {
            AdapterStatus::Unsupported
        }
    }

    fn start_scan(&mut self) -> Result<(), LinkError> {
        let adapter = self.adapter()?;
        self.shared.scanning.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = adapter.start_scan(ScanFilter::default()).await;
            if let Some(event) = scan_outcome(result) {
                warn!(?event, "failed to start BLE scan");
                shared.scanning.store(false, Ordering::Release);
                post(&events, event);
            }
        });
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        let adapter = self.adapter()?;
        self.shared.scanning.store(false, Ordering::Release);
        tokio::spawn(async move {
            if let Err(error) = adapter.stop_scan().await {
                debug!(?error, "failed to stop BLE scan");
            }
        });
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        let adapter = self.adapter()?;
        let link_token = self.shutdown.child_token();
        if let Some(previous) = self.link_token.replace(link_token.clone()) {
            previous.cancel();
        }

        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let address = address.to_string();
        let connect_timeout = self.connect_timeout;
        tokio::spawn(async move {
            let outcome = tokio::select! {
                () = link_token.cancelled() => return,
                outcome = connect_peripheral(&adapter, &address, connect_timeout) => outcome,
            };
            match outcome {
                Ok(peripheral) => {
                    tokio::spawn(pump_notifications(
                        peripheral.clone(),
                        events.clone(),
                        link_token.clone(),
                    ));
                    *lock(&shared.peripheral) = Some(peripheral);
                    post(&events, LinkEvent::Connected);
                }
                Err(failure) => post(&events, LinkEvent::ConnectFailed(failure)),
            }
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        let token = self.link_token.take();
        let peripheral = lock(&self.shared.peripheral).take();
        lock(&self.shared.characteristics).clear();
        if token.is_none() && peripheral.is_none() {
            return Err(LinkError::NotConnected);
        }
        if let Some(token) = token {
            token.cancel();
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(peripheral) = peripheral
                && let Err(error) = peripheral.disconnect().await
            {
                debug!(?error, "peripheral disconnect failed");
            }
            post(&events, LinkEvent::Disconnected(DisconnectCause::Requested));
        });
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), LinkError> {
        let peripheral = self.shared.current().ok_or(LinkError::NotConnected)?;
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        tokio::spawn(async move {
            match peripheral.discover_services().await {
                Ok(()) => {
                    let (services, characteristics) = collect_services(&peripheral);
                    *lock(&shared.characteristics) = characteristics;
                    post(&events, LinkEvent::ServicesDiscovered(services));
                }
                Err(error) => {
                    warn!(?error, "service discovery failed");
                    post(&events, LinkEvent::ConnectFailed(ConnectFailure::Unknown));
                }
            }
        });
        Ok(())
    }

    fn read(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        let (peripheral, characteristic) = self.resolve(target)?;
        let slot = GattSlot::acquire(&self.shared)?;
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = peripheral.read(&characteristic).await;
            drop(slot);
            let (value, status) = match result {
                Ok(value) => (value, GattStatus::Success),
                Err(error) => (Vec::new(), GattStatus::Failure(error.to_string())),
            };
            post(
                &events,
                LinkEvent::CharacteristicRead {
                    characteristic: characteristic.uuid,
                    value,
                    status,
                },
            );
        });
        Ok(())
    }

    fn write(
        &mut self,
        target: &GattTarget,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError> {
        let (peripheral, characteristic) = self.resolve(target)?;
        let slot = GattSlot::acquire(&self.shared)?;
        let events = self.events.clone();
        let payload = payload.to_vec();
        tokio::spawn(async move {
            let result = peripheral
                .write(&characteristic, &payload, write_type(mode))
                .await;
            drop(slot);
            post(
                &events,
                LinkEvent::CharacteristicWrite {
                    characteristic: characteristic.uuid,
                    status: gatt_status(result),
                },
            );
        });
        Ok(())
    }

    fn enable_notifications(&mut self, target: &GattTarget) -> Result<NotifySetup, LinkError> {
        let (peripheral, characteristic) = self.resolve(target)?;
        let has_descriptor = characteristic
            .descriptors
            .iter()
            .any(|descriptor| descriptor.uuid == CLIENT_CHARACTERISTIC_CONFIGURATION);
        let slot = GattSlot::acquire(&self.shared)?;
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = peripheral.subscribe(&characteristic).await;
            drop(slot);
            if let Some(event) = subscribe_outcome(characteristic.uuid, has_descriptor, result) {
                post(&events, event);
            }
        });

        Ok(if has_descriptor {
            NotifySetup::DescriptorWritePending
        } else {
            NotifySetup::NoDescriptor
        })
    }

    fn disable_notifications(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        let (peripheral, characteristic) = self.resolve(target)?;
        let slot = GattSlot::acquire(&self.shared)?;
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = peripheral.unsubscribe(&characteristic).await;
            drop(slot);
            if let Err(error) = result {
                debug!(?error, uuid = %characteristic.uuid, "disabling notifications failed");
                post(
                    &events,
                    LinkEvent::NotificationsDisableFailed {
                        characteristic: characteristic.uuid,
                        reason: error.to_string(),
                    },
                );
            }
        });
        Ok(())
    }
}

#[instrument(skip(adapter), level = "debug", fields(?connect_timeout))]
async fn connect_peripheral(
    adapter: &Adapter,
    address: &str,
    connect_timeout: Duration,
) -> Result<Peripheral, ConnectFailure> {
    let peripherals = adapter.peripherals().await.map_err(|error| {
        warn!(?error, "listing peripherals failed");
        ConnectFailure::Unknown
    })?;
    let Some(peripheral) = peripherals
        .into_iter()
        .find(|peripheral| peripheral.id().to_string().eq_ignore_ascii_case(address))
    else {
        warn!("peripheral is no longer known to the adapter");
        return Err(ConnectFailure::Unknown);
    };

    match timeout(connect_timeout, peripheral.connect()).await {
        Ok(Ok(())) => {
            info!("link established");
            Ok(peripheral)
        }
        Ok(Err(error)) => {
            warn!(?error, "connect failed");
            Err(classify_connect_error(&error))
        }
        Err(_elapsed) => {
            warn!("connect timed out");
            Err(ConnectFailure::Timeout)
        }
    }
}

fn classify_connect_error(error: &btleplug::Error) -> ConnectFailure {
    match error {
        btleplug::Error::PermissionDenied | btleplug::Error::NotSupported(_) => {
            ConnectFailure::Refused
        }
        btleplug::Error::TimedOut(_) => ConnectFailure::Timeout,
        _ => ConnectFailure::Unknown,
    }
}

async fn pump_central_events(
    adapter: Adapter,
    mut central_events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    shared: Arc<LinkShared>,
    events: LinkEventSender,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = central_events.next() => event,
        };
        match event {
            Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) => {
                if !shared.scanning.load(Ordering::Acquire) {
                    continue;
                }
                if let Some(advertisement) = advertisement_for(&adapter, &id).await {
                    post(&events, advertisement);
                }
            }
            Some(CentralEvent::DeviceDisconnected(id)) => {
                if shared.release_if_current(&id) {
                    info!(%id, "link lost");
                    post(&events, LinkEvent::Disconnected(DisconnectCause::LinkLoss));
                }
            }
            Some(_) => {}
            None => {
                debug!("central event stream closed");
                break;
            }
        }
    }
}

async fn advertisement_for(adapter: &Adapter, id: &PeripheralId) -> Option<LinkEvent> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(error) => {
            trace!(?error, %id, "advertising peripheral vanished");
            return None;
        }
    };
    let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        Ok(None) => return None,
        Err(error) => {
            trace!(?error, %id, "failed to read advertisement properties");
            return None;
        }
    };
    Some(LinkEvent::Advertisement {
        address: peripheral.id().to_string(),
        name: properties.local_name,
        rssi: properties.rssi,
    })
}

async fn pump_notifications(
    peripheral: Peripheral,
    events: LinkEventSender,
    link_token: CancellationToken,
) {
    let mut notifications = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(error) => {
            warn!(?error, "failed to open notification stream");
            return;
        }
    };
    loop {
        tokio::select! {
            () = link_token.cancelled() => break,
            notification = notifications.next() => match notification {
                Some(notification) => post(
                    &events,
                    LinkEvent::CharacteristicChanged {
                        characteristic: notification.uuid,
                        value: notification.value,
                    },
                ),
                None => break,
            },
        }
    }
    trace!("notification pump stopped");
}

fn collect_services(
    peripheral: &Peripheral,
) -> (Vec<ServiceInfo>, HashMap<GattTarget, Characteristic>) {
    let mut services = Vec::new();
    let mut by_target = HashMap::new();

    for service in peripheral.services() {
        let mut characteristics = Vec::new();
        for characteristic in &service.characteristics {
            by_target
                .entry(GattTarget::new(service.uuid, characteristic.uuid))
                .or_insert_with(|| characteristic.clone());
            let notify_descriptor = characteristic
                .descriptors
                .iter()
                .any(|descriptor| descriptor.uuid == CLIENT_CHARACTERISTIC_CONFIGURATION);
            characteristics.push(
                CharacteristicInfo::new(
                    characteristic.uuid,
                    property_labels(characteristic.properties),
                )
                .with_notify_descriptor(notify_descriptor),
            );
        }
        characteristics.sort_by_key(CharacteristicInfo::uuid);
        services.push(ServiceInfo::new(service.uuid, service.primary, characteristics));
    }

    (services, by_target)
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    let labels: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if labels.is_empty() {
        vec!["none".to_string()]
    } else {
        labels
    }
}

fn write_type(mode: WriteMode) -> WriteType {
    match mode {
        WriteMode::WithResponse => WriteType::WithResponse,
        WriteMode::WithoutResponse => WriteType::WithoutResponse,
    }
}

fn scan_outcome(result: Result<(), btleplug::Error>) -> Option<LinkEvent> {
    result.err().map(|error| LinkEvent::ScanFailed {
        reason: error.to_string(),
    })
}

/// Maps a subscribe result to the event the scheduler expects. Without a
/// configuration descriptor the scheduler has already resolved the
/// subscription, so only a failure is reported.
fn subscribe_outcome(
    characteristic: Uuid,
    has_descriptor: bool,
    result: Result<(), btleplug::Error>,
) -> Option<LinkEvent> {
    if has_descriptor {
        return Some(LinkEvent::DescriptorWrite {
            characteristic,
            status: gatt_status(result),
        });
    }
    result
        .err()
        .map(|error| LinkEvent::NotificationsEnableFailed {
            characteristic,
            reason: error.to_string(),
        })
}

fn gatt_status(result: Result<(), btleplug::Error>) -> GattStatus {
    match result {
        Ok(()) => GattStatus::Success,
        Err(error) => GattStatus::Failure(error.to_string()),
    }
}

fn post(events: &LinkEventSender, event: LinkEvent) {
    if events.send(event).is_err() {
        trace!("link event receiver was dropped");
    }
}
