use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::codec::{ElementType, StringTermination, ValueCodec, Values};
use crate::error::GattError;
use crate::hw::{
    AdapterStatus, HardwareLink, NotifySetup, ServiceInfo, WriteMode, find_characteristic,
};
use crate::utils::format_hex;

use super::config::SchedulerConfig;
use super::directory::{DeviceDirectory, Observation, Peripheral};
use super::dispatch::{DispatchQueue, RetryPolicy, RetryTarget, RetryTimer, RetryTimers};
use super::event::{ConnectFailure, DisconnectCause, GattEvent, GattStatus, LinkEvent};
use super::messages::ErrorMessages;
use super::operation::{
    Completion, CompletionSink, GattTarget, Operation, OperationId, OperationKind, SinkTable,
};
use super::registry::PendingRegistry;
use super::state::ConnectionState;
use super::uuid_format::parse_gatt_uuid;

/// Channel on which a Connection publishes application events.
pub type EventSender = mpsc::UnboundedSender<GattEvent>;

/// Which discovered peripheral to connect to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConnectTarget {
    /// 0-based position in the device directory.
    Index(usize),
    Address(String),
}

impl FromStr for ConnectTarget {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(value
            .parse::<usize>()
            .map_or_else(|_error| Self::Address(value.to_string()), Self::Index))
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Address(address) => f.write_str(address),
        }
    }
}

/// Options for a typed write.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct WriteOptions {
    mode: WriteMode,
    termination: StringTermination,
}

impl WriteOptions {
    #[must_use]
    pub fn new(mode: WriteMode, termination: StringTermination) -> Self {
        Self { mode, termination }
    }

    #[must_use]
    pub fn without_response(mut self) -> Self {
        self.mode = WriteMode::WithoutResponse;
        self
    }

    #[must_use]
    pub fn terminated(mut self) -> Self {
        self.termination = StringTermination::Terminated;
        self
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    #[must_use]
    pub fn termination(&self) -> StringTermination {
        self.termination
    }
}

enum Submission {
    AwaitCallback,
    Resolved,
}

/// The single owner of a hardware link and everything scheduled against it.
///
/// A Connection performs no I/O of its own. Application requests and
/// hardware events are fed in through methods; hardware calls go out through
/// the [`HardwareLink`] and results leave as [`GattEvent`]s and completion
/// sinks. Retries are kept as deadlines that the owner fires with
/// [`Connection::on_retry_timer`].
pub struct Connection<L> {
    link: L,
    retry: RetryPolicy,
    rescan_on_link_loss: bool,
    messages: ErrorMessages,
    events: EventSender,
    state: ConnectionState,
    scanning: bool,
    directory: DeviceDirectory,
    peripheral: Option<Peripheral>,
    services: Vec<ServiceInfo>,
    registry: PendingRegistry,
    queue: DispatchQueue,
    retries: RetryTimers,
    sinks: SinkTable,
    next_id: u64,
    pending_connect: Option<Peripheral>,
}

impl<L: HardwareLink> Connection<L> {
    /// Creates an idle Connection over `link`.
    pub fn new(link: L, config: SchedulerConfig, events: EventSender) -> Self {
        Self {
            link,
            retry: config.retry(),
            rescan_on_link_loss: config.rescan_on_link_loss(),
            messages: config.messages().clone(),
            events,
            state: ConnectionState::Idle,
            scanning: false,
            directory: DeviceDirectory::new(config.device_filter().cloned()),
            peripheral: None,
            services: Vec::new(),
            registry: PendingRegistry::default(),
            queue: DispatchQueue::default(),
            retries: RetryTimers::default(),
            sinks: SinkTable::default(),
            next_id: 0,
            pending_connect: None,
        }
    }

    /// Clears the device directory and starts scanning.
    ///
    /// # Errors
    ///
    /// Returns the adapter error when the host cannot scan.
    #[instrument(skip(self), level = "info")]
    pub fn start_scanning(&mut self) -> Result<(), GattError> {
        self.begin_scan().map_err(|error| self.reject(error, None))
    }

    /// Stops scanning, keeping the directory.
    ///
    /// # Errors
    ///
    /// Returns `NoScanInProgress` when no scan is running.
    #[instrument(skip(self), level = "info")]
    pub fn stop_scanning(&mut self) -> Result<(), GattError> {
        if !self.scanning {
            return Err(self.reject(GattError::NoScanInProgress, None));
        }
        if let Err(error) = self.link.stop_scan() {
            warn!(%error, "stopping the scan failed");
        }
        self.scanning = false;
        if self.state == ConnectionState::Scanning {
            self.transition(ConnectionState::Idle);
        }
        Ok(())
    }

    /// Connects to a peripheral from the directory, tearing down any link to
    /// a different peripheral first.
    ///
    /// # Errors
    ///
    /// Returns `DeviceListEmpty`, `IndexOutOfBounds` or `DeviceNotFound` when
    /// the target does not resolve. Link failures arrive later as events.
    #[instrument(skip(self), level = "info", fields(%target))]
    pub fn connect(&mut self, target: ConnectTarget) -> Result<(), GattError> {
        let peripheral = self
            .select_peripheral(&target)
            .map_err(|error| self.reject(error, None))?;

        if self.state.is_linked() {
            let same_peripheral = self
                .peripheral
                .as_ref()
                .is_some_and(|current| current.address() == peripheral.address());
            if same_peripheral {
                debug!(address = peripheral.address(), "already linked to peripheral");
                return Ok(());
            }
            info!(
                address = peripheral.address(),
                "tearing down the current link before connecting"
            );
            self.pending_connect = Some(peripheral);
            self.request_disconnect();
        } else if self.state == ConnectionState::Disconnecting {
            self.pending_connect = Some(peripheral);
        } else {
            self.begin_connecting(peripheral);
        }
        Ok(())
    }

    /// Drops the current link. The Connection settles in `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` when there is no link.
    #[instrument(skip(self), level = "info")]
    pub fn disconnect(&mut self) -> Result<(), GattError> {
        if !self.state.is_linked() {
            return Err(self.reject(GattError::NotConnected, None));
        }
        self.pending_connect = None;
        self.request_disconnect();
        Ok(())
    }

    /// Schedules a typed read.
    ///
    /// # Errors
    ///
    /// Returns UUID, connection and characteristic validation errors before
    /// anything is queued. The same error is delivered to `sink`.
    #[instrument(skip(self, sink), level = "debug", fields(%element))]
    pub fn read_values(
        &mut self,
        service: &str,
        characteristic: &str,
        element: ElementType,
        sink: CompletionSink,
    ) -> Result<OperationId, GattError> {
        match self.resolve_target(service, characteristic) {
            Ok(target) => {
                let id = self.allocate_id();
                Ok(self.schedule(Operation::read(id, target, element), sink))
            }
            Err(error) => Err(self.reject(error, Some(sink))),
        }
    }

    /// Schedules a typed write.
    ///
    /// # Errors
    ///
    /// Returns UUID, connection and characteristic validation errors before
    /// anything is queued. The same error is delivered to `sink`.
    #[instrument(skip(self, values, sink), level = "debug", fields(element = %values.element_type(), count = values.len()))]
    pub fn write_values(
        &mut self,
        service: &str,
        characteristic: &str,
        values: Values,
        options: WriteOptions,
        sink: CompletionSink,
    ) -> Result<OperationId, GattError> {
        match self.resolve_target(service, characteristic) {
            Ok(target) => {
                let id = self.allocate_id();
                let operation =
                    Operation::write(id, target, values, options.mode(), options.termination());
                Ok(self.schedule(operation, sink))
            }
            Err(error) => Err(self.reject(error, Some(sink))),
        }
    }

    /// Schedules a subscription. It stays registered, receiving every
    /// notification, until [`Connection::unsubscribe`] removes it.
    ///
    /// # Errors
    ///
    /// Returns UUID, connection and characteristic validation errors before
    /// anything is queued. The same error is delivered to `sink`.
    #[instrument(skip(self, sink), level = "debug", fields(%element))]
    pub fn subscribe(
        &mut self,
        service: &str,
        characteristic: &str,
        element: ElementType,
        sink: CompletionSink,
    ) -> Result<OperationId, GattError> {
        match self.resolve_target(service, characteristic) {
            Ok(target) => {
                let id = self.allocate_id();
                Ok(self.schedule(Operation::subscribe(id, target, element), sink))
            }
            Err(error) => Err(self.reject(error, Some(sink))),
        }
    }

    /// Removes every subscription on a characteristic and disables
    /// notifications outside the dispatch queue.
    ///
    /// # Errors
    ///
    /// Returns UUID, connection and characteristic validation errors.
    #[instrument(skip(self), level = "debug")]
    pub fn unsubscribe(&mut self, service: &str, characteristic: &str) -> Result<(), GattError> {
        let target = self
            .resolve_target(service, characteristic)
            .map_err(|error| self.reject(error, None))?;

        let removed = self
            .registry
            .remove_where(&target.characteristic(), |operation| {
                operation.kind() == OperationKind::Subscribe && operation.target() == target
            });
        for operation in &removed {
            self.sinks.discard(operation.id());
        }
        debug!(%target, removed = removed.len(), "subscriptions removed");

        self.submit_unsubscribe(target, None);
        Ok(())
    }

    /// Routes one hardware event to its intake function.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Advertisement {
                address,
                name,
                rssi,
            } => self.on_advertisement(&address, name.as_deref(), rssi),
            LinkEvent::ScanFailed { reason } => self.on_scan_failed(reason),
            LinkEvent::Connected => self.on_connected(),
            LinkEvent::ConnectFailed(failure) => self.on_connect_failed(failure),
            LinkEvent::Disconnected(cause) => self.on_disconnected(cause),
            LinkEvent::ServicesDiscovered(services) => self.on_services_discovered(services),
            LinkEvent::CharacteristicRead {
                characteristic,
                value,
                status,
            } => self.on_characteristic_read(characteristic, &value, status),
            LinkEvent::CharacteristicChanged {
                characteristic,
                value,
            } => self.on_characteristic_changed(characteristic, &value),
            LinkEvent::CharacteristicWrite {
                characteristic,
                status,
            } => self.on_characteristic_write(characteristic, status),
            LinkEvent::DescriptorWrite {
                characteristic,
                status,
            } => self.on_descriptor_write(characteristic, status),
            LinkEvent::NotificationsEnableFailed {
                characteristic,
                reason,
            } => self.on_notifications_enable_failed(characteristic, reason),
            LinkEvent::NotificationsDisableFailed {
                characteristic,
                reason,
            } => self.on_notifications_disable_failed(characteristic, reason),
        }
    }

    pub fn on_advertisement(&mut self, address: &str, name: Option<&str>, rssi: Option<i16>) {
        if !self.scanning {
            trace!(address, "ignoring advertisement outside a scan");
            return;
        }
        match self.directory.observe(address, name, rssi) {
            Observation::Discovered(peripheral) => {
                debug!(address, ?name, ?rssi, "device found");
                self.emit(GattEvent::DeviceFound { peripheral });
            }
            Observation::RssiChanged(peripheral) => {
                if let Some(rssi) = peripheral.rssi() {
                    self.emit(GattEvent::RssiChanged {
                        address: peripheral.address().to_string(),
                        rssi,
                    });
                }
            }
            Observation::Unchanged | Observation::Filtered => {}
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub fn on_scan_failed(&mut self, reason: String) {
        if !self.scanning {
            trace!("ignoring scan failure outside a scan");
            return;
        }
        self.scanning = false;
        if self.state == ConnectionState::Scanning {
            self.transition(ConnectionState::Idle);
        }
        self.report(&GattError::OperationFailed {
            context: "scanning".to_string(),
            reason,
        });
    }

    #[instrument(skip(self), level = "debug")]
    pub fn on_connected(&mut self) {
        if self.state != ConnectionState::Connecting {
            trace!(state = %self.state, "ignoring stale connected event");
            return;
        }
        self.transition(ConnectionState::ServicesDiscovering);
        if let Err(error) = self.link.discover_services() {
            warn!(%error, "service discovery could not start");
            self.on_connect_failed(ConnectFailure::Unknown);
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub fn on_connect_failed(&mut self, failure: ConnectFailure) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::ServicesDiscovering
        ) {
            trace!(state = %self.state, "ignoring stale connect failure");
            return;
        }
        if self.state == ConnectionState::ServicesDiscovering
            && let Err(error) = self.link.disconnect()
        {
            debug!(%error, "link was already down after failed discovery");
        }
        self.transition(ConnectionState::Disconnecting);

        let address = self.take_peripheral_address();
        self.services.clear();
        let error = match failure {
            ConnectFailure::Refused => GattError::ConnectRefused { address },
            ConnectFailure::Timeout => GattError::ConnectTimeout { address },
            ConnectFailure::Unknown => GattError::ConnectFailed { address },
        };
        self.report(&error);

        if let Some(next) = self.pending_connect.take() {
            self.begin_connecting(next);
        } else {
            self.settle_after_link_down(false);
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub fn on_disconnected(&mut self, cause: DisconnectCause) {
        if !self.state.is_linked() && self.state != ConnectionState::Disconnecting {
            trace!(state = %self.state, "ignoring disconnect without a link");
            return;
        }
        self.transition(ConnectionState::Disconnecting);

        let address = self.take_peripheral_address();
        self.services.clear();
        self.abandon_operations();
        info!(address, %cause, "disconnected");
        self.emit(GattEvent::Disconnected {
            address: address.clone(),
            cause,
        });
        if cause == DisconnectCause::Unknown {
            self.report(&GattError::DisconnectUnknown { address });
        }

        if let Some(next) = self.pending_connect.take() {
            self.begin_connecting(next);
        } else {
            self.settle_after_link_down(cause == DisconnectCause::Requested);
        }
    }

    #[instrument(skip(self, services), level = "debug", fields(count = services.len()))]
    pub fn on_services_discovered(&mut self, services: Vec<ServiceInfo>) {
        if self.state != ConnectionState::ServicesDiscovering {
            trace!(state = %self.state, "ignoring stale service discovery");
            return;
        }
        self.services = services;
        self.transition(ConnectionState::Ready);
        if let Some(peripheral) = self.peripheral.clone() {
            info!(address = peripheral.address(), "connected");
            self.emit(GattEvent::Connected { peripheral });
        }
    }

    #[instrument(skip(self, value, status), level = "trace", fields(%characteristic, len = value.len()))]
    pub fn on_characteristic_read(
        &mut self,
        characteristic: Uuid,
        value: &[u8],
        status: GattStatus,
    ) {
        let Some(operation) = self.take_in_flight(OperationKind::Read, characteristic) else {
            return;
        };
        let outcome = match status {
            GattStatus::Success => {
                ValueCodec::decode(operation.element(), value).map_err(GattError::from)
            }
            GattStatus::Failure(reason) => Err(GattError::OperationFailed {
                context: format!("read of {}", operation.target()),
                reason,
            }),
        };
        match outcome {
            Ok(values) => {
                self.emit(GattEvent::ValueRead {
                    service: operation.target().service(),
                    characteristic,
                    values: values.clone(),
                });
                self.sinks.complete(operation.id(), Completion::Read(values));
            }
            Err(error) => self.fail_resolved(&operation, error),
        }
        self.submit_head();
    }

    #[instrument(skip(self, value), level = "trace", fields(%characteristic, len = value.len()))]
    pub fn on_characteristic_changed(&mut self, characteristic: Uuid, value: &[u8]) {
        if self.state != ConnectionState::Ready {
            trace!("ignoring notification without a ready link");
            return;
        }
        let subscribers: Vec<Operation> = self
            .registry
            .operations_for(&characteristic)
            .into_iter()
            .filter(|operation| operation.kind() == OperationKind::Subscribe)
            .collect();
        if subscribers.is_empty() {
            trace!("notification has no subscribers");
            return;
        }
        for operation in subscribers {
            match ValueCodec::decode(operation.element(), value) {
                Ok(values) => {
                    self.emit(GattEvent::ValueChanged {
                        service: operation.target().service(),
                        characteristic,
                        values: values.clone(),
                    });
                    self.sinks.notify(operation.id(), Ok(values));
                }
                Err(error) => {
                    debug!(payload = %format_hex(value), %error, "notification did not decode");
                    let error = GattError::from(error);
                    self.sinks.notify(operation.id(), Err(error.clone()));
                    self.report(&error);
                }
            }
        }
    }

    #[instrument(skip(self, status), level = "trace", fields(%characteristic))]
    pub fn on_characteristic_write(&mut self, characteristic: Uuid, status: GattStatus) {
        let Some(operation) = self.take_in_flight(OperationKind::Write, characteristic) else {
            return;
        };
        match status {
            GattStatus::Success => {
                if let Some(payload) = operation.payload() {
                    self.emit(GattEvent::ValueWritten {
                        service: operation.target().service(),
                        characteristic,
                        values: payload.values().clone(),
                    });
                }
                self.sinks.complete(operation.id(), Completion::Written);
            }
            GattStatus::Failure(reason) => {
                let error = GattError::OperationFailed {
                    context: format!("write of {}", operation.target()),
                    reason,
                };
                self.fail_resolved(&operation, error);
            }
        }
        self.submit_head();
    }

    #[instrument(skip(self, status), level = "trace", fields(%characteristic))]
    pub fn on_descriptor_write(&mut self, characteristic: Uuid, status: GattStatus) {
        let Some(operation) = self.take_in_flight(OperationKind::Subscribe, characteristic) else {
            return;
        };
        match status {
            GattStatus::Success => {
                debug!(id = %operation.id(), "subscription active");
                self.sinks.complete(operation.id(), Completion::Subscribed);
            }
            GattStatus::Failure(reason) => {
                self.registry.remove(&characteristic, operation.id());
                let error = GattError::OperationFailed {
                    context: format!("enabling notifications on {}", operation.target()),
                    reason,
                };
                self.fail_resolved(&operation, error);
            }
        }
        self.submit_head();
    }

    /// Drops subscriptions that were resolved on `characteristic` but never
    /// took effect. Subscriptions still queued are submitted as usual.
    #[instrument(skip(self), level = "debug", fields(%characteristic))]
    pub fn on_notifications_enable_failed(&mut self, characteristic: Uuid, reason: String) {
        if self.state != ConnectionState::Ready {
            trace!("ignoring notification setup failure without a ready link");
            return;
        }
        let queue = &self.queue;
        let dropped = self.registry.remove_where(&characteristic, |operation| {
            operation.kind() == OperationKind::Subscribe && !queue.contains(operation.id())
        });
        let Some(first) = dropped.first() else {
            trace!("no resolved subscription to drop");
            return;
        };
        let error = GattError::OperationFailed {
            context: format!("enabling notifications on {}", first.target()),
            reason,
        };
        for operation in &dropped {
            self.sinks.fail(operation.id(), error.clone());
        }
        self.report(&error);
    }

    #[instrument(skip(self), level = "debug", fields(%characteristic))]
    pub fn on_notifications_disable_failed(&mut self, characteristic: Uuid, reason: String) {
        if self.state != ConnectionState::Ready {
            trace!("ignoring notification teardown failure without a ready link");
            return;
        }
        self.report(&GattError::OperationFailed {
            context: format!("disabling notifications on {characteristic}"),
            reason,
        });
    }

    /// Fires every retry whose deadline is at or before `now`.
    pub fn on_retry_timer(&mut self, now: Instant) {
        for timer in self.retries.take_due(now) {
            match timer.target() {
                RetryTarget::Head(id) => {
                    if self.queue.is_awaiting_retry(id) {
                        debug!(%id, delay = ?timer.delay(), "retrying deferred submission");
                        self.submit_head();
                    } else {
                        trace!(%id, "ignoring retry for an operation that is no longer head");
                    }
                }
                RetryTarget::Unsubscribe(target) => {
                    if self.state == ConnectionState::Ready {
                        self.submit_unsubscribe(target, Some(timer.delay()));
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Returns the device directory in discovery order.
    #[must_use]
    pub fn devices(&self) -> Vec<Peripheral> {
        self.directory.list()
    }

    /// Returns the service snapshot of the current link.
    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    #[must_use]
    pub fn connected_peripheral(&self) -> Option<&Peripheral> {
        self.peripheral.as_ref()
    }

    #[must_use]
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    #[must_use]
    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&Operation> {
        self.queue.in_flight()
    }

    /// Returns the earliest pending retry deadline.
    #[must_use]
    pub fn next_retry_deadline(&self) -> Option<Instant> {
        self.retries.next_deadline()
    }

    pub fn pending_retries(&self) -> impl Iterator<Item = &RetryTimer> {
        self.retries.iter()
    }

    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn begin_scan(&mut self) -> Result<(), GattError> {
        match self.link.adapter_status() {
            AdapterStatus::Ready => {}
            AdapterStatus::Unsupported => return Err(GattError::HardwareUnsupported),
            AdapterStatus::Disabled => return Err(GattError::HardwareDisabled),
            AdapterStatus::ApiLevelTooLow => return Err(GattError::ApiLevelTooLow),
        }
        self.link
            .start_scan()
            .map_err(|error| GattError::from_link("starting the scan", None, &error))?;
        self.directory.clear();
        self.scanning = true;
        if !self.state.is_linked() {
            self.transition(ConnectionState::Scanning);
        }
        Ok(())
    }

    fn select_peripheral(&self, target: &ConnectTarget) -> Result<Peripheral, GattError> {
        match target {
            ConnectTarget::Index(index) => {
                if self.directory.is_empty() {
                    return Err(GattError::DeviceListEmpty);
                }
                self.directory
                    .get(*index)
                    .cloned()
                    .ok_or(GattError::IndexOutOfBounds {
                        index: *index,
                        len: self.directory.len(),
                    })
            }
            ConnectTarget::Address(address) => self
                .directory
                .find(address)
                .cloned()
                .ok_or_else(|| GattError::DeviceNotFound {
                    address: address.clone(),
                }),
        }
    }

    fn begin_connecting(&mut self, peripheral: Peripheral) {
        if self.scanning {
            if let Err(error) = self.link.stop_scan() {
                warn!(%error, "stopping the scan before connecting failed");
            }
            self.scanning = false;
        }
        self.abandon_operations();
        self.services.clear();
        info!(address = peripheral.address(), "connecting");
        let address = peripheral.address().to_string();
        self.peripheral = Some(peripheral);
        self.transition(ConnectionState::Connecting);
        if let Err(error) = self.link.connect(&address) {
            warn!(%error, "link refused the connect request");
            self.on_connect_failed(ConnectFailure::Unknown);
        }
    }

    fn request_disconnect(&mut self) {
        self.transition(ConnectionState::Disconnecting);
        if let Err(error) = self.link.disconnect() {
            debug!(%error, "link had nothing to drop");
            self.on_disconnected(DisconnectCause::Requested);
        }
    }

    fn settle_after_link_down(&mut self, requested: bool) {
        if !requested && self.rescan_on_link_loss {
            if let Err(error) = self.begin_scan() {
                self.report(&error);
                self.transition(ConnectionState::Idle);
            }
        } else {
            self.transition(ConnectionState::Idle);
        }
    }

    fn take_peripheral_address(&mut self) -> String {
        self.peripheral
            .take()
            .map(|peripheral| peripheral.address().to_string())
            .unwrap_or_default()
    }

    /// Drops bookkeeping for the previous link without invoking any sink.
    fn abandon_operations(&mut self) {
        let registered = self.registry.clear();
        let queued = self.queue.clear();
        self.retries.clear();
        self.sinks.clear();
        if !registered.is_empty() || !queued.is_empty() {
            debug!(
                registered = registered.len(),
                queued = queued.len(),
                "abandoned operations from the previous link"
            );
        }
    }

    fn resolve_target(&self, service: &str, characteristic: &str) -> Result<GattTarget, GattError> {
        let service = parse_gatt_uuid(service)?;
        let characteristic = parse_gatt_uuid(characteristic)?;
        if self.state != ConnectionState::Ready {
            return Err(GattError::NotConnected);
        }
        if find_characteristic(&self.services, &service, &characteristic).is_none() {
            return Err(GattError::UnknownCharacteristic {
                service,
                characteristic,
            });
        }
        Ok(GattTarget::new(service, characteristic))
    }

    fn allocate_id(&mut self) -> OperationId {
        self.next_id += 1;
        OperationId::new(self.next_id)
    }

    fn schedule(&mut self, operation: Operation, sink: CompletionSink) -> OperationId {
        let id = operation.id();
        debug!(%id, kind = %operation.kind(), target = %operation.target(), "operation scheduled");
        self.sinks.insert(id, sink);
        self.registry.register(operation.clone());
        if self.queue.push(operation) {
            self.submit_head();
        }
        id
    }

    /// Submits queue heads until one is in flight, deferred, or the queue
    /// drains.
    fn submit_head(&mut self) {
        while let Some(head) = self.queue.head().cloned() {
            let target = head.target();
            if head.kind() == OperationKind::Subscribe && !self.registry.contains(head.id()) {
                trace!(id = %head.id(), "skipping subscription removed before submission");
                self.queue.dequeue_if_head(head.id());
                continue;
            }

            let submitted = match head.kind() {
                OperationKind::Read => self
                    .link
                    .read(&target)
                    .map(|()| Submission::AwaitCallback),
                OperationKind::Write => {
                    let (bytes, mode) = head
                        .payload()
                        .map_or((&[][..], WriteMode::default()), |payload| {
                            (payload.bytes(), payload.mode())
                        });
                    self.link
                        .write(&target, bytes, mode)
                        .map(|()| Submission::AwaitCallback)
                }
                OperationKind::Subscribe => {
                    self.link
                        .enable_notifications(&target)
                        .map(|setup| match setup {
                            NotifySetup::DescriptorWritePending => Submission::AwaitCallback,
                            NotifySetup::NoDescriptor => Submission::Resolved,
                        })
                }
                OperationKind::Unsubscribe => self
                    .link
                    .disable_notifications(&target)
                    .map(|()| Submission::Resolved),
            };

            match submitted {
                Ok(Submission::AwaitCallback) => {
                    trace!(id = %head.id(), "operation in flight");
                    self.queue.mark_in_flight();
                    return;
                }
                Ok(Submission::Resolved) => {
                    debug!(id = %head.id(), "operation resolved without a callback");
                    self.queue.dequeue_if_head(head.id());
                    self.sinks.complete(head.id(), Completion::Subscribed);
                }
                Err(error) if error.is_retryable() => {
                    if self.defer_head(&head) {
                        return;
                    }
                }
                Err(error) => {
                    let context = format!("{} of {target}", head.kind());
                    let error = GattError::from_link(&context, Some(target), &error);
                    self.fail_queued(&head, error);
                }
            }
        }
    }

    /// Schedules a retry for the head; returns `false` when the ceiling was
    /// reached and the head was abandoned instead.
    fn defer_head(&mut self, head: &Operation) -> bool {
        let Some(delay) = self.retry.next_delay(head.last_delay()) else {
            warn!(id = %head.id(), attempts = head.attempts(), "retry ceiling reached");
            let error = GattError::SubmissionTimeout {
                characteristic: head.target().characteristic(),
                kind: head.kind(),
            };
            self.fail_queued(head, error);
            return false;
        };

        if let Some(live) = self.queue.head_mut() {
            live.record_deferral(delay);
        }
        self.queue.mark_awaiting_retry();
        self.retries
            .schedule(Instant::now(), delay, RetryTarget::Head(head.id()));
        debug!(id = %head.id(), ?delay, "hardware busy, submission deferred");
        true
    }

    fn submit_unsubscribe(&mut self, target: GattTarget, previous: Option<Duration>) {
        match self.link.disable_notifications(&target) {
            Ok(()) => debug!(%target, "notifications disabled"),
            Err(error) if error.is_retryable() => match self.retry.next_delay(previous) {
                Some(delay) => {
                    debug!(%target, ?delay, "hardware busy, unsubscribe deferred");
                    self.retries
                        .schedule(Instant::now(), delay, RetryTarget::Unsubscribe(target));
                }
                None => {
                    warn!(%target, "retry ceiling reached while unsubscribing");
                    self.report(&GattError::SubmissionTimeout {
                        characteristic: target.characteristic(),
                        kind: OperationKind::Unsubscribe,
                    });
                }
            },
            Err(error) => {
                let error =
                    GattError::from_link("disabling notifications", Some(target), &error);
                self.report(&error);
            }
        }
    }

    /// Dequeues the in-flight head if a callback matches it; stale callbacks get `None`.
    fn take_in_flight(&mut self, kind: OperationKind, characteristic: Uuid) -> Option<Operation> {
        if self.state != ConnectionState::Ready
            || !self.queue.in_flight_matches(kind, &characteristic)
        {
            trace!(%kind, %characteristic, "ignoring stale completion");
            return None;
        }
        let id = self.queue.head()?.id();
        let operation = self.queue.dequeue_if_head(id)?;
        if kind != OperationKind::Subscribe {
            self.registry.remove(&characteristic, id);
        }
        Some(operation)
    }

    fn fail_queued(&mut self, operation: &Operation, error: GattError) {
        self.queue.dequeue_if_head(operation.id());
        self.registry
            .remove(&operation.target().characteristic(), operation.id());
        self.fail_resolved(operation, error);
    }

    fn fail_resolved(&mut self, operation: &Operation, error: GattError) {
        self.sinks.fail(operation.id(), error.clone());
        self.report(&error);
    }

    fn reject(&self, error: GattError, sink: Option<CompletionSink>) -> GattError {
        if let Some(sink) = sink {
            SinkTable::fail_detached(sink, error.clone());
        }
        self.report(&error);
        error
    }

    fn report(&self, error: &GattError) {
        warn!(kind = %error.kind(), %error, "reporting error");
        self.emit(GattEvent::Error(self.messages.report(error)));
    }

    fn emit(&self, event: GattEvent) {
        if self.events.send(event).is_err() {
            trace!("application event receiver was dropped");
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "unexpected connection state transition");
        }
        debug!(from = %self.state, to = %next, "connection state changed");
        self.state = next;
    }
}
