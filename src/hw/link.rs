use async_trait::async_trait;
use serde::Serialize;
use strum_macros::Display;
use tokio::sync::mpsc;

use crate::error::LinkError;
use crate::gatt::{GattTarget, LinkEvent};

/// Channel on which a link posts hardware completions.
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// Receiving half of [`LinkEventSender`].
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// BLE write mode.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    WithResponse,
    WithoutResponse,
}

/// Host adapter availability.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdapterStatus {
    Ready,
    Unsupported,
    Disabled,
    ApiLevelTooLow,
}

/// How an accepted notification-enable request completes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NotifySetup {
    /// A descriptor write was issued; a `DescriptorWrite` event follows.
    DescriptorWritePending,
    /// The characteristic has no configuration descriptor; nothing follows.
    NoDescriptor,
}

/// Non-blocking access to one BLE adapter and its connected peripheral.
///
/// Every call returns as soon as the request is handed to the stack. Results
/// arrive later as [`LinkEvent`]s on the sender the link was opened with.
/// GATT submissions may be refused with [`LinkError::Busy`] while the stack
/// has a call outstanding.
pub trait HardwareLink: Send {
    fn adapter_status(&self) -> AdapterStatus;

    /// Starts delivering `Advertisement` events.
    ///
    /// # Errors
    ///
    /// Returns an error when no adapter can scan.
    fn start_scan(&mut self) -> Result<(), LinkError>;

    /// Stops delivering `Advertisement` events.
    ///
    /// # Errors
    ///
    /// Returns an error when no adapter is available.
    fn stop_scan(&mut self) -> Result<(), LinkError>;

    /// Starts connecting; completes with `Connected` or `ConnectFailed`.
    ///
    /// # Errors
    ///
    /// Returns an error when no adapter is available.
    fn connect(&mut self, address: &str) -> Result<(), LinkError>;

    /// Drops the link; completes with `Disconnected`.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` when there is no link to drop.
    fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Starts service discovery; completes with `ServicesDiscovered`.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` when there is no link.
    fn discover_services(&mut self) -> Result<(), LinkError>;

    /// Submits a read; completes with `CharacteristicRead`.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when the stack refuses the submission.
    fn read(&mut self, target: &GattTarget) -> Result<(), LinkError>;

    /// Submits a write; completes with `CharacteristicWrite`.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when the stack refuses the submission.
    fn write(&mut self, target: &GattTarget, payload: &[u8], mode: WriteMode)
    -> Result<(), LinkError>;

    /// Enables notifications for a characteristic.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when the stack refuses the submission.
    fn enable_notifications(&mut self, target: &GattTarget) -> Result<NotifySetup, LinkError>;

    /// Disables notifications for a characteristic.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when the stack refuses the submission.
    fn disable_notifications(&mut self, target: &GattTarget) -> Result<(), LinkError>;
}

impl<T: HardwareLink + ?Sized> HardwareLink for Box<T> {
    fn adapter_status(&self) -> AdapterStatus {
        (**self).adapter_status()
    }

    fn start_scan(&mut self) -> Result<(), LinkError> {
        (**self).start_scan()
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        (**self).stop_scan()
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        (**self).connect(address)
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        (**self).disconnect()
    }

    fn discover_services(&mut self) -> Result<(), LinkError> {
        (**self).discover_services()
    }

    fn read(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        (**self).read(target)
    }

    fn write(
        &mut self,
        target: &GattTarget,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError> {
        (**self).write(target, payload, mode)
    }

    fn enable_notifications(&mut self, target: &GattTarget) -> Result<NotifySetup, LinkError> {
        (**self).enable_notifications(target)
    }

    fn disable_notifications(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        (**self).disable_notifications(target)
    }
}

/// Opens a [`HardwareLink`] that reports completions on `events`.
#[async_trait]
pub trait LinkBackend: Send {
    /// Opens the link.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform BLE stack cannot be initialised.
    async fn open(
        self: Box<Self>,
        events: LinkEventSender,
    ) -> Result<Box<dyn HardwareLink>, LinkError>;
}
