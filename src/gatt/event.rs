use serde::Serialize;
use strum_macros::Display;
use uuid::Uuid;

use crate::codec::Values;
use crate::error::ErrorKind;
use crate::hw::ServiceInfo;

use super::directory::Peripheral;

/// Why establishing a link failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailure {
    /// The peripheral actively refused; pairing is the likely remedy.
    Refused,
    Timeout,
    Unknown,
}

/// Why a link went down.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisconnectCause {
    /// The application asked for the disconnect.
    Requested,
    LinkLoss,
    Unknown,
}

/// Status carried by GATT completion callbacks.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum GattStatus {
    Success,
    Failure(String),
}

/// Events posted by a hardware link to the Connection that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Advertisement {
        address: String,
        name: Option<String>,
        rssi: Option<i16>,
    },
    /// The adapter accepted a scan request but could not start scanning.
    ScanFailed {
        reason: String,
    },
    Connected,
    ConnectFailed(ConnectFailure),
    Disconnected(DisconnectCause),
    ServicesDiscovered(Vec<ServiceInfo>),
    CharacteristicRead {
        characteristic: Uuid,
        value: Vec<u8>,
        status: GattStatus,
    },
    CharacteristicChanged {
        characteristic: Uuid,
        value: Vec<u8>,
    },
    CharacteristicWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    DescriptorWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    /// Enabling notifications failed on a characteristic without a
    /// configuration descriptor, after the subscription was resolved.
    NotificationsEnableFailed {
        characteristic: Uuid,
        reason: String,
    },
    NotificationsDisableFailed {
        characteristic: Uuid,
        reason: String,
    },
}

/// An `Error` event payload.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ErrorReport {
    kind: ErrorKind,
    code: u16,
    message: String,
    detail: String,
}

impl ErrorReport {
    pub(crate) fn new(kind: ErrorKind, message: String, detail: String) -> Self {
        Self {
            kind,
            code: kind.code(),
            message,
            detail,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the templated, user-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying error rendered with its context.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Events surfaced to the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GattEvent {
    DeviceFound {
        peripheral: Peripheral,
    },
    RssiChanged {
        address: String,
        rssi: i16,
    },
    Connected {
        peripheral: Peripheral,
    },
    Disconnected {
        address: String,
        cause: DisconnectCause,
    },
    ValueRead {
        service: Uuid,
        characteristic: Uuid,
        values: Values,
    },
    ValueChanged {
        service: Uuid,
        characteristic: Uuid,
        values: Values,
    },
    ValueWritten {
        service: Uuid,
        characteristic: Uuid,
        values: Values,
    },
    Error(ErrorReport),
}

impl GattEvent {
    /// Returns the error kind for `Error` events.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error(report) => Some(report.kind()),
            _ => None,
        }
    }
}
