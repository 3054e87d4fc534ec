use serde::Serialize;
use strum_macros::{Display, EnumIter};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecError;
use crate::gatt::{GattTarget, OperationKind};

/// Errors surfaced to the application by the GATT scheduler.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum GattError {
    #[error("Bluetooth LE is not supported by this host")]
    HardwareUnsupported,
    #[error("the Bluetooth adapter is disabled")]
    HardwareDisabled,
    #[error("the platform Bluetooth API level is too low")]
    ApiLevelTooLow,
    #[error("no scan is in progress")]
    NoScanInProgress,
    #[error("no peripheral is connected")]
    NotConnected,
    #[error("device index {index} is out of bounds for {len} discovered devices")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("the device list is empty")]
    DeviceListEmpty,
    #[error("UUID `{uuid}` contains non-hexadecimal characters")]
    InvalidUuidChars { uuid: String },
    #[error("UUID `{uuid}` is not in xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx form")]
    InvalidUuidFormat { uuid: String },
    #[error("peripheral `{address}` refused the connection")]
    ConnectRefused { address: String },
    #[error("connecting to `{address}` failed")]
    ConnectFailed { address: String },
    #[error("connecting to `{address}` timed out")]
    ConnectTimeout { address: String },
    #[error("the link to `{address}` dropped for an unknown reason")]
    DisconnectUnknown { address: String },
    #[error("{kind} of characteristic {characteristic} was not accepted before the retry ceiling")]
    SubmissionTimeout {
        characteristic: Uuid,
        kind: OperationKind,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("characteristic {characteristic} of service {service} is not offered by the peripheral")]
    UnknownCharacteristic { service: Uuid, characteristic: Uuid },
    #[error("no discovered device has address `{address}`")]
    DeviceNotFound { address: String },
    #[error("{context} failed: {reason}")]
    OperationFailed { context: String, reason: String },
}

impl GattError {
    /// Returns the stable error kind for this error.
    ///
    /// ```
    /// use blesched::{ErrorKind, GattError};
    ///
    /// assert_eq!(ErrorKind::DeviceListEmpty, GattError::DeviceListEmpty.kind());
    /// assert_eq!(9007, GattError::DeviceListEmpty.kind().code());
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HardwareUnsupported => ErrorKind::HardwareUnsupported,
            Self::HardwareDisabled => ErrorKind::HardwareDisabled,
            Self::ApiLevelTooLow => ErrorKind::ApiLevelTooLow,
            Self::NoScanInProgress => ErrorKind::NoScanInProgress,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::DeviceListEmpty => ErrorKind::DeviceListEmpty,
            Self::InvalidUuidChars { .. } => ErrorKind::InvalidUuidChars,
            Self::InvalidUuidFormat { .. } => ErrorKind::InvalidUuidFormat,
            Self::ConnectRefused { .. } => ErrorKind::ConnectRefused,
            Self::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            Self::ConnectTimeout { .. } => ErrorKind::ConnectTimeout,
            Self::DisconnectUnknown { .. } => ErrorKind::DisconnectUnknown,
            Self::SubmissionTimeout { .. } => ErrorKind::SubmissionTimeout,
            Self::Codec(CodecError::TruncatedBuffer { .. }) => ErrorKind::CodecTruncatedBuffer,
            Self::Codec(_) => ErrorKind::InvalidValues,
            Self::UnknownCharacteristic { .. } => ErrorKind::UnknownCharacteristic,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }

    pub(crate) fn from_link(context: &str, target: Option<GattTarget>, error: &LinkError) -> Self {
        match (error, target) {
            (LinkError::NotConnected, _) => Self::NotConnected,
            (LinkError::AdapterUnavailable, _) => Self::HardwareUnsupported,
            (LinkError::UnknownCharacteristic { .. }, Some(target)) => {
                Self::UnknownCharacteristic {
                    service: target.service(),
                    characteristic: target.characteristic(),
                }
            }
            (other, _) => Self::OperationFailed {
                context: context.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Stable, application-facing error kinds with numeric codes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ErrorKind {
    HardwareUnsupported = 9001,
    HardwareDisabled = 9002,
    ApiLevelTooLow = 9003,
    NoScanInProgress = 9004,
    NotConnected = 9005,
    IndexOutOfBounds = 9006,
    DeviceListEmpty = 9007,
    InvalidUuidChars = 9008,
    InvalidUuidFormat = 9009,
    ConnectRefused = 9010,
    ConnectFailed = 9011,
    ConnectTimeout = 9012,
    DisconnectUnknown = 9013,
    SubmissionTimeout = 9014,
    CodecTruncatedBuffer = 9015,
    InvalidValues = 9016,
    UnknownCharacteristic = 9017,
    DeviceNotFound = 9018,
    OperationFailed = 9019,
}

impl ErrorKind {
    /// Returns the numeric code reported alongside `Error` events.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Errors reported synchronously by a hardware link when a call is submitted.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The stack already has an outstanding GATT call; retry later.
    #[error("the BLE stack is busy")]
    Busy,
    #[error("the link has no connected peripheral")]
    NotConnected,
    #[error("characteristic {} is not present on the connected peripheral", target.characteristic())]
    UnknownCharacteristic { target: GattTarget },
    #[error("no BLE adapter is available")]
    AdapterUnavailable,
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
}

impl LinkError {
    /// Returns whether the call may be retried with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain three pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain an empty address")]
    EmptyAddress,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("fixture `{record}` must have the form `<uuid>=<hex>`")]
    MissingCharacteristic { record: String },
    #[error("fixture characteristic `{uuid}` is not a UUID")]
    InvalidCharacteristic { uuid: String },
    #[error("hex payload is invalid")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Errors returned when validating command-line input.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
    #[error("`{value}` is not a valid `{element}` value")]
    InvalidValue { element: String, value: String },
    #[error("no device matching `{target}` was found within {waited}")]
    DeviceNotDiscovered { target: String, waited: String },
    #[error("connection to `{target}` did not become ready: {reason}")]
    ConnectionNotReady { target: String, reason: String },
    #[error("failed while waiting for Ctrl+C")]
    CtrlC { source: std::io::Error },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::codec::ElementType;

    #[test]
    fn error_codes_are_unique() {
        let codes: HashSet<u16> = ErrorKind::iter().map(ErrorKind::code).collect();
        assert_eq!(ErrorKind::iter().count(), codes.len());
    }

    #[rstest]
    #[case::truncated(
        CodecError::TruncatedBuffer { element: ElementType::UInt16, len: 3, width: 2 },
        ErrorKind::CodecTruncatedBuffer
    )]
    #[case::out_of_range(
        CodecError::ValueOutOfRange { element: ElementType::UInt8, value: "300".into() },
        ErrorKind::InvalidValues
    )]
    fn codec_errors_map_to_kinds(#[case] error: CodecError, #[case] expected: ErrorKind) {
        assert_eq!(expected, GattError::from(error).kind());
    }

    #[test]
    fn only_busy_is_retryable() {
        assert!(LinkError::Busy.is_retryable());
        assert!(!LinkError::NotConnected.is_retryable());
        assert!(!LinkError::AdapterUnavailable.is_retryable());
    }

    #[test]
    fn unknown_characteristic_link_error_keeps_target() {
        let target = GattTarget::new(Uuid::from_u128(1), Uuid::from_u128(2));
        let error = GattError::from_link(
            "read",
            Some(target),
            &LinkError::UnknownCharacteristic { target },
        );
        assert_eq!(
            GattError::UnknownCharacteristic {
                service: Uuid::from_u128(1),
                characteristic: Uuid::from_u128(2),
            },
            error
        );
    }
}
