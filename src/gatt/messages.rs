use std::borrow::Cow;
use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::error::{ErrorKind, GattError};

use super::event::ErrorReport;

/// Per-Connection table of user-facing error messages.
///
/// ```
/// use blesched::{ErrorKind, ErrorMessages, GattError};
///
/// let messages = ErrorMessages::default()
///     .with_template(ErrorKind::DeviceListEmpty, "Scan first, then pick a device.");
/// let report = messages.report(&GattError::DeviceListEmpty);
///
/// assert_eq!("Scan first, then pick a device.", report.message());
/// assert_eq!(9007, report.code());
/// ```
#[derive(Debug, Clone)]
pub struct ErrorMessages {
    templates: HashMap<ErrorKind, Cow<'static, str>>,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        let templates = ErrorKind::iter()
            .map(|kind| (kind, Cow::Borrowed(default_template(kind))))
            .collect();
        Self { templates }
    }
}

impl ErrorMessages {
    /// Replaces the template for one error kind.
    #[must_use]
    pub fn with_template(mut self, kind: ErrorKind, template: impl Into<Cow<'static, str>>) -> Self {
        self.templates.insert(kind, template.into());
        self
    }

    #[must_use]
    pub fn template(&self, kind: ErrorKind) -> &str {
        self.templates
            .get(&kind)
            .map_or_else(|| default_template(kind), AsRef::as_ref)
    }

    /// Builds the `Error` event payload for an error.
    #[must_use]
    pub fn report(&self, error: &GattError) -> ErrorReport {
        let kind = error.kind();
        ErrorReport::new(kind, self.template(kind).to_string(), error.to_string())
    }
}

fn default_template(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::HardwareUnsupported => "Bluetooth LE is not supported on this device.",
        ErrorKind::HardwareDisabled => "Bluetooth is turned off. Enable it and try again.",
        ErrorKind::ApiLevelTooLow => "This platform's Bluetooth API is too old for BLE.",
        ErrorKind::NoScanInProgress => "There is no scan to stop.",
        ErrorKind::NotConnected => "No device is connected.",
        ErrorKind::IndexOutOfBounds => "There is no device at that position in the list.",
        ErrorKind::DeviceListEmpty => "No devices have been found yet.",
        ErrorKind::InvalidUuidChars => "The UUID contains characters that are not hexadecimal.",
        ErrorKind::InvalidUuidFormat => {
            "The UUID must look like xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx."
        }
        ErrorKind::ConnectRefused => "The device refused the connection. Check that it is paired.",
        ErrorKind::ConnectFailed => "Could not connect to the device.",
        ErrorKind::ConnectTimeout => "The device did not answer in time. Try again.",
        ErrorKind::DisconnectUnknown => "The device disconnected unexpectedly.",
        ErrorKind::SubmissionTimeout => "The Bluetooth stack stayed busy. The request was dropped.",
        ErrorKind::CodecTruncatedBuffer => "The device sent a value of the wrong length.",
        ErrorKind::InvalidValues => "The values cannot be stored in the requested type.",
        ErrorKind::UnknownCharacteristic => "The device does not offer that characteristic.",
        ErrorKind::DeviceNotFound => "No discovered device has that address.",
        ErrorKind::OperationFailed => "The device reported a failure.",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_kind_has_a_non_empty_default() {
        let messages = ErrorMessages::default();

        for kind in ErrorKind::iter() {
            assert!(!messages.template(kind).is_empty(), "{kind} has no template");
        }
    }

    #[test]
    fn report_keeps_error_detail_next_to_template() {
        let messages = ErrorMessages::default();

        let report = messages.report(&GattError::IndexOutOfBounds { index: 4, len: 2 });

        assert_eq!(ErrorKind::IndexOutOfBounds, report.kind());
        assert_eq!(9006, report.code());
        assert_eq!("There is no device at that position in the list.", report.message());
        assert_eq!(
            "device index 4 is out of bounds for 2 discovered devices",
            report.detail()
        );
    }

    #[test]
    fn overrides_only_touch_their_kind() {
        let messages =
            ErrorMessages::default().with_template(ErrorKind::NotConnected, String::from("offline"));

        assert_eq!("offline", messages.template(ErrorKind::NotConnected));
        assert_eq!(
            "No devices have been found yet.",
            messages.template(ErrorKind::DeviceListEmpty)
        );
    }
}
