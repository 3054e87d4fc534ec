use serde::Serialize;
use strum_macros::Display;
use uuid::Uuid;

use crate::codec::Values;
use crate::error::{ErrorKind, GattError};
use crate::gatt::Peripheral;
use crate::hw::WriteMode;

/// Result of the `scan` command.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScanReport {
    pub(crate) devices: Vec<Peripheral>,
}

/// Result of the `read` command.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReadReport {
    pub(crate) peripheral: Peripheral,
    pub(crate) service: Uuid,
    pub(crate) characteristic: Uuid,
    pub(crate) values: Values,
}

/// Result of the `write` command.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WriteReport {
    pub(crate) peripheral: Peripheral,
    pub(crate) service: Uuid,
    pub(crate) characteristic: Uuid,
    pub(crate) values: Values,
    pub(crate) mode: WriteMode,
}

/// One notification printed by the `subscribe` command.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NotificationRecord {
    pub(crate) index: usize,
    #[serde(flatten)]
    pub(crate) outcome: NotificationOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum NotificationOutcome {
    Values(Values),
    Error { kind: ErrorKind, detail: String },
}

impl NotificationOutcome {
    pub(crate) fn from_item(item: Result<Values, GattError>) -> Self {
        match item {
            Ok(values) => Self::Values(values),
            Err(error) => Self::Error {
                kind: error.kind(),
                detail: error.to_string(),
            },
        }
    }
}

/// Why a subscription stopped printing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum StopReason {
    ReachedLimit,
    Interrupted,
    StreamClosed,
}

/// Closing summary of the `subscribe` command.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubscriptionSummary {
    pub(crate) peripheral: Peripheral,
    pub(crate) characteristic: Uuid,
    pub(crate) received: usize,
    pub(crate) stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn notification_errors_serialise_with_kind() {
        let record = NotificationRecord {
            index: 3,
            outcome: NotificationOutcome::from_item(Err(GattError::NotConnected)),
        };

        assert_eq!(
            json!({
                "index": 3,
                "error": { "kind": "not_connected", "detail": "no peripheral is connected" },
            }),
            serde_json::to_value(&record).expect("record should serialise")
        );
    }

    #[test]
    fn notification_values_serialise_under_values() {
        let record = NotificationRecord {
            index: 1,
            outcome: NotificationOutcome::from_item(Ok(Values::UInt8(vec![42]))),
        };

        assert_eq!(
            json!({
                "index": 1,
                "values": { "type": "uint8", "values": [42] },
            }),
            serde_json::to_value(&record).expect("record should serialise")
        );
    }
}
