mod config;
mod connection;
mod directory;
mod dispatch;
mod event;
mod messages;
mod operation;
mod registry;
mod state;
mod uuid_format;

pub use self::config::SchedulerConfig;
pub use self::connection::{ConnectTarget, Connection, EventSender, WriteOptions};
pub use self::directory::{DeviceDirectory, DeviceFilter, Observation, Peripheral};
pub use self::dispatch::{DispatchQueue, RetryPolicy, RetryTarget, RetryTimer, RetryTimers};
pub use self::event::{
    ConnectFailure, DisconnectCause, ErrorReport, GattEvent, GattStatus, LinkEvent,
};
pub use self::messages::ErrorMessages;
pub use self::operation::{
    Completion, CompletionSink, GattTarget, NotificationItem, Operation, OperationId,
    OperationKind, WritePayload,
};
pub use self::registry::PendingRegistry;
pub use self::state::ConnectionState;
pub use self::uuid_format::parse_gatt_uuid;
