use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_with::SerializeDisplay;
use strum_macros::Display;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;
use uuid::Uuid;

use crate::codec::{ElementType, StringTermination, ValueCodec, Values};
use crate::error::GattError;
use crate::hw::WriteMode;

/// Identifier assigned to every operation a Connection accepts.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, derive_more::Display, SerializeDisplay,
)]
#[display("op#{_0}")]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// The hardware action an operation performs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
    Subscribe,
    Unsubscribe,
}

/// A (service, characteristic) pair on the connected peripheral.
///
/// Serialises as `service/characteristic`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, SerializeDisplay)]
pub struct GattTarget {
    service: Uuid,
    characteristic: Uuid,
}

impl GattTarget {
    #[must_use]
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }

    #[must_use]
    pub const fn service(&self) -> Uuid {
        self.service
    }

    #[must_use]
    pub const fn characteristic(&self) -> Uuid {
        self.characteristic
    }
}

impl fmt::Display for GattTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.characteristic)
    }
}

/// Encoded bytes for a write, kept next to the values they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePayload {
    values: Values,
    bytes: Vec<u8>,
    mode: WriteMode,
}

impl WritePayload {
    fn new(values: Values, mode: WriteMode, termination: StringTermination) -> Self {
        let bytes = ValueCodec::encode_with(&values, termination);
        Self {
            values,
            bytes,
            mode,
        }
    }

    #[must_use]
    pub fn values(&self) -> &Values {
        &self.values
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.mode
    }
}

/// A pending hardware action against one characteristic.
///
/// Records are plain data: the queue and the registry each hold a clone, and
/// the completion sink lives in a [`SinkTable`] keyed by [`OperationId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    id: OperationId,
    target: GattTarget,
    kind: OperationKind,
    element: ElementType,
    payload: Option<WritePayload>,
    attempts: u32,
    last_delay: Option<Duration>,
}

impl Operation {
    pub(crate) fn read(id: OperationId, target: GattTarget, element: ElementType) -> Self {
        Self::new(id, target, OperationKind::Read, element, None)
    }

    pub(crate) fn write(
        id: OperationId,
        target: GattTarget,
        values: Values,
        mode: WriteMode,
        termination: StringTermination,
    ) -> Self {
        let element = values.element_type();
        let payload = WritePayload::new(values, mode, termination);
        Self::new(id, target, OperationKind::Write, element, Some(payload))
    }

    pub(crate) fn subscribe(id: OperationId, target: GattTarget, element: ElementType) -> Self {
        Self::new(id, target, OperationKind::Subscribe, element, None)
    }

    fn new(
        id: OperationId,
        target: GattTarget,
        kind: OperationKind,
        element: ElementType,
        payload: Option<WritePayload>,
    ) -> Self {
        Self {
            id,
            target,
            kind,
            element,
            payload,
            attempts: 0,
            last_delay: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    #[must_use]
    pub fn target(&self) -> GattTarget {
        self.target
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Returns the encoded payload for write operations.
    #[must_use]
    pub fn payload(&self) -> Option<&WritePayload> {
        self.payload.as_ref()
    }

    /// Returns how many submissions were refused so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the most recent backoff delay, if the operation was deferred.
    #[must_use]
    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    pub(crate) fn record_deferral(&mut self, delay: Duration) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_delay = Some(delay);
    }
}

/// A successful operation result delivered to a one-shot sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Read(Values),
    Written,
    Subscribed,
}

/// Stream item delivered to subscribers.
pub type NotificationItem = Result<Values, GattError>;

/// Where an operation's result goes once the hardware resolves it.
#[derive(Debug)]
pub enum CompletionSink {
    /// Results are only surfaced as application events.
    Events,
    /// A single result for reads and writes.
    Reply(oneshot::Sender<Result<Completion, GattError>>),
    /// Every notification for a subscription, until it is removed.
    Stream(mpsc::UnboundedSender<NotificationItem>),
}

impl CompletionSink {
    fn fail(self, error: GattError) {
        match self {
            Self::Events => {}
            Self::Reply(reply) => {
                let _ignored = reply.send(Err(error));
            }
            Self::Stream(stream) => {
                let _ignored = stream.send(Err(error));
            }
        }
    }
}

/// Completion sinks keyed by operation id.
#[derive(Debug, Default)]
pub(crate) struct SinkTable {
    sinks: HashMap<OperationId, CompletionSink>,
}

impl SinkTable {
    pub(crate) fn insert(&mut self, id: OperationId, sink: CompletionSink) {
        self.sinks.insert(id, sink);
    }

    /// Delivers a one-shot completion and drops the sink.
    pub(crate) fn complete(&mut self, id: OperationId, completion: Completion) {
        match self.sinks.remove(&id) {
            Some(CompletionSink::Reply(reply)) => {
                let _ignored = reply.send(Ok(completion));
            }
            Some(CompletionSink::Stream(stream)) => {
                // Subscription activation keeps the stream open for notifications.
                self.sinks.insert(id, CompletionSink::Stream(stream));
            }
            Some(CompletionSink::Events) | None => {}
        }
    }

    /// Pushes a notification to a stream sink without consuming it.
    pub(crate) fn notify(&self, id: OperationId, item: NotificationItem) {
        if let Some(CompletionSink::Stream(stream)) = self.sinks.get(&id)
            && stream.send(item).is_err()
        {
            trace!(%id, "subscriber stream receiver was dropped");
        }
    }

    pub(crate) fn fail(&mut self, id: OperationId, error: GattError) {
        if let Some(sink) = self.sinks.remove(&id) {
            sink.fail(error);
        }
    }

    /// Drops a sink without a result; one-shot receivers observe closure.
    pub(crate) fn discard(&mut self, id: OperationId) {
        self.sinks.remove(&id);
    }

    pub(crate) fn clear(&mut self) {
        self.sinks.clear();
    }

    pub(crate) fn fail_detached(sink: CompletionSink, error: GattError) {
        sink.fail(error);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sinks.len()
    }
}
