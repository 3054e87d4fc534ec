use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::codec::{ElementType, Values};
use crate::error::{GattError, LinkError};
use crate::gatt::{
    Completion, CompletionSink, ConnectTarget, Connection, ConnectionState, GattEvent,
    NotificationItem, OperationId, Peripheral, SchedulerConfig, WriteOptions,
};
use crate::hw::{HardwareLink, LinkBackend, LinkEventReceiver, ServiceInfo};

/// Application events published by a [`GattClient`].
pub type EventStream = UnboundedReceiverStream<GattEvent>;

type Reply<T> = oneshot::Sender<Result<T, GattError>>;

enum Request {
    StartScanning(Reply<()>),
    StopScanning(Reply<()>),
    Connect(ConnectTarget, Reply<()>),
    Disconnect(Reply<()>),
    Read {
        service: String,
        characteristic: String,
        element: ElementType,
        reply: Reply<Completion>,
    },
    Write {
        service: String,
        characteristic: String,
        values: Values,
        options: WriteOptions,
        reply: Reply<Completion>,
    },
    Subscribe {
        service: String,
        characteristic: String,
        element: ElementType,
        stream: mpsc::UnboundedSender<NotificationItem>,
        accepted: Reply<OperationId>,
    },
    Unsubscribe {
        service: String,
        characteristic: String,
        reply: Reply<()>,
    },
    Snapshot(oneshot::Sender<ClientSnapshot>),
}

/// Point-in-time view of a client's connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSnapshot {
    state: ConnectionState,
    scanning: bool,
    devices: Vec<Peripheral>,
    peripheral: Option<Peripheral>,
    services: Vec<ServiceInfo>,
    queued: usize,
    registered: usize,
}

impl ClientSnapshot {
    fn capture<L: HardwareLink>(connection: &Connection<L>) -> Self {
        Self {
            state: connection.state(),
            scanning: connection.is_scanning(),
            devices: connection.devices(),
            peripheral: connection.connected_peripheral().cloned(),
            services: connection.services().to_vec(),
            queued: connection.queue().len(),
            registered: connection.registry().len(),
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

    #[must_use]
    pub fn devices(&self) -> &[Peripheral] {
        &self.devices
    }

    #[must_use]
    pub fn peripheral(&self) -> Option<&Peripheral> {
        self.peripheral.as_ref()
    }

    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// Operations waiting in or holding the dispatch queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Operations in the pending registry, subscriptions included.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// An active subscription's notification stream.
///
/// The stream ends when the subscription is removed or the link drops.
#[derive(Debug)]
pub struct Subscription {
    id: OperationId,
    notifications: UnboundedReceiverStream<NotificationItem>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Waits for the next decoded notification.
    pub async fn next(&mut self) -> Option<NotificationItem> {
        self.notifications.next().await
    }

    #[must_use]
    pub fn into_stream(self) -> UnboundedReceiverStream<NotificationItem> {
        self.notifications
    }
}

/// Async handle to a [`Connection`] running on its own task.
///
/// The task is the only owner of the connection. It serialises application
/// requests, link events and retry deadlines, so the connection itself needs
/// no locking.
pub struct GattClient {
    requests: mpsc::UnboundedSender<Request>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GattClient {
    /// Opens the backend's link and starts the owner task.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open a link.
    #[instrument(skip(backend, config), level = "debug")]
    pub async fn open(
        backend: Box<dyn LinkBackend>,
        config: SchedulerConfig,
    ) -> Result<(Self, EventStream), LinkError> {
        let (link_events_tx, link_events) = mpsc::unbounded_channel();
        let link = backend.open(link_events_tx).await?;
        let (events_tx, events) = mpsc::unbounded_channel();
        let connection = Connection::new(link, config, events_tx);

        let (requests, request_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(drive(connection, request_rx, link_events, shutdown.clone()));

        Ok((
            Self {
                requests,
                shutdown,
                task: Some(task),
            },
            UnboundedReceiverStream::new(events),
        ))
    }

    /// # Errors
    ///
    /// Returns the adapter error when the host cannot scan.
    pub async fn start_scanning(&self) -> Result<(), GattError> {
        self.call(Request::StartScanning).await
    }

    /// # Errors
    ///
    /// Returns `NoScanInProgress` when no scan is running.
    pub async fn stop_scanning(&self) -> Result<(), GattError> {
        self.call(Request::StopScanning).await
    }

    /// Starts connecting. Completion arrives as a `Connected` or `Error` event.
    ///
    /// # Errors
    ///
    /// Returns an error when the target does not resolve to a discovered device.
    pub async fn connect(&self, target: ConnectTarget) -> Result<(), GattError> {
        self.call(|reply| Request::Connect(target, reply)).await
    }

    /// # Errors
    ///
    /// Returns `NotConnected` when there is no link.
    pub async fn disconnect(&self) -> Result<(), GattError> {
        self.call(Request::Disconnect).await
    }

    /// Reads and decodes a characteristic.
    ///
    /// # Errors
    ///
    /// Returns validation, hardware and decode errors. A link that drops
    /// before the read resolves yields `NotConnected`.
    pub async fn read(
        &self,
        service: &str,
        characteristic: &str,
        element: ElementType,
    ) -> Result<Values, GattError> {
        let completion = self
            .call(|reply| Request::Read {
                service: service.to_string(),
                characteristic: characteristic.to_string(),
                element,
                reply,
            })
            .await?;
        match completion {
            Completion::Read(values) => Ok(values),
            other => Err(unexpected_completion("read", &other)),
        }
    }

    /// Encodes and writes values to a characteristic.
    ///
    /// # Errors
    ///
    /// Returns validation, encode and hardware errors. A link that drops
    /// before the write resolves yields `NotConnected`.
    pub async fn write(
        &self,
        service: &str,
        characteristic: &str,
        values: Values,
        options: WriteOptions,
    ) -> Result<(), GattError> {
        let completion = self
            .call(|reply| Request::Write {
                service: service.to_string(),
                characteristic: characteristic.to_string(),
                values,
                options,
                reply,
            })
            .await?;
        match completion {
            Completion::Written => Ok(()),
            other => Err(unexpected_completion("write", &other)),
        }
    }

    /// Subscribes to a characteristic's notifications.
    ///
    /// # Errors
    ///
    /// Returns validation errors when the subscription is not accepted.
    pub async fn subscribe(
        &self,
        service: &str,
        characteristic: &str,
        element: ElementType,
    ) -> Result<Subscription, GattError> {
        let (stream, notifications) = mpsc::unbounded_channel();
        let id = self
            .call(|accepted| Request::Subscribe {
                service: service.to_string(),
                characteristic: characteristic.to_string(),
                element,
                stream,
                accepted,
            })
            .await?;
        Ok(Subscription {
            id,
            notifications: UnboundedReceiverStream::new(notifications),
        })
    }

    /// Removes every subscription on a characteristic.
    ///
    /// # Errors
    ///
    /// Returns validation errors.
    pub async fn unsubscribe(&self, service: &str, characteristic: &str) -> Result<(), GattError> {
        self.call(|reply| Request::Unsubscribe {
            service: service.to_string(),
            characteristic: characteristic.to_string(),
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotConnected` when the owner task has stopped.
    pub async fn snapshot(&self) -> Result<ClientSnapshot, GattError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Snapshot(reply))
            .map_err(|_closed| GattError::NotConnected)?;
        response.await.map_err(|_closed| GattError::NotConnected)
    }

    /// Stops the owner task, dropping any link.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
        {
            debug!(%error, "connection task ended abnormally");
        }
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, GattError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .map_err(|_closed| GattError::NotConnected)?;
        response
            .await
            .unwrap_or_else(|_closed| Err(GattError::NotConnected))
    }
}

impl Drop for GattClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn unexpected_completion(context: &str, completion: &Completion) -> GattError {
    GattError::OperationFailed {
        context: context.to_string(),
        reason: format!("unexpected completion {completion:?}"),
    }
}

async fn drive<L: HardwareLink>(
    mut connection: Connection<L>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    mut link_events: LinkEventReceiver,
    shutdown: CancellationToken,
) {
    loop {
        let deadline = connection.next_retry_deadline();
        tokio::select! {
            () = shutdown.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => handle_request(&mut connection, request),
                None => break,
            },
            Some(event) = link_events.recv() => connection.handle_link_event(event),
            () = wait_for(deadline) => connection.on_retry_timer(Instant::now()),
        }
    }

    if connection.state().is_linked() && connection.disconnect().is_err() {
        trace!("link was already down at shutdown");
    }
    debug!("connection task stopped");
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn handle_request<L: HardwareLink>(connection: &mut Connection<L>, request: Request) {
    match request {
        Request::StartScanning(reply) => answer(reply, connection.start_scanning()),
        Request::StopScanning(reply) => answer(reply, connection.stop_scanning()),
        Request::Connect(target, reply) => answer(reply, connection.connect(target)),
        Request::Disconnect(reply) => answer(reply, connection.disconnect()),
        Request::Read {
            service,
            characteristic,
            element,
            reply,
        } => {
            let sink = CompletionSink::Reply(reply);
            if let Err(error) = connection.read_values(&service, &characteristic, element, sink) {
                debug!(%error, "read rejected");
            }
        }
        Request::Write {
            service,
            characteristic,
            values,
            options,
            reply,
        } => {
            let sink = CompletionSink::Reply(reply);
            if let Err(error) =
                connection.write_values(&service, &characteristic, values, options, sink)
            {
                debug!(%error, "write rejected");
            }
        }
        Request::Subscribe {
            service,
            characteristic,
            element,
            stream,
            accepted,
        } => {
            let sink = CompletionSink::Stream(stream);
            answer(
                accepted,
                connection.subscribe(&service, &characteristic, element, sink),
            );
        }
        Request::Unsubscribe {
            service,
            characteristic,
            reply,
        } => answer(reply, connection.unsubscribe(&service, &characteristic)),
        Request::Snapshot(reply) => {
            if reply.send(ClientSnapshot::capture(connection)).is_err() {
                trace!("snapshot requester went away");
            }
        }
    }
}

fn answer<T>(reply: Reply<T>, result: Result<T, GattError>) {
    if reply.send(result).is_err() {
        trace!("requester went away before the reply");
    }
}
