//! The queue managers.
//!
//! Both managers own one broker connection, one channel and one named
//! queue, and share a single contract: `connect`, `publish`,
//! `start_consuming`, `close_connection`. They differ only in how
//! eagerly readiness arrives: [`AsyncManager::connect`] returns as
//! soon as the transport is up and lets the queue declaration finish
//! in a spawned task, while [`SyncManager::connect`] waits for the
//! declaration to be acknowledged, so the manager is ready the moment
//! `connect` returns.
//!
//! Publishing before the queue is ready is never an error: the
//! serialized payload is buffered and drained, in order, once the
//! declaration completes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;

#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

use crate::connection::Opener;
use crate::errors::{Error, Result};
use crate::handler::OnMessage;
use crate::message::Message;
use crate::options::QueueOptions;
use crate::serializer::to_json;
use crate::state::ManagerState;

/// A publish that arrived before the queue was ready
struct Pending {
    /// Routing key the caller asked for
    routing_key: String,
    /// Already-serialized body
    payload: Vec<u8>,
}

/// State shared between a manager, its declaration task and its
/// consumer tasks
struct Inner {
    /// Options fixed at construction
    options: QueueOptions,

    /// Declared queue name. Caller-supplied names are set here at
    /// construction; broker-generated names land once the declaration
    /// returns
    queue_name: RwLock<Option<String>>,

    /// Lifecycle state, broadcast so tasks can wait on transitions
    lifecycle: watch::Sender<ManagerState>,

    /// Open broker connection, if any
    connection: tokio::sync::Mutex<Option<Connection>>,

    /// Open channel, if any
    channel: tokio::sync::RwLock<Option<Channel>>,

    /// Publishes buffered until the queue declaration completes
    pending: Mutex<VecDeque<Pending>>,
}

impl Inner {
    fn new(options: QueueOptions) -> Self {
        let (lifecycle, _) = watch::channel(ManagerState::Disconnected);
        Self {
            queue_name: RwLock::new(options.queue.clone()),
            options,
            lifecycle,
            connection: tokio::sync::Mutex::new(None),
            channel: tokio::sync::RwLock::new(None),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Current lifecycle state
    fn state(&self) -> ManagerState {
        *self.lifecycle.borrow()
    }

    /// Queue name, if known yet
    fn name(&self) -> Option<String> {
        self.queue_name.read().unwrap().clone()
    }

    /// Move the lifecycle forward, refusing transitions the state
    /// machine does not allow. Returns the state actually in effect
    fn advance(&self, next: ManagerState) -> ManagerState {
        let mut result = next;
        self.lifecycle.send_modify(|state| {
            if state.may_advance(next) {
                trace!(from = ?*state, to = ?next, "state transition");
                *state = next;
            } else {
                warn!(from = ?*state, to = ?next, "refusing state transition");
            }
            result = *state;
        });
        result
    }

    /// Clone out the open channel
    async fn channel(&self) -> Result<Channel> {
        self.channel.read().await.clone().ok_or(Error::NotConnected)
    }

    /// Buffer the publish unless the queue is ready. Returning
    /// `Some` means the caller should publish immediately
    fn defer_if_not_ready(&self, publish: Pending) -> Option<Pending> {
        let mut backlog = self.pending.lock().unwrap();
        if self.state().is_ready() {
            Some(publish)
        } else {
            debug!(
                buffered = backlog.len() + 1,
                routing_key = %publish.routing_key,
                "queue not ready; buffering publish"
            );
            backlog.push_back(publish);
            None
        }
    }

    /// Flip to `Ready` and take the buffered backlog. Holding the
    /// pending lock across the transition means no publish can slip
    /// between the flip and the drain
    fn mark_ready_and_drain(&self) -> Vec<Pending> {
        let mut backlog = self.pending.lock().unwrap();
        if !self.advance(ManagerState::Ready).is_ready() {
            return Vec::new();
        }
        backlog.drain(..).collect()
    }

    /// Declare the queue, enable publisher confirms and drain any
    /// buffered publishes. On failure the manager falls back to
    /// `Disconnected` so the caller may retry
    async fn declare_queue(&self) -> Result<()> {
        match self.declare().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.advance(ManagerState::Disconnected);
                Err(err)
            }
        }
    }

    async fn declare(&self) -> Result<()> {
        let channel = self.channel().await?;
        let requested = self.name().unwrap_or_default();
        let declare_opts = QueueDeclareOptions {
            durable: self.options.durable,
            // unnamed queues are private to this manager
            exclusive: self.options.queue.is_none(),
            auto_delete: self.options.auto_delete,
            ..QueueDeclareOptions::default()
        };
        let queue = channel
            .queue_declare(&requested, declare_opts, FieldTable::default())
            .await
            .map_err(Error::Declare)?;
        *self.queue_name.write().unwrap() = Some(queue.name().as_str().to_string());
        info!(queue = %queue.name(), "queue declared");
        self.advance(ManagerState::Declared);

        channel
            .confirm_select(ConfirmSelectOptions { nowait: false })
            .await
            .map_err(Error::Channel)?;

        let backlog = self.mark_ready_and_drain();
        if !backlog.is_empty() {
            debug!(count = backlog.len(), "draining buffered publishes");
        }
        for publish in backlog {
            if let Err(err) = self
                .publish_now(&publish.routing_key, &publish.payload, false)
                .await
            {
                error!(
                    error = %err,
                    routing_key = %publish.routing_key,
                    "failed to publish buffered message"
                );
            }
        }
        Ok(())
    }

    /// Serialize-free publish path: the payload is already bytes.
    /// Buffers when the queue is not ready yet
    async fn publish_bytes(
        &self,
        routing_key: &str,
        payload: Vec<u8>,
        confirm: bool,
    ) -> Result<()> {
        if self.state().is_closed() {
            return Err(Error::Closed);
        }
        let publish = Pending {
            routing_key: routing_key.to_string(),
            payload,
        };
        match self.defer_if_not_ready(publish) {
            Some(publish) => {
                self.publish_now(&publish.routing_key, &publish.payload, confirm)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Publish straight to the channel, optionally blocking on the
    /// publisher confirm
    async fn publish_now(&self, routing_key: &str, payload: &[u8], confirm: bool) -> Result<()> {
        let channel = self.channel().await?;
        let properties =
            BasicProperties::default().with_content_type(ShortString::from("application/json"));
        debug!(
            bytes = payload.len(),
            exchange = %self.options.exchange,
            routing_key,
            "publishing"
        );
        let confirmation = channel
            .basic_publish(
                &self.options.exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(Error::Publish)?;
        if confirm {
            match confirmation.await.map_err(Error::Publish)? {
                Confirmation::Nack(_) => Err(Error::Nack),
                _ => Ok(()),
            }
        } else {
            Ok(())
        }
    }

    /// Tear down the transport. Never fails; teardown errors are
    /// logged and swallowed so cleanup hooks can always call this
    async fn close(&self) {
        self.advance(ManagerState::Closed);
        if let Some(channel) = self.channel.write().await.take() {
            // best-effort flush of outstanding confirms
            match tokio::time::timeout(Duration::from_secs(1), channel.wait_for_confirms()).await {
                Ok(Err(err)) => debug!(error = %err, "confirm flush failed during close"),
                Err(_) => debug!("timed out flushing confirms during close"),
                Ok(Ok(_)) => {}
            }
            if let Err(err) = channel.close(0, "closing").await {
                debug!(error = %err, "channel close failed");
            }
        }
        if let Some(connection) = self.connection.lock().await.take() {
            if let Err(err) = connection.close(0, "closing").await {
                debug!(error = %err, "connection close failed");
            }
        }
        debug!("manager closed");
    }
}

/// Plumbing shared by both manager variants
#[derive(Clone)]
struct Core {
    inner: Arc<Inner>,
    /// Caller-supplied connection properties; when unset the tokio
    /// executor and reactor are wired in at connect time
    properties: Option<ConnectionProperties>,
    /// Runtime the declaration and consumer tasks spawn onto
    handle: Option<Handle>,
}

impl Core {
    fn new(options: QueueOptions) -> Self {
        Self {
            inner: Arc::new(Inner::new(options)),
            properties: None,
            handle: None,
        }
    }

    /// Runtime handle for spawned tasks
    fn runtime(&self) -> Handle {
        self.handle.clone().unwrap_or_else(Handle::current)
    }

    /// Connection properties, defaulting to the current tokio
    /// executor and reactor
    fn connect_properties(&self) -> ConnectionProperties {
        self.properties.clone().unwrap_or_else(|| {
            ConnectionProperties::default()
                .with_executor(tokio_executor_trait::Tokio::current())
                .with_reactor(tokio_reactor_trait::Tokio)
        })
    }

    /// Open the connection and channel. Does not declare the queue;
    /// the variants decide whether to await or spawn that
    async fn connect(&self, host: &str) -> Result<()> {
        match self.inner.state() {
            state if state.is_closed() => return Err(Error::Closed),
            ManagerState::Disconnected => {}
            _ => return Err(Error::AlreadyConnected),
        }
        self.inner.advance(ManagerState::Connecting);
        let result: Result<()> = async {
            let opener =
                Opener::from_host(host, &self.inner.options.auth, self.connect_properties())?;
            let connection = opener.get_connection().await.map_err(Error::Connect)?;
            let channel = connection.create_channel().await.map_err(Error::Channel)?;
            debug!(channel = ?channel, "channel open");
            *self.inner.connection.lock().await = Some(connection);
            *self.inner.channel.write().await = Some(channel);
            Ok(())
        }
        .await;
        if let Err(ref err) = result {
            error!(error = %err, host, "connect failed");
            self.inner.advance(ManagerState::Disconnected);
        }
        result
    }

    // A: 'static so the spawned consume loop satisfies Handle::spawn
    fn start_consuming<A: 'static>(&self, handler: impl OnMessage<A>) -> Result<()> {
        if self.inner.state().is_closed() {
            return Err(Error::Closed);
        }
        self.runtime().spawn(consume_loop(self.inner.clone(), handler));
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.subscribe();
        let state = *lifecycle
            .wait_for(|state| state.is_ready() || state.is_closed())
            .await
            .map_err(|_| Error::Closed)?;
        if state.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

/// Wait for readiness, register the consumer and pump deliveries into
/// the handler until the channel drops
async fn consume_loop<A>(inner: Arc<Inner>, mut handler: impl OnMessage<A>) {
    let mut lifecycle = inner.lifecycle.subscribe();
    let state = match lifecycle
        .wait_for(|state| state.is_ready() || state.is_closed())
        .await
    {
        Ok(state) => *state,
        Err(_) => return,
    };
    if state.is_closed() {
        debug!("manager closed before consuming started");
        return;
    }

    let Some(channel) = inner.channel.read().await.clone() else {
        error!("manager is ready but has no open channel");
        return;
    };
    let queue = inner.name().unwrap_or_default();
    // empty consumer tag: let the broker pick one
    let mut deliveries = match channel
        .basic_consume(
            &queue,
            "",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(error = %err, queue = %queue, "failed to start consuming");
            return;
        }
    };
    info!(queue = %queue, "consuming");

    while let Some(delivery) = deliveries.next().await {
        match delivery {
            Ok(delivery) => {
                let message = Message::from_delivery(&delivery);
                match message.json() {
                    Ok(body) => {
                        handler.call(body);
                        if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                            error!(error = %err, "failed to ack message");
                        }
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            routing_key = %message.routing_key(),
                            "dropping undecodable message"
                        );
                        if let Err(err) = delivery.reject(BasicRejectOptions { requeue: false }).await
                        {
                            error!(error = %err, "failed to reject message");
                        }
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "error receiving message");
                if !channel.status().connected() {
                    break;
                }
            }
        }
    }
    debug!(queue = %queue, "consumer stream ended");
}

/// Non-blocking queue manager.
///
/// `connect` returns once the transport is up; the queue declaration
/// finishes in a spawned task and flips the manager to ready. Until
/// then publishes are buffered, never failed.
#[derive(Clone)]
pub struct AsyncManager {
    core: Core,
}

impl AsyncManager {
    /// Create a manager with the given options
    #[must_use]
    pub fn new(options: QueueOptions) -> Self {
        Self {
            core: Core::new(options),
        }
    }

    /// Create a manager bound to a fixed queue name
    #[must_use]
    pub fn named(queue: impl Into<String>) -> Self {
        Self::new(QueueOptions::named(queue))
    }

    /// Use the given [`lapin::ConnectionProperties`] instead of the
    /// tokio defaults
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.core.properties = Some(properties);
        self
    }

    /// Spawn background tasks on the given runtime instead of the
    /// ambient one
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.core.handle = Some(handle);
        self
    }

    /// Open a connection to the broker and schedule the queue
    /// declaration. Returns once the transport is up; readiness may
    /// lag. `host` may be a bare hostname or a full `amqp://` URL
    ///
    /// # Panics
    /// Panics if no runtime handle was injected and this is called
    /// from outside a tokio runtime
    #[instrument(skip(self))]
    pub async fn connect(&self, host: &str) -> Result<()> {
        self.core.connect(host).await?;
        let inner = self.core.inner.clone();
        self.core.runtime().spawn(async move {
            if let Err(err) = inner.declare_queue().await {
                error!(error = %err, "queue declaration failed");
            }
        });
        Ok(())
    }

    /// Serialize `body` to JSON and publish it with the given routing
    /// key. Bodies the default serializer can't represent surface
    /// [`Error::Serialize`]; a queue that is merely not ready yet does
    /// not fail the call
    pub async fn publish<T>(&self, body: &T, routing_key: &str) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.publish_with(body, routing_key, to_json).await
    }

    /// Publish with a caller-supplied serializer in place of the
    /// default JSON one
    pub async fn publish_with<T: ?Sized>(
        &self,
        body: &T,
        routing_key: &str,
        serializer: impl FnOnce(&T) -> Result<Vec<u8>>,
    ) -> Result<()> {
        let payload = serializer(body)?;
        self.core.inner.publish_bytes(routing_key, payload, false).await
    }

    /// Register a callback invoked once per inbound message with the
    /// decoded JSON body. Accepts zero- and one-argument callbacks;
    /// see [`OnMessage`]
    ///
    /// # Panics
    /// Panics if no runtime handle was injected and this is called
    /// from outside a tokio runtime
    pub fn start_consuming<A: 'static>(&self, handler: impl OnMessage<A>) -> Result<()> {
        self.core.start_consuming(handler)
    }

    /// Wait until the queue declaration has been acknowledged (or the
    /// manager is closed)
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.core.wait_until_ready().await
    }

    /// The queue name. `None` until a broker-generated name arrives
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.core.inner.name()
    }

    /// True once the queue has been declared and acknowledged
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.core.inner.state().is_ready()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.core.inner.state()
    }

    /// Tear down the connection. Idempotent and infallible; safe to
    /// call from cleanup hooks regardless of in-flight operations
    pub async fn close_connection(&self) {
        self.core.inner.close().await;
    }
}

impl std::fmt::Debug for AsyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncManager")
            .field("queue", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Queue manager with synchronous-looking semantics.
///
/// Shares [`AsyncManager`]'s contract, but `connect` waits (bounded by
/// [`QueueOptions::connect_timeout`]) until the broker acknowledges
/// the queue declaration, so the manager is guaranteed ready when
/// `connect` returns, and `publish` awaits the publisher confirm.
#[derive(Clone)]
pub struct SyncManager {
    core: Core,
}

impl SyncManager {
    /// Create a manager with the given options
    #[must_use]
    pub fn new(options: QueueOptions) -> Self {
        Self {
            core: Core::new(options),
        }
    }

    /// Create a manager bound to a fixed queue name
    #[must_use]
    pub fn named(queue: impl Into<String>) -> Self {
        Self::new(QueueOptions::named(queue))
    }

    /// Use the given [`lapin::ConnectionProperties`] instead of the
    /// tokio defaults
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.core.properties = Some(properties);
        self
    }

    /// Spawn background tasks on the given runtime instead of the
    /// ambient one
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.core.handle = Some(handle);
        self
    }

    /// Open a connection and wait for the queue declaration to be
    /// acknowledged. The manager is ready once this returns. The wait
    /// never blocks the runtime, only this caller
    #[instrument(skip(self))]
    pub async fn connect(&self, host: &str) -> Result<()> {
        self.core.connect(host).await?;
        let timeout = self.core.inner.options.connect_timeout;
        match tokio::time::timeout(timeout, self.core.inner.declare_queue()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "queue declaration timed out");
                self.core.inner.advance(ManagerState::Disconnected);
                Err(Error::DeclareTimeout)
            }
        }
    }

    /// Serialize `body` to JSON, publish it and wait for the
    /// publisher confirm. Broker NACKs surface as [`Error::Nack`]
    pub async fn publish<T>(&self, body: &T, routing_key: &str) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.publish_with(body, routing_key, to_json).await
    }

    /// Publish with a caller-supplied serializer in place of the
    /// default JSON one
    pub async fn publish_with<T: ?Sized>(
        &self,
        body: &T,
        routing_key: &str,
        serializer: impl FnOnce(&T) -> Result<Vec<u8>>,
    ) -> Result<()> {
        let payload = serializer(body)?;
        self.core.inner.publish_bytes(routing_key, payload, true).await
    }

    /// Register a callback invoked once per inbound message with the
    /// decoded JSON body. Accepts zero- and one-argument callbacks;
    /// see [`OnMessage`]
    ///
    /// # Panics
    /// Panics if no runtime handle was injected and this is called
    /// from outside a tokio runtime
    pub fn start_consuming<A: 'static>(&self, handler: impl OnMessage<A>) -> Result<()> {
        self.core.start_consuming(handler)
    }

    /// Wait until the queue declaration has been acknowledged (or the
    /// manager is closed). After a successful `connect` this returns
    /// immediately
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.core.wait_until_ready().await
    }

    /// The queue name. `None` until a broker-generated name arrives
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.core.inner.name()
    }

    /// True once the queue has been declared and acknowledged
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.core.inner.state().is_ready()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.core.inner.state()
    }

    /// Tear down the connection. Idempotent and infallible; safe to
    /// call from cleanup hooks regardless of in-flight operations
    pub async fn close_connection(&self) {
        self.core.inner.close().await;
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("queue", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn queue_name_is_fixed_at_construction() {
        let manager = AsyncManager::named("dummy");
        assert_eq!(manager.name().as_deref(), Some("dummy"));
        assert_eq!(manager.state(), ManagerState::Disconnected);

        let anonymous = AsyncManager::new(QueueOptions::default());
        assert!(anonymous.name().is_none());
    }

    #[tokio::test]
    async fn publish_while_not_ready_buffers_instead_of_failing() -> eyre::Result<()> {
        let manager = AsyncManager::named("dummy");
        assert!(!manager.is_ready());

        manager.publish(&Value::Null, "dummy").await?;
        manager.publish(&json!({"message": "Hello, world!"}), "dummy").await?;

        let buffered = manager.core.inner.pending.lock().unwrap().len();
        assert_eq!(buffered, 2);
        Ok(())
    }

    #[tokio::test]
    async fn sync_manager_also_buffers_when_not_ready() -> eyre::Result<()> {
        let manager = SyncManager::named("dummy");
        assert!(!manager.is_ready());
        manager.publish(&Value::Null, "dummy").await?;
        assert_eq!(manager.core.inner.pending.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn serialization_failures_surface_even_while_buffering() {
        use serde::ser::Error as _;

        struct SomeObject;
        impl Serialize for SomeObject {
            fn serialize<S: serde::Serializer>(
                &self,
                _serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                Err(S::Error::custom("SomeObject is not JSON serializable"))
            }
        }

        let manager = AsyncManager::named("dummy");
        let result = manager.publish(&SomeObject, "dummy").await;
        assert!(matches!(result, Err(Error::Serialize(_))));
        // nothing half-serialized was buffered
        assert!(manager.core.inner.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_serializer_rescues_the_publish() -> eyre::Result<()> {
        let manager = AsyncManager::named("dummy");
        manager
            .publish_with(&"Hello, world!", "dummy", |entity| {
                to_json(&json!({ "message": entity }))
            })
            .await?;
        assert_eq!(manager.core.inner.pending.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn consumers_register_with_either_arity_before_readiness() {
        let manager = AsyncManager::named("dummy");
        manager
            .start_consuming(|_body: Value| {})
            .expect("one-argument consumer should register");
        manager
            .start_consuming(|| ())
            .expect("zero-argument consumer should register");
        // closing wakes the spawned loops so they exit instead of
        // waiting on a readiness that never comes
        manager.close_connection().await;
        assert!(manager.state().is_closed());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let manager = SyncManager::named("dummy");
        manager.close_connection().await;
        manager.close_connection().await;
        assert!(manager.state().is_closed());

        let publish = manager.publish(&Value::Null, "dummy").await;
        assert!(matches!(publish, Err(Error::Closed)));
        let connect = manager.connect("localhost").await;
        assert!(matches!(connect, Err(Error::Closed)));
        assert!(matches!(
            manager.start_consuming(|| ()),
            Err(Error::Closed)
        ));
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let manager = AsyncManager::named("dummy");
        manager.core.inner.advance(ManagerState::Connecting);
        let result = manager.connect("localhost").await;
        assert!(matches!(result, Err(Error::AlreadyConnected)));
    }

    #[tokio::test]
    async fn wait_until_ready_observes_close() {
        let manager = AsyncManager::named("dummy");
        let waiter = manager.clone();
        let wait = tokio::spawn(async move { waiter.wait_until_ready().await });
        manager.close_connection().await;
        let result = wait.await.expect("wait task panicked");
        assert!(matches!(result, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn readiness_drains_the_backlog_in_order() -> eyre::Result<()> {
        let manager = AsyncManager::named("dummy");
        manager.publish(&json!(1), "dummy").await?;
        manager.publish(&json!(2), "dummy").await?;

        manager.core.inner.advance(ManagerState::Connecting);
        manager.core.inner.advance(ManagerState::Declared);
        let drained = manager.core.inner.mark_ready_and_drain();
        assert!(manager.is_ready());
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].payload, b"1");
        assert_eq!(drained[1].payload, b"2");
        assert!(manager.core.inner.pending.lock().unwrap().is_empty());
        Ok(())
    }
}
