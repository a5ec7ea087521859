// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network listener receiving sensor pushes.
//!
//! A [`Listener`] owns one socket at a time, UDP or TCP depending on its
//! [`ListenerConfig`]. Every inbound message goes through the same steps:
//!
//! 1. UDP only: the sender is acknowledged with `"<utc_seconds>;1"`
//! 2. The message is decoded; malformed and ignored messages are dropped
//! 3. The reading is merged into the [`DeviceStore`]
//! 4. A [`DeviceEvent`] is queued: `DeviceUpdated` for devices the
//!    [`DeviceRegistry`] knows, `DeviceDiscovered` the first time an unknown
//!    device is seen
//!
//! Events are published on the [`NotificationBus`] by a dispatcher task, so a
//! slow subscriber never stalls the receive loop.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use thermolink_lib::listener::{Listener, ListenerConfig};
//! use thermolink_lib::subscription::Topic;
//!
//! # async fn example() -> thermolink_lib::Result<()> {
//! let listener = Listener::builder()
//!     .config(ListenerConfig::udp(55355))
//!     .registry(|id: &thermolink_lib::types::DeviceId| id.as_str() == "kitchen")
//!     .build()?;
//!
//! listener.bus().subscribe(Topic::device_discovered(), |event| {
//!     println!("new sensor: {}", event.device_id());
//! });
//!
//! let addr = listener.start("0.0.0.0", 55355).await?;
//! println!("listening on {addr}");
//!
//! listener.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod pipeline;
mod session;
mod stats;
mod tcp;
mod udp;

pub use config::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, ListenerConfig, Transport};
pub use pipeline::{MessagePipeline, ProcessOutcome};
pub use stats::{ListenerStats, ListenerStatsSnapshot};

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::discovery::{DeviceRegistry, DiscoveryTracker, NoRegisteredDevices};
use crate::error::{BindError, ConfigError, Result};
use crate::event::DeviceEvent;
use crate::state::DeviceStore;
use crate::subscription::{NotificationBus, Topic};
use crate::types::{Clock, SystemClock};

use session::Session;

/// Extra time granted to the receive task beyond the grace period before it is
/// aborted.
const SHUTDOWN_SLACK: Duration = Duration::from_millis(250);

/// Lifecycle state of a [`Listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// No socket is bound.
    Stopped,
    /// A socket is being bound.
    Starting,
    /// Messages are being received.
    Running,
    /// The socket is closing and in-flight work is draining.
    Stopping,
}

impl ListenerState {
    /// Returns `true` if the listener is accepting messages.
    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Builder for a [`Listener`].
///
/// Every component is optional. Components left unset are created fresh: an
/// empty store, a registry that knows no device, a new tracker, a new bus and
/// the system clock.
#[derive(Default)]
pub struct ListenerBuilder {
    config: ListenerConfig,
    store: Option<Arc<DeviceStore>>,
    registry: Option<Arc<dyn DeviceRegistry>>,
    tracker: Option<Arc<DiscoveryTracker>>,
    bus: Option<NotificationBus<DeviceEvent>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ListenerBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing device store.
    ///
    /// The configuration's `max_devices` only applies to a store the builder
    /// creates itself.
    #[must_use]
    pub fn store(mut self, store: Arc<DeviceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the host's device registry.
    #[must_use]
    pub fn registry(mut self, registry: impl DeviceRegistry + 'static) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Shares an existing discovery tracker.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<DiscoveryTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Publishes events on an existing bus.
    #[must_use]
    pub fn bus(mut self, bus: NotificationBus<DeviceEvent>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the listener. The listener starts in [`ListenerState::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn build(self) -> std::result::Result<Listener, ConfigError> {
        self.config.validate()?;

        let store = self.store.unwrap_or_else(|| {
            Arc::new(match self.config.max_devices {
                Some(limit) => DeviceStore::with_max_devices(limit),
                None => DeviceStore::new(),
            })
        });
        let registry: Arc<dyn DeviceRegistry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(NoRegisteredDevices),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let tracker = self.tracker.unwrap_or_default();
        let bus = self.bus.unwrap_or_default();
        let stats = Arc::new(ListenerStats::new());

        let pipeline = Arc::new(MessagePipeline::new(
            self.config.decoder,
            Arc::clone(&store),
            registry,
            Arc::clone(&tracker),
            Arc::clone(&stats),
        ));
        let (state_tx, _) = watch::channel(ListenerState::Stopped);

        Ok(Listener {
            config: self.config,
            store,
            tracker,
            bus,
            clock,
            stats,
            pipeline,
            state_tx,
            local_addr: parking_lot::Mutex::new(None),
            binding: Mutex::new(None),
        })
    }
}

impl fmt::Debug for ListenerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBuilder")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("has_registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// The socket currently owned by a running listener.
struct Binding {
    requested: SocketAddr,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    receiver: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Receives sensor messages and turns them into store updates and events.
///
/// See the [module documentation](self) for the processing steps.
pub struct Listener {
    config: ListenerConfig,
    store: Arc<DeviceStore>,
    tracker: Arc<DiscoveryTracker>,
    bus: NotificationBus<DeviceEvent>,
    clock: Arc<dyn Clock>,
    stats: Arc<ListenerStats>,
    pipeline: Arc<MessagePipeline>,
    state_tx: watch::Sender<ListenerState>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    binding: Mutex<Option<Binding>>,
}

impl Listener {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ListenerBuilder {
        ListenerBuilder::default()
    }

    /// Creates a listener with fresh components.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn new(config: ListenerConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    /// Binds `bind_address:port` and starts receiving.
    ///
    /// Calling this while already running on the same address and port does
    /// nothing. Any other binding is stopped first, with the same draining as
    /// [`stop`](Self::stop).
    ///
    /// Returns the bound address, which tells the actual port when `port` is
    /// `0`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::InvalidAddress`] if `bind_address` is not an IP
    /// address, [`BindError::AddrInUse`] if the port is taken and
    /// [`BindError::Io`] for any other socket failure. The listener is
    /// [`Stopped`](ListenerState::Stopped) after a failed bind.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<SocketAddr> {
        let ip: IpAddr = bind_address
            .trim()
            .parse()
            .map_err(|_| BindError::InvalidAddress(bind_address.to_string()))?;
        let requested = SocketAddr::new(ip, port);

        let mut binding = self.binding.lock().await;

        if let Some(current) = binding.as_ref()
            && current.requested == requested
        {
            tracing::debug!(addr = %current.local_addr, "Listener already running");
            return Ok(current.local_addr);
        }

        if let Some(previous) = binding.take() {
            tracing::info!(from = %previous.local_addr, to = %requested, "Rebinding listener");
            self.shutdown(previous).await;
        }

        self.state_tx.send_replace(ListenerState::Starting);

        match self.bind(requested).await {
            Ok(bound) => {
                let local_addr = bound.local_addr;
                *binding = Some(bound);
                *self.local_addr.lock() = Some(local_addr);
                self.state_tx.send_replace(ListenerState::Running);
                tracing::info!(
                    addr = %local_addr,
                    transport = %self.config.transport,
                    decoder = self.config.decoder.name(),
                    "Listener started"
                );
                Ok(local_addr)
            }
            Err(e) => {
                self.state_tx.send_replace(ListenerState::Stopped);
                tracing::warn!(addr = %requested, error = %e, "Listener failed to bind");
                Err(e.into())
            }
        }
    }

    /// Starts on the address and port of the configuration.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn start_configured(&self) -> Result<SocketAddr> {
        self.start(&self.config.bind_address, self.config.port)
            .await
    }

    /// Stops receiving and releases the socket.
    ///
    /// Pending accept and receive waits are cancelled at once and open TCP
    /// connections are closed. The socket is released before subscribers are
    /// waited for. A subscriber still inside its handler gets the configured
    /// grace period; after that the dispatcher is detached and finishes that
    /// one call in the background. No new event is published once this
    /// returns. Queued events are dropped, and a dropped `DeviceDiscovered`
    /// is not fired again for that device. Stopping a stopped listener does
    /// nothing.
    pub async fn stop(&self) {
        let mut binding = self.binding.lock().await;
        match binding.take() {
            Some(current) => self.shutdown(current).await,
            None => tracing::trace!("Listener already stopped"),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        *self.state_tx.borrow()
    }

    /// Returns a receiver that observes lifecycle changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state_tx.subscribe()
    }

    /// Returns `true` while the listener is receiving.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Returns the bound address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Returns the device store.
    #[must_use]
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Returns the discovery tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<DiscoveryTracker> {
        &self.tracker
    }

    /// Returns the bus events are published on.
    #[must_use]
    pub fn bus(&self) -> &NotificationBus<DeviceEvent> {
        &self.bus
    }

    /// Returns a snapshot of the message counters.
    ///
    /// Counters accumulate across restarts.
    #[must_use]
    pub fn stats(&self) -> ListenerStatsSnapshot {
        self.stats.snapshot()
    }

    async fn bind(&self, requested: SocketAddr) -> std::result::Result<Binding, BindError> {
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(self.config.event_queue_capacity);
        let session = Session::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.clock),
            Arc::clone(&self.stats),
            cancel.clone(),
            self.config.max_line_bytes,
            events_tx,
        );

        let (local_addr, receiver) = match self.config.transport {
            Transport::Udp => {
                let socket = udp::bind(requested).await?;
                let local_addr = socket
                    .local_addr()
                    .map_err(|e| BindError::from_io(requested, e))?;
                (local_addr, tokio::spawn(udp::serve(socket, session)))
            }
            Transport::Tcp => {
                let listener = tcp::bind(requested)?;
                let local_addr = listener
                    .local_addr()
                    .map_err(|e| BindError::from_io(requested, e))?;
                (local_addr, tokio::spawn(tcp::serve(listener, session)))
            }
        };

        let dispatcher = tokio::spawn(dispatch(
            events_rx,
            self.bus.clone(),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));

        Ok(Binding {
            requested,
            local_addr,
            cancel,
            receiver,
            dispatcher,
        })
    }

    async fn shutdown(&self, binding: Binding) {
        self.state_tx.send_replace(ListenerState::Stopping);
        tracing::debug!(addr = %binding.local_addr, "Stopping listener");

        binding.cancel.cancel();

        let mut receiver = binding.receiver;
        let deadline = self.config.grace_period() + SHUTDOWN_SLACK;
        match tokio::time::timeout(deadline, &mut receiver).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Receive task failed"),
            Err(_) => {
                tracing::warn!("Receive task did not stop in time, aborting");
                receiver.abort();
                // Wait so the socket is closed before returning
                let _ = receiver.await;
            }
        }

        // Only a handler still running keeps the dispatcher alive here; the
        // token is checked before every publish
        let mut dispatcher = binding.dispatcher;
        match tokio::time::timeout(self.config.grace_period(), &mut dispatcher).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Event dispatcher failed"),
            Err(_) => tracing::warn!(
                grace_period = ?self.config.grace_period(),
                "Subscriber still busy after grace period, detaching dispatcher"
            ),
        }

        *self.local_addr.lock() = None;
        self.state_tx.send_replace(ListenerState::Stopped);
        tracing::info!(addr = %binding.local_addr, "Listener stopped");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.get_mut().as_ref() {
            binding.cancel.cancel();
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

/// Publishes queued events until cancelled or every sender is gone.
async fn dispatch(
    mut events: mpsc::Receiver<DeviceEvent>,
    bus: NotificationBus<DeviceEvent>,
    stats: Arc<ListenerStats>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if cancel.is_cancelled() {
            break;
        }
        publish(&bus, &stats, &cancel, &event);
    }

    let dropped = events.len();
    if dropped > 0 {
        tracing::debug!(dropped, "Dropping queued events on shutdown");
    }
}

fn publish(
    bus: &NotificationBus<DeviceEvent>,
    stats: &ListenerStats,
    cancel: &CancellationToken,
    event: &DeviceEvent,
) {
    match event {
        DeviceEvent::DeviceDiscovered { .. } => {
            stats.record_discovery();
            bus.publish(&Topic::device_discovered(), event);
        }
        DeviceEvent::DeviceUpdated { device_id } => {
            stats.record_update();
            bus.publish(&Topic::device_updated(), event);
            // A slow handler above may have outlived stop()
            if !cancel.is_cancelled() {
                bus.publish(&Topic::device_updated_for(device_id), event);
            }
        }
    }
}
