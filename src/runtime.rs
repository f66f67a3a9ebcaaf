//! Dispatcher context.
//!
//! All state-machine work runs on one tokio task that owns the
//! [`ConnectivityManager`]. Other contexts reach it through messages:
//!
//! - platform callbacks post [`Event`]s with an [`EventSender`]
//! - applications call [`ConnectivityHandle::execute`] and await the reply
//! - [`TokioTimers`] post expirations tagged with a generation so a firing
//!   that lost a race with `cancel` or a re-arm is dropped
//!
//! Messages are handled in arrival order. Notifications produced while
//! handling a message are broadcast after it completes.
//!
//! # Example
//!
//! ```ignore
//! let (events, inbox) = runtime::channel();
//! let platform = Platform { timers: Box::new(TokioTimers::new(&events)), .. };
//! let manager = ConnectivityManager::new(config, platform)?;
//! let (dispatcher, handle) = Dispatcher::new(manager, &events, inbox);
//! tokio::spawn(dispatcher.run(cancel.clone()));
//!
//! handle.set_station_mode(StationMode::Enabled).await?;
//! ```

use crate::ap::ApMode;
use crate::error::ConnectivityError;
use crate::event::{Command, CommandOutput, Event, Notification, ProvisioningRequest};
use crate::facts::SharedStatus;
use crate::manager::ConnectivityManager;
use crate::station::StationMode;
use crate::timer::{TimerPurpose, TimerService};
use crate::tunnel::TunnelMode;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Buffered notifications per subscriber before it starts lagging.
const NOTIFICATION_CAPACITY: usize = 100;

type CommandReply = oneshot::Sender<Result<CommandOutput, ConnectivityError>>;

/// Generation of the currently armed timer per purpose.
type ArmedTimers = Arc<Mutex<HashMap<TimerPurpose, u64>>>;

fn lock(armed: &ArmedTimers) -> MutexGuard<'_, HashMap<TimerPurpose, u64>> {
    armed.lock().unwrap_or_else(|e| e.into_inner())
}

enum Inbound {
    Event(Event),
    Command(Command, CommandReply),
    Timer { purpose: TimerPurpose, generation: u64 },
}

/// Posts events to the dispatcher. Safe to use from any thread.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Inbound>,
    armed: ArmedTimers,
}

impl EventSender {
    /// Post an event. Returns `false` if the dispatcher is gone.
    pub fn post(&self, event: Event) -> bool {
        match self.tx.send(Inbound::Event(event)) {
            Ok(()) => true,
            Err(e) => {
                if let Inbound::Event(event) = e.0 {
                    debug!("Event dropped, dispatcher stopped: {:?}", event);
                }
                false
            }
        }
    }
}

/// Receiving end of the dispatcher channel.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Inbound>,
    armed: ArmedTimers,
}

impl Inbox {
    /// Consume a timer firing if it is still the armed generation.
    fn accept_timer(&self, purpose: TimerPurpose, generation: u64) -> bool {
        let mut armed = lock(&self.armed);
        if armed.get(&purpose) == Some(&generation) {
            armed.remove(&purpose);
            true
        } else {
            false
        }
    }

    /// Next posted event, skipping commands and timer firings.
    #[cfg(test)]
    pub(crate) fn blocking_next_event(&mut self) -> Option<Event> {
        loop {
            if let Inbound::Event(event) = self.rx.blocking_recv()? {
                return Some(event);
            }
        }
    }
}

/// Create the dispatcher channel.
pub fn channel() -> (EventSender, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let armed = ArmedTimers::default();
    (
        EventSender {
            tx,
            armed: armed.clone(),
        },
        Inbox { rx, armed },
    )
}

// ==================== Timers ====================

/// [`TimerService`] backed by tokio sleeps.
///
/// Arming spawns a sleep on the current runtime; the firing comes back
/// through the dispatcher channel.
pub struct TokioTimers {
    tx: mpsc::UnboundedSender<Inbound>,
    armed: ArmedTimers,
    tasks: HashMap<TimerPurpose, JoinHandle<()>>,
    next_generation: u64,
}

impl TokioTimers {
    pub fn new(events: &EventSender) -> Self {
        Self {
            tx: events.tx.clone(),
            armed: events.armed.clone(),
            tasks: HashMap::new(),
            next_generation: 0,
        }
    }
}

impl TimerService for TokioTimers {
    fn arm(&mut self, purpose: TimerPurpose, after: Duration) {
        if let Some(task) = self.tasks.remove(&purpose) {
            task.abort();
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Cannot arm {:?} timer: {}", purpose, e);
                lock(&self.armed).remove(&purpose);
                return;
            }
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        lock(&self.armed).insert(purpose, generation);

        let tx = self.tx.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Inbound::Timer {
                purpose,
                generation,
            });
        });
        self.tasks.insert(purpose, task);
    }

    fn cancel(&mut self, purpose: TimerPurpose) {
        lock(&self.armed).remove(&purpose);
        if let Some(task) = self.tasks.remove(&purpose) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

// ==================== Dispatcher ====================

/// Runs the manager on the dispatcher context.
pub struct Dispatcher {
    manager: ConnectivityManager,
    inbox: Inbox,
    notifications: broadcast::Sender<Notification>,
}

impl Dispatcher {
    pub fn new(
        manager: ConnectivityManager,
        events: &EventSender,
        inbox: Inbox,
    ) -> (Self, ConnectivityHandle) {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let handle = ConnectivityHandle {
            events: events.clone(),
            notifications: notifications.clone(),
            status: manager.status(),
        };
        (
            Self {
                manager,
                inbox,
                notifications,
            },
            handle,
        )
    }

    /// Process messages until `cancel` fires. Returns the manager.
    pub async fn run(mut self, cancel: CancellationToken) -> ConnectivityManager {
        info!("Connectivity dispatcher started");
        self.broadcast();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Connectivity dispatcher shutting down");
                    break;
                }

                message = self.inbox.rx.recv() => {
                    match message {
                        Some(message) => {
                            self.dispatch(message);
                            self.broadcast();
                        }
                        None => {
                            debug!("Dispatcher channel closed");
                            break;
                        }
                    }
                }
            }
        }
        self.manager
    }

    fn dispatch(&mut self, message: Inbound) {
        match message {
            Inbound::Event(event) => self.manager.handle_event(event),
            Inbound::Command(command, reply) => {
                let result = self.manager.execute(command);
                if reply.send(result).is_err() {
                    debug!("Command caller went away before the reply");
                }
            }
            Inbound::Timer {
                purpose,
                generation,
            } => {
                if self.inbox.accept_timer(purpose, generation) {
                    self.manager.handle_event(Event::TimerFired(purpose));
                } else {
                    debug!("Stale {:?} timer dropped (generation {})", purpose, generation);
                }
            }
        }
    }

    fn broadcast(&mut self) {
        for notification in self.manager.drain_notifications() {
            // No subscribers is fine
            let _ = self.notifications.send(notification);
        }
    }
}

// ==================== Handle ====================

/// Application-side handle to a running dispatcher.
#[derive(Clone)]
pub struct ConnectivityHandle {
    events: EventSender,
    notifications: broadcast::Sender<Notification>,
    status: SharedStatus,
}

impl ConnectivityHandle {
    /// Run a command on the dispatcher and wait for its result.
    pub async fn execute(&self, command: Command) -> Result<CommandOutput, ConnectivityError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .tx
            .send(Inbound::Command(command, reply_tx))
            .map_err(|_| ConnectivityError::DispatcherStopped)?;
        reply_rx
            .await
            .map_err(|_| ConnectivityError::DispatcherStopped)?
    }

    async fn run(&self, command: Command) -> Result<(), ConnectivityError> {
        self.execute(command).await.map(|_| ())
    }

    pub async fn set_station_mode(&self, mode: StationMode) -> Result<(), ConnectivityError> {
        self.run(Command::SetStationMode(mode)).await
    }

    pub async fn set_ap_mode(&self, mode: ApMode) -> Result<(), ConnectivityError> {
        self.run(Command::SetApMode(mode)).await
    }

    pub async fn set_tunnel_mode(&self, mode: TunnelMode) -> Result<(), ConnectivityError> {
        self.run(Command::SetTunnelMode(mode)).await
    }

    pub async fn clear_station_provision(&self) -> Result<(), ConnectivityError> {
        self.run(Command::ClearStationProvision).await
    }

    pub async fn demand_start_ap(&self) -> Result<(), ConnectivityError> {
        self.run(Command::DemandStartAp).await
    }

    pub async fn stop_on_demand_ap(&self) -> Result<(), ConnectivityError> {
        self.run(Command::StopOnDemandAp).await
    }

    pub async fn provisioning(
        &self,
        request: ProvisioningRequest,
    ) -> Result<CommandOutput, ConnectivityError> {
        self.execute(Command::Provisioning(request)).await
    }

    /// Receive notifications broadcast after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Sender for platform bridges.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ap::ApState;
    use crate::config::{ConnectivityConfig, NetworkDescriptor, SecurityMode};
    use crate::driver::{CommandLog, RecordingDriver};
    use crate::error::DriverOp;
    use crate::manager::Platform;
    use crate::provisioning::MemoryStore;
    use crate::timer::MonotonicClock;
    use crate::tunnel::RecordingTunnel;

    struct Running {
        handle: ConnectivityHandle,
        log: CommandLog,
        cancel: CancellationToken,
        task: JoinHandle<ConnectivityManager>,
    }

    fn start(config: ConnectivityConfig, store: MemoryStore) -> Running {
        let (events, inbox) = channel();
        let log = CommandLog::new();
        let platform = Platform {
            driver: Box::new(RecordingDriver::new(log.clone())),
            tunnel: Box::new(RecordingTunnel::default()),
            store: Box::new(store),
            timers: Box::new(TokioTimers::new(&events)),
            clock: Box::new(MonotonicClock::new()),
        };
        let manager = ConnectivityManager::new(config, platform).unwrap();
        let (dispatcher, handle) = Dispatcher::new(manager, &events, inbox);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(cancel.clone()));
        Running {
            handle,
            log,
            cancel,
            task,
        }
    }

    /// Commands are handled in order, so a no-op command flushes prior events.
    async fn flush(handle: &ConnectivityHandle) {
        handle.execute(Command::MaintainOnDemandAp).await.unwrap();
    }

    // ==================== Dispatcher Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_command_round_trip() {
        let running = start(ConnectivityConfig::default(), MemoryStore::new());
        running
            .handle
            .set_station_mode(StationMode::Enabled)
            .await
            .unwrap();
        assert_eq!(running.handle.status().snapshot().station_state, "enabling");
        assert_eq!(running.log.count(DriverOp::StartStation), 1);

        let result = running.handle.demand_start_ap().await;
        assert_eq!(result, Err(ConnectivityError::InvalidState));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_drive_state() {
        let network = NetworkDescriptor::new("HomeNet", SecurityMode::Wpa2Personal, "password123")
            .unwrap();
        let running = start(
            ConnectivityConfig {
                station_mode: StationMode::Enabled,
                ..Default::default()
            },
            MemoryStore::with_network(network),
        );
        let events = running.handle.events();
        assert!(events.post(Event::StationStarted));
        assert!(events.post(Event::StationConnected));
        assert!(events.post(Event::Ipv4AddressAvailable([10, 0, 0, 2].into())));
        flush(&running.handle).await;

        assert!(running.handle.status().facts().ipv4_internet);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_timer_fires() {
        let network = NetworkDescriptor::new("HomeNet", SecurityMode::Wpa2Personal, "password123")
            .unwrap();
        let running = start(
            ConnectivityConfig {
                station_mode: StationMode::Enabled,
                ..Default::default()
            },
            MemoryStore::with_network(network),
        );
        let events = running.handle.events();
        events.post(Event::StationStarted);
        events.post(Event::StationDisconnected { reason: 201 });
        flush(&running.handle).await;
        assert_eq!(running.log.count(DriverOp::Connect), 1);

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        flush(&running.handle).await;
        assert_eq!(running.log.count(DriverOp::Connect), 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        flush(&running.handle).await;
        assert_eq!(running.log.count(DriverOp::Connect), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_broadcast() {
        let running = start(ConnectivityConfig::default(), MemoryStore::new());
        let mut notifications = running.handle.subscribe();

        running.handle.set_ap_mode(ApMode::Enabled).await.unwrap();
        let notification = notifications.recv().await.unwrap();
        assert_eq!(
            notification,
            Notification::ApStateChanged {
                from: ApState::NotActive,
                to: ApState::Activating,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_dispatcher() {
        let running = start(ConnectivityConfig::default(), MemoryStore::new());
        running.cancel.cancel();
        let manager = running.task.await.unwrap();
        assert_eq!(manager.station_mode(), StationMode::Disabled);

        assert_eq!(
            running.handle.set_station_mode(StationMode::Enabled).await,
            Err(ConnectivityError::DispatcherStopped)
        );
        assert!(!running.handle.events().post(Event::StationStarted));
    }

    // ==================== Timer Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_generation_rejected() {
        let (events, inbox) = channel();
        let mut timers = TokioTimers::new(&events);

        timers.arm(TimerPurpose::ScanTimeout, Duration::from_secs(1));
        let first = *lock(&inbox.armed).get(&TimerPurpose::ScanTimeout).unwrap();
        timers.arm(TimerPurpose::ScanTimeout, Duration::from_secs(1));

        assert!(!inbox.accept_timer(TimerPurpose::ScanTimeout, first));
        assert!(inbox.accept_timer(TimerPurpose::ScanTimeout, first + 1));
        // Consumed
        assert!(!inbox.accept_timer(TimerPurpose::ScanTimeout, first + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_does_not_fire() {
        let (events, mut inbox) = channel();
        let mut timers = TokioTimers::new(&events);

        timers.arm(TimerPurpose::ApIdle, Duration::from_secs(1));
        timers.cancel(TimerPurpose::ApIdle);
        timers.arm(TimerPurpose::ScanTimeout, Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(3)).await;
        match inbox.rx.recv().await {
            Some(Inbound::Timer {
                purpose,
                generation,
            }) => {
                assert_eq!(purpose, TimerPurpose::ScanTimeout);
                assert!(inbox.accept_timer(purpose, generation));
            }
            _ => panic!("expected a timer firing"),
        }
        assert!(inbox.rx.try_recv().is_err());
    }
}
