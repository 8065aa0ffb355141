//! The dispatcher: registry + scheduler + router + lifecycle.
//!
//! # Scheduling discipline
//!
//! The dispatch unit is the *service*, not the message. A send appends to
//! the destination's mailbox and marks the id pending (deduplicated by a
//! per-service flag); a free worker takes one pending id and drains that
//! mailbox to empty before returning to the queue. Unrelated services run
//! concurrently on different workers; one service's messages are processed
//! strictly in arrival order by one worker at a time.
//!
//! # Routing
//!
//! `send` resolves the destination against the registry: registered ids
//! get direct mailbox delivery; everything else is encoded into a wire
//! frame and redirected to the bridging service (id 0), which hands it to
//! the link engine. Senders write the same call either way.
//!
//! # Lifecycle
//!
//! Idle → Running → Stopped, one way. Registration is open only while
//! idle, which is what lets steady-state registry reads go lock-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use codec::{Schema, WireFrame};
use network::{EngineConfig, FrameSink, ListenConfig, NetEngine, PeerConfig};
use types::{Body, Envelope, MessageKind, ServiceId, Value, BRIDGE_ID, MAX_SERVICE_ID};

use crate::bridge::BridgeService;
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, RegistryError};
use crate::metrics::DispatchMetrics;
use crate::queue::PendingQueue;
use crate::registry::Registry;
use crate::service::{Context, Service, ServiceHandle};
use crate::timer::CycleScheduler;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// State shared between the façade, the workers, the timer driver, and
/// the engine's sink callbacks.
pub(crate) struct DispatcherCore {
    pub(crate) registry: Registry,
    pub(crate) queue: PendingQueue,
    pub(crate) timers: CycleScheduler,
    pub(crate) engine: OnceLock<Arc<NetEngine>>,
    pub(crate) schemas: Mutex<HashMap<MessageKind, Schema>>,
    pub(crate) metrics: DispatchMetrics,
    state: AtomicU8,
}

impl DispatcherCore {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            // One slot per assignable id: the pending flag caps distinct
            // queued ids at exactly this number, so the queue cannot fill.
            queue: PendingQueue::new(MAX_SERVICE_ID as usize + 1),
            timers: CycleScheduler::new(),
            engine: OnceLock::new(),
            schemas: Mutex::new(HashMap::new()),
            metrics: DispatchMetrics::default(),
            state: AtomicU8::new(STATE_IDLE),
        }
    }

    fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == STATE_RUNNING
    }

    /// Flag `sid` as having unprocessed mail. Idempotent while the flag
    /// is set, which keeps each id in the queue at most once.
    pub(crate) fn mark_pending(&self, sid: ServiceId) {
        let Some(cell) = self.registry.get(sid) else {
            warn!(service = sid, "mark_pending for unregistered id ignored");
            return;
        };
        if cell.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.queue.push(sid) {
            // Capacity covers every distinct id; a failed push means the
            // dedup flag was bypassed somewhere. Reset so a later send
            // can recover the service.
            cell.pending.store(false, Ordering::Release);
            self.metrics.pending_overflows.fetch_add(1, Ordering::Relaxed);
            error!(
                service = sid,
                "pending queue rejected push despite dedup flag; entry dropped"
            );
        }
    }

    /// Append to a local mailbox and schedule the destination.
    pub(crate) fn deliver_local(&self, env: Envelope) {
        let dest = env.dest;
        let Some(cell) = self.registry.get(dest) else {
            warn!(dest, kind = env.kind, "message for unregistered local service dropped");
            return;
        };
        cell.mailbox.push(env);
        self.mark_pending(dest);
    }

    /// Worker entry: clear the pending flag, then drain the mailbox to
    /// empty. Messages arriving mid-drain are consumed in this same pass;
    /// if one of them re-queued the id, the next worker finds an empty
    /// mailbox once the service mutex is released.
    pub(crate) fn drain(&self, sid: ServiceId) {
        let Some(cell) = self.registry.get(sid) else {
            warn!(service = sid, "pending id is not registered, ignoring");
            return;
        };
        cell.pending.store(false, Ordering::Release);
        let mut service = cell.service.lock();
        let ctx = Context::new(self, sid);
        while let Some(env) = cell.mailbox.pop() {
            self.metrics.messages_drained.fetch_add(1, Ordering::Relaxed);
            let Envelope { src, dest, kind, body } = env;
            match body {
                Body::Tick { .. } => service.on_tick(&ctx),
                Body::PeersJoined { ids, remote } => {
                    service.on_peers_joined(&ctx, &ids, remote)
                }
                body => service.handle(&ctx, Envelope { src, dest, kind, body }),
            }
        }
    }

    /// Broadcast a topology change to every locally registered service.
    pub(crate) fn notify_join(&self, ids: &[ServiceId], remote: bool) {
        let ids: Arc<[ServiceId]> = ids.into();
        for sid in self.registry.local_ids() {
            self.deliver_local(Envelope::peers_joined(sid, Arc::clone(&ids), remote));
        }
    }

    /// One timer scan pass, invoked by the driver thread.
    pub(crate) fn scan_timers(&self, now: Instant) {
        let fired = self.timers.scan(now, |tick| self.deliver_local(tick));
        if fired > 0 {
            self.metrics
                .timer_fires
                .fetch_add(fired as u64, Ordering::Relaxed);
        }
    }

    fn schema_ok(&self, kind: MessageKind, args: &[Value]) -> bool {
        if let Some(schema) = self.schemas.lock().get(&kind) {
            if let Err(e) = schema.check(args) {
                self.metrics.schema_rejects.fetch_add(1, Ordering::Relaxed);
                error!(kind, error = %e, "payload rejected by schema, send halted");
                return false;
            }
        }
        true
    }

    /// Auto-routed send. Faults (invalid destination, schema reject,
    /// encode failure) are logged, not returned: only registration errors
    /// are part of the caller-visible API.
    pub(crate) fn send(
        &self,
        src: ServiceId,
        dest: ServiceId,
        kind: MessageKind,
        args: Vec<Value>,
    ) {
        if dest == BRIDGE_ID || dest > MAX_SERVICE_ID {
            warn!(src, dest, "send to invalid destination dropped");
            return;
        }
        if self.registry.contains(dest) {
            self.send_local(src, dest, kind, args);
        } else {
            self.send_remote(src, dest, kind, args);
        }
    }

    pub(crate) fn send_local(
        &self,
        src: ServiceId,
        dest: ServiceId,
        kind: MessageKind,
        args: Vec<Value>,
    ) {
        if !self.schema_ok(kind, &args) {
            return;
        }
        self.metrics.local_sends.fetch_add(1, Ordering::Relaxed);
        self.deliver_local(Envelope::args(src, dest, kind, args));
    }

    /// Always-remote send: frame the payload and hand it to the bridge,
    /// bypassing the locality check.
    pub(crate) fn send_remote(
        &self,
        src: ServiceId,
        dest: ServiceId,
        kind: MessageKind,
        args: Vec<Value>,
    ) {
        if dest == BRIDGE_ID || dest > MAX_SERVICE_ID {
            warn!(src, dest, "remote send to invalid destination dropped");
            return;
        }
        if !self.schema_ok(kind, &args) {
            return;
        }
        match WireFrame::encode(dest, kind, &args) {
            Ok(bytes) => {
                self.metrics.remote_sends.fetch_add(1, Ordering::Relaxed);
                self.deliver_local(Envelope::frame(src, dest, bytes));
            }
            Err(e) => {
                // Includes the probe/encode size mismatch: a codec bug,
                // not a transient condition. Halt this send only.
                error!(src, dest, kind, error = %e, "frame encode failed, send halted");
            }
        }
    }
}

/// Inbound traffic from the link engine.
impl FrameSink for DispatcherCore {
    fn deliver(&self, frame: WireFrame) {
        self.deliver_local(Envelope::args(BRIDGE_ID, frame.dest, frame.kind, frame.args));
    }

    fn peers_joined(&self, ids: &[ServiceId], remote: bool) {
        self.notify_join(ids, remote);
    }
}

fn worker_loop(core: Arc<DispatcherCore>, stop: Receiver<()>) {
    debug!("worker started");
    while core.is_running() {
        match core.queue.pop(&stop) {
            Some(sid) => core.drain(sid),
            None => break,
        }
    }
    debug!("worker exited");
}

fn timer_loop(core: Arc<DispatcherCore>, stop: Receiver<()>, interval: Duration) {
    debug!(?interval, "cycle timer driver started");
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => core.scan_timers(Instant::now()),
            _ => break,
        }
    }
    debug!("cycle timer driver exited");
}

/// The façade owning registry, scheduler, timers, router, and engine.
///
/// One explicitly constructed instance per process (or per test); pass it
/// by reference wherever sends originate. Construction is cheap; nothing
/// runs until [`Dispatcher::start`].
pub struct Dispatcher {
    core: Arc<DispatcherCore>,
    timer_interval: Duration,
    engine_cfg: EngineConfig,
    listen: Mutex<Option<ListenConfig>>,
    peers: Mutex<Vec<PeerConfig>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    stop_tx: Mutex<Option<Sender<()>>>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            core: Arc::new(DispatcherCore::new()),
            timer_interval: config.timer_interval,
            engine_cfg: config.engine,
            listen: Mutex::new(config.listen),
            peers: Mutex::new(config.peers),
            threads: Mutex::new(Vec::new()),
            stop_tx: Mutex::new(None),
        }
    }

    /// Admit `service` under `id`. Pre-start only; the instance is owned
    /// by the dispatcher from here on and lives until teardown. Declaring
    /// a nonzero [`Service::cycle_period`] also creates the matching
    /// cycle timer.
    pub fn register<S: Service>(
        &self,
        id: ServiceId,
        service: S,
    ) -> Result<ServiceHandle, RegistryError> {
        if self.core.state() != STATE_IDLE {
            return Err(RegistryError::AlreadyStarted);
        }
        let period = service.cycle_period();
        self.core.registry.insert(id, Box::new(service))?;
        match period {
            Some(period) if !period.is_zero() => {
                self.core.timers.register(id, period);
                debug!(service = id, ?period, "registered service with cycle timer");
            }
            _ => debug!(service = id, "registered service"),
        }
        Ok(ServiceHandle::new(id))
    }

    /// Declare the payload shape for `kind`, checked on every send of
    /// that kind. Pre-start only.
    pub fn register_schema(&self, kind: MessageKind, schema: Schema) -> Result<(), DispatchError> {
        if self.core.state() != STATE_IDLE {
            return Err(DispatchError::AlreadyRunning);
        }
        match self.core.schemas.lock().entry(kind) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(DispatchError::DuplicateSchema { kind })
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(schema);
                Ok(())
            }
        }
    }

    /// Configure inbound acceptance for peer dispatchers. Ignored with a
    /// diagnostic after start.
    pub fn set_listen_address(&self, ip: &str, port: u16, key: &str) {
        if self.core.state() != STATE_IDLE {
            warn!("listen address change ignored after start");
            return;
        }
        *self.listen.lock() = Some(ListenConfig {
            ip: ip.to_string(),
            port,
            key: key.to_string(),
        });
    }

    /// Record an outbound peer the bridge should connect to at start. A
    /// registry of intent: no network call happens here.
    pub fn register_remote_peer(
        &self,
        ip: &str,
        port: u16,
        key: &str,
    ) -> Result<(), DispatchError> {
        if self.core.state() != STATE_IDLE {
            return Err(DispatchError::AlreadyRunning);
        }
        self.peers.lock().push(PeerConfig {
            ip: ip.to_string(),
            port,
            key: key.to_string(),
        });
        Ok(())
    }

    /// Spawn the worker pool and bring the system up, in order: engine,
    /// bridge service, workers, timer driver, listener, peer connects,
    /// local join broadcast.
    pub fn start(&self, worker_threads: usize) -> Result<(), DispatchError> {
        if worker_threads == 0 {
            return Err(DispatchError::NoWorkers);
        }
        match self.core.state.compare_exchange(
            STATE_IDLE,
            STATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(STATE_RUNNING) => return Err(DispatchError::AlreadyRunning),
            Err(_) => return Err(DispatchError::Stopped),
        }
        info!(worker_threads, "starting dispatcher");

        let engine = Arc::new(NetEngine::new(self.engine_cfg.clone()));
        self.core.engine.set(Arc::clone(&engine)).ok();
        self.core
            .registry
            .insert_bridge(Box::new(BridgeService::new(Arc::clone(&engine))))?;

        self.core.timers.arm(Instant::now());

        let (stop_tx, stop_rx) = crossbeam_channel::unbounded::<()>();
        *self.stop_tx.lock() = Some(stop_tx);
        let spawned: std::io::Result<()> = {
            let mut threads = self.threads.lock();
            (|| {
                for i in 0..worker_threads {
                    let core = Arc::clone(&self.core);
                    let stop = stop_rx.clone();
                    threads.push(
                        thread::Builder::new()
                            .name(format!("dispatch-worker-{i}"))
                            .spawn(move || worker_loop(core, stop))?,
                    );
                }
                let core = Arc::clone(&self.core);
                let interval = self.timer_interval;
                threads.push(
                    thread::Builder::new()
                        .name("cycle-timer".to_string())
                        .spawn(move || timer_loop(core, stop_rx, interval))?,
                );
                Ok(())
            })()
        };
        if let Err(e) = spawned {
            error!(error = %e, "thread spawn failed, shutting down");
            self.stop();
            return Err(e.into());
        }

        let local_ids = self.core.registry.local_ids();
        let listen = self.listen.lock().clone();
        let peers = self.peers.lock().clone();
        if let Err(e) = engine.start(
            Arc::clone(&self.core) as Arc<dyn FrameSink>,
            local_ids.clone(),
            listen,
            peers,
        ) {
            error!(error = %e, "engine failed to start, shutting down");
            self.stop();
            return Err(e.into());
        }

        self.core.notify_join(&local_ids, false);
        info!(services = local_ids.len(), "dispatcher running");
        Ok(())
    }

    /// Stop accepting and connecting, wake and join every thread.
    /// Idempotent: a second call (or a call before start) is a no-op.
    pub fn stop(&self) {
        if self
            .core
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_STOPPED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("stop ignored: dispatcher not running");
            return;
        }
        info!("stopping dispatcher");
        if let Some(engine) = self.core.engine.get() {
            engine.stop();
        }
        // Disconnecting the stop channel wakes every blocked pop.
        self.stop_tx.lock().take();
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            if let Err(e) = handle.join() {
                error!("dispatcher thread panicked: {e:?}");
            }
        }
        info!("dispatcher stopped");
    }

    /// Auto-routed send; see [`Context::send`] for the in-service form.
    pub fn send(&self, src: ServiceId, dest: ServiceId, kind: MessageKind, args: Vec<Value>) {
        self.core.send(src, dest, kind, args);
    }

    pub fn send_local(&self, src: ServiceId, dest: ServiceId, kind: MessageKind, args: Vec<Value>) {
        self.core.send_local(src, dest, kind, args);
    }

    pub fn send_remote(
        &self,
        src: ServiceId,
        dest: ServiceId,
        kind: MessageKind,
        args: Vec<Value>,
    ) {
        self.core.send_remote(src, dest, kind, args);
    }

    /// Broadcast a topology change to every local service.
    pub fn notify_join(&self, ids: &[ServiceId], remote: bool) {
        self.core.notify_join(ids, remote);
    }

    /// Self-scheduling hook for external code; see [`Context::mark_pending`].
    pub fn mark_pending(&self, sid: ServiceId) {
        self.core.mark_pending(sid);
    }

    pub fn local_ids(&self) -> Vec<ServiceId> {
        self.core.registry.local_ids()
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.core.metrics
    }

    /// The link engine, once started.
    pub fn engine(&self) -> Option<&Arc<NetEngine>> {
        self.core.engine.get()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.core.state())
            .field("services", &self.core.registry.local_ids().len())
            .finish()
    }
}
