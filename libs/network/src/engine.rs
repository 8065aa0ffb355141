//! The peer link engine.
//!
//! Owns a private tokio runtime so the thread-based dispatcher never sees
//! async. `start` binds the listener synchronously (callers need the bound
//! address before peers dial in) and spawns accept/connect tasks; `stop`
//! tears the runtime down, which cancels every link.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use codec::WireFrame;
use types::ServiceId;

use crate::config::{EngineConfig, ListenConfig, PeerConfig};
use crate::error::NetworkError;
use crate::link;
use crate::metrics::EngineMetrics;

/// Where inbound traffic goes. Implemented by the dispatcher core:
/// `deliver` enqueues a decoded frame for its local destination,
/// `peers_joined` broadcasts a topology change to local services.
///
/// Called from engine tasks; implementations must not block for long.
pub trait FrameSink: Send + Sync + 'static {
    fn deliver(&self, frame: WireFrame);
    fn peers_joined(&self, ids: &[ServiceId], remote: bool);
}

pub(crate) struct PeerHandle {
    pub(crate) addr: SocketAddr,
    pub(crate) tx: mpsc::UnboundedSender<Bytes>,
}

/// State shared between the engine surface and its link tasks.
pub(crate) struct EngineShared {
    pub(crate) cfg: EngineConfig,
    pub(crate) sink: OnceLock<Arc<dyn FrameSink>>,
    pub(crate) local_ids: Mutex<Vec<ServiceId>>,
    pub(crate) listen_key: Mutex<String>,
    pub(crate) peers: Mutex<HashMap<u64, PeerHandle>>,
    pub(crate) routes: Mutex<HashMap<ServiceId, u64>>,
    pub(crate) next_peer: AtomicU64,
    pub(crate) listen_addr: Mutex<Option<SocketAddr>>,
    pub(crate) metrics: EngineMetrics,
}

impl EngineShared {
    /// Record a handshaken link and the services reachable through it.
    pub(crate) fn add_peer(
        &self,
        addr: SocketAddr,
        tx: mpsc::UnboundedSender<Bytes>,
        ids: &[ServiceId],
    ) -> u64 {
        let peer_id = self.next_peer.fetch_add(1, Ordering::Relaxed);
        self.peers.lock().insert(peer_id, PeerHandle { addr, tx });
        let mut routes = self.routes.lock();
        for id in ids {
            if let Some(prev) = routes.insert(*id, peer_id) {
                if prev != peer_id {
                    warn!(service = id, "remote service rehomed to a different peer");
                }
            }
        }
        self.metrics.links_opened.fetch_add(1, Ordering::Relaxed);
        peer_id
    }

    pub(crate) fn remove_peer(&self, peer_id: u64) {
        if self.peers.lock().remove(&peer_id).is_some() {
            self.metrics.links_closed.fetch_add(1, Ordering::Relaxed);
        }
        self.routes.lock().retain(|_, p| *p != peer_id);
    }
}

/// The engine surface handed to the dispatcher.
pub struct NetEngine {
    shared: Arc<EngineShared>,
    runtime: Mutex<Option<Runtime>>,
}

impl NetEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                cfg,
                sink: OnceLock::new(),
                local_ids: Mutex::new(Vec::new()),
                listen_key: Mutex::new(String::new()),
                peers: Mutex::new(HashMap::new()),
                routes: Mutex::new(HashMap::new()),
                next_peer: AtomicU64::new(1),
                listen_addr: Mutex::new(None),
                metrics: EngineMetrics::default(),
            }),
            runtime: Mutex::new(None),
        }
    }

    /// Build the runtime, bind the listener if configured, and begin
    /// dialing registered peers. The bind happens before `start` returns
    /// so [`NetEngine::listen_addr`] is immediately usable.
    pub fn start(
        &self,
        sink: Arc<dyn FrameSink>,
        local_ids: Vec<ServiceId>,
        listen: Option<ListenConfig>,
        peers: Vec<PeerConfig>,
    ) -> Result<(), NetworkError> {
        let mut slot = self.runtime.lock();
        if slot.is_some() {
            return Err(NetworkError::AlreadyStarted);
        }

        self.shared.sink.set(sink).ok();
        *self.shared.local_ids.lock() = local_ids;

        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("net-engine")
            .enable_all()
            .build()
            .map_err(NetworkError::Runtime)?;

        if let Some(cfg) = listen {
            *self.shared.listen_key.lock() = cfg.key.clone();
            let listener = runtime
                .block_on(TcpListener::bind((cfg.ip.as_str(), cfg.port)))
                .map_err(|source| NetworkError::Bind {
                    addr: format!("{}:{}", cfg.ip, cfg.port),
                    source,
                })?;
            let addr = listener.local_addr().map_err(|source| NetworkError::Bind {
                addr: format!("{}:{}", cfg.ip, cfg.port),
                source,
            })?;
            *self.shared.listen_addr.lock() = Some(addr);
            info!(%addr, "listening for peer dispatchers");
            runtime.spawn(link::accept_loop(Arc::clone(&self.shared), listener));
        }

        for peer in peers {
            debug!(host = %peer.ip, port = peer.port, "dialing peer dispatcher");
            runtime.spawn(link::connect_loop(Arc::clone(&self.shared), peer));
        }

        *slot = Some(runtime);
        Ok(())
    }

    /// Tear the runtime down, cancelling every link task. Idempotent.
    pub fn stop(&self) {
        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(Duration::from_secs(1));
            info!("engine stopped");
        }
        self.shared.peers.lock().clear();
        self.shared.routes.lock().clear();
    }

    /// Hand an encoded frame (size prefix included) to the link hosting
    /// `dest`. No route or a dead link drops the frame with a diagnostic;
    /// delivery is not acknowledged.
    pub fn forward(&self, dest: ServiceId, frame: Bytes) {
        let peer_id = match self.shared.routes.lock().get(&dest) {
            Some(peer_id) => *peer_id,
            None => {
                self.shared
                    .metrics
                    .no_route_drops
                    .fetch_add(1, Ordering::Relaxed);
                warn!(dest, "no route to remote service, dropping frame");
                return;
            }
        };
        let peers = self.shared.peers.lock();
        match peers.get(&peer_id) {
            Some(handle) if handle.tx.send(frame).is_ok() => {
                self.shared.metrics.frames_out.fetch_add(1, Ordering::Relaxed);
            }
            Some(handle) => {
                self.shared
                    .metrics
                    .no_route_drops
                    .fetch_add(1, Ordering::Relaxed);
                warn!(dest, peer = %handle.addr, "peer writer gone, dropping frame");
            }
            None => {
                self.shared
                    .metrics
                    .no_route_drops
                    .fetch_add(1, Ordering::Relaxed);
                warn!(dest, "peer vanished between route lookup and send");
            }
        }
    }

    /// Address the listener actually bound, once `start` configured one.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        *self.shared.listen_addr.lock()
    }

    /// True if `dest` is currently reachable through some peer link.
    pub fn has_route(&self, dest: ServiceId) -> bool {
        self.shared.routes.lock().contains_key(&dest)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.shared.metrics
    }

    #[cfg(test)]
    pub(crate) fn test_shared(&self) -> Arc<EngineShared> {
        Arc::clone(&self.shared)
    }
}

impl std::fmt::Debug for NetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetEngine")
            .field("running", &self.runtime.lock().is_some())
            .field("listen_addr", &self.listen_addr())
            .field("peers", &self.shared.peers.lock().len())
            .field("routes", &self.shared.routes.lock().len())
            .finish()
    }
}
