//! Per-link tasks: accept, dial, handshake, read loop, writer.
//!
//! Link errors terminate the task and are logged at debug level; outbound
//! links redial on `reconnect_interval`. The hello is an ordinary wire
//! frame (dest 0, kind `PEER_HELLO`, args `[key, [ids...]]`) so the codec
//! is exercised end to end.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context as _;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use codec::{CodecError, WireFrame};
use types::{kinds, ServiceId, Value, BRIDGE_ID};

use crate::config::PeerConfig;
use crate::engine::EngineShared;

#[derive(Clone, Copy, PartialEq)]
enum Role {
    Inbound,
    Outbound,
}

pub(crate) async fn accept_loop(shared: Arc<EngineShared>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "accepted peer link");
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = run_link(shared, stream, addr, Role::Inbound, String::new()).await
                    {
                        debug!(%addr, error = %e, "peer link closed");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

pub(crate) async fn connect_loop(shared: Arc<EngineShared>, peer: PeerConfig) {
    loop {
        let attempt = timeout(
            shared.cfg.connect_timeout,
            TcpStream::connect((peer.ip.as_str(), peer.port)),
        )
        .await;
        match attempt {
            Ok(Ok(stream)) => {
                let addr = stream
                    .peer_addr()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
                info!(%addr, "connected to peer dispatcher");
                if let Err(e) =
                    run_link(Arc::clone(&shared), stream, addr, Role::Outbound, peer.key.clone())
                        .await
                {
                    debug!(%addr, error = %e, "peer link closed");
                }
            }
            Ok(Err(e)) => {
                debug!(host = %peer.ip, port = peer.port, error = %e, "peer connect failed")
            }
            Err(_) => debug!(host = %peer.ip, port = peer.port, "peer connect timed out"),
        }
        sleep(shared.cfg.reconnect_interval).await;
    }
}

async fn run_link(
    shared: Arc<EngineShared>,
    stream: TcpStream,
    addr: SocketAddr,
    role: Role,
    key: String,
) -> anyhow::Result<()> {
    stream.set_nodelay(true).ok();
    let (mut rd, mut wr) = stream.into_split();

    if role == Role::Outbound {
        let hello = hello_frame(&shared, &key)?;
        wr.write_all(&hello).await.context("send hello")?;
    }

    // The first frame on any link must be the peer's hello.
    let body = read_frame(&mut rd).await.context("read hello")?;
    let frame = WireFrame::decode_body(&body)?;
    let (peer_key, ids) = parse_hello(&frame)?;

    if role == Role::Inbound {
        let expected = shared.listen_key.lock().clone();
        if peer_key != expected {
            shared.metrics.auth_rejects.fetch_add(1, Ordering::Relaxed);
            warn!(%addr, "peer link rejected: key mismatch");
            anyhow::bail!("key mismatch");
        }
        // Acceptor answers with its own id set; the connector already
        // proved it knows the address, no key flows back.
        let hello = hello_frame(&shared, "")?;
        wr.write_all(&hello).await.context("send hello")?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let peer_id = shared.add_peer(addr, tx, &ids);
    if let Some(sink) = shared.sink.get() {
        sink.peers_joined(&ids, true);
    }
    info!(%addr, services = ?ids, "peer link established");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if wr.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let result = read_loop(&shared, &mut rd, addr).await;
    shared.remove_peer(peer_id);
    writer.abort();
    result
}

async fn read_loop(
    shared: &EngineShared,
    rd: &mut (impl AsyncRead + Unpin),
    addr: SocketAddr,
) -> anyhow::Result<()> {
    loop {
        let body = read_frame(rd).await?;
        shared.metrics.frames_in.fetch_add(1, Ordering::Relaxed);
        match WireFrame::decode_body(&body) {
            Ok(frame) if frame.kind == kinds::PEER_HELLO => {
                debug!(%addr, "duplicate hello ignored");
            }
            Ok(frame) => {
                if let Some(sink) = shared.sink.get() {
                    sink.deliver(frame);
                }
            }
            Err(e) => warn!(%addr, error = %e, "undecodable frame dropped"),
        }
    }
}

/// Read one `[u16 size][body]` frame, returning the body.
async fn read_frame(rd: &mut (impl AsyncRead + Unpin)) -> anyhow::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 2];
    rd.read_exact(&mut len_bytes).await?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    let mut body = vec![0u8; len];
    rd.read_exact(&mut body).await?;
    Ok(body)
}

fn hello_frame(shared: &EngineShared, key: &str) -> Result<Bytes, CodecError> {
    let ids: Vec<Value> = shared
        .local_ids
        .lock()
        .iter()
        .map(|id| Value::U16(*id))
        .collect();
    WireFrame::encode(
        BRIDGE_ID,
        kinds::PEER_HELLO,
        &[Value::Str(key.to_string()), Value::List(ids)],
    )
}

fn parse_hello(frame: &WireFrame) -> anyhow::Result<(String, Vec<ServiceId>)> {
    anyhow::ensure!(
        frame.kind == kinds::PEER_HELLO,
        "first frame has kind {}, expected hello",
        frame.kind
    );
    match frame.args.as_slice() {
        [Value::Str(key), Value::List(items)] => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::U16(id) => ids.push(*id),
                    other => anyhow::bail!("hello id list holds non-id field {other:?}"),
                }
            }
            Ok((key.clone(), ids))
        }
        _ => anyhow::bail!("malformed hello payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::NetEngine;

    fn shared_for_test(ids: Vec<ServiceId>) -> Arc<EngineShared> {
        // NetEngine::new is the only constructor; reach through a fresh
        // engine to get a populated shared block.
        let engine = NetEngine::new(EngineConfig::default());
        *engine.test_shared().local_ids.lock() = ids;
        engine.test_shared()
    }

    #[test]
    fn hello_roundtrip() {
        let shared = shared_for_test(vec![3, 9, 400]);
        let bytes = hello_frame(&shared, "sesame").unwrap();
        let frame = WireFrame::decode(&bytes).unwrap();
        assert_eq!(frame.dest, BRIDGE_ID);
        let (key, ids) = parse_hello(&frame).unwrap();
        assert_eq!(key, "sesame");
        assert_eq!(ids, vec![3, 9, 400]);
    }

    #[test]
    fn non_hello_first_frame_rejected() {
        let bytes = WireFrame::encode(5, 21, &[]).unwrap();
        let frame = WireFrame::decode(&bytes).unwrap();
        assert!(parse_hello(&frame).is_err());
    }
}
