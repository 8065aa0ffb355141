//! Link-level integration: two engines over 127.0.0.1 ephemeral ports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use codec::WireFrame;
use network::{EngineConfig, FrameSink, ListenConfig, NetEngine, PeerConfig};
use types::{ServiceId, Value};

#[derive(Default)]
struct TestSink {
    frames: Mutex<Vec<WireFrame>>,
    joined: Mutex<Vec<(Vec<ServiceId>, bool)>>,
}

impl FrameSink for TestSink {
    fn deliver(&self, frame: WireFrame) {
        self.frames.lock().push(frame);
    }

    fn peers_joined(&self, ids: &[ServiceId], remote: bool) {
        self.joined.lock().push((ids.to_vec(), remote));
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn quick_redial() -> EngineConfig {
    EngineConfig {
        connect_timeout: Duration::from_secs(1),
        reconnect_interval: Duration::from_millis(50),
    }
}

#[test]
fn frames_flow_between_authenticated_engines() {
    let server = NetEngine::new(EngineConfig::default());
    let server_sink = Arc::new(TestSink::default());
    server
        .start(
            server_sink.clone(),
            vec![10, 11],
            Some(ListenConfig {
                ip: "127.0.0.1".into(),
                port: 0,
                key: "sesame".into(),
            }),
            vec![],
        )
        .unwrap();
    let addr = server.listen_addr().expect("listener bound");

    let client = NetEngine::new(quick_redial());
    let client_sink = Arc::new(TestSink::default());
    client
        .start(
            client_sink.clone(),
            vec![5],
            None,
            vec![PeerConfig {
                ip: "127.0.0.1".into(),
                port: addr.port(),
                key: "sesame".into(),
            }],
        )
        .unwrap();

    // Handshake completes in both directions.
    wait_until("client to learn server ids", || client.has_route(10));
    wait_until("server to learn client ids", || server.has_route(5));
    assert!(client_sink
        .joined
        .lock()
        .iter()
        .any(|(ids, remote)| *remote && ids.contains(&10) && ids.contains(&11)));
    assert!(server_sink
        .joined
        .lock()
        .iter()
        .any(|(ids, remote)| *remote && ids == &vec![5]));

    // A frame forwarded at the client surfaces at the server sink intact.
    let frame = WireFrame::encode(10, 21, &[Value::U32(7), Value::Str("hi".into())]).unwrap();
    client.forward(10, frame);
    wait_until("frame delivery", || !server_sink.frames.lock().is_empty());
    let got = server_sink.frames.lock()[0].clone();
    assert_eq!(got.dest, 10);
    assert_eq!(got.kind, 21);
    assert_eq!(got.args, vec![Value::U32(7), Value::Str("hi".into())]);

    client.stop();
    server.stop();
}

#[test]
fn wrong_key_is_rejected_and_learns_no_routes() {
    let server = NetEngine::new(EngineConfig::default());
    let server_sink = Arc::new(TestSink::default());
    server
        .start(
            server_sink.clone(),
            vec![10],
            Some(ListenConfig {
                ip: "127.0.0.1".into(),
                port: 0,
                key: "sesame".into(),
            }),
            vec![],
        )
        .unwrap();
    let addr = server.listen_addr().unwrap();

    let client = NetEngine::new(quick_redial());
    let client_sink = Arc::new(TestSink::default());
    client
        .start(
            client_sink.clone(),
            vec![5],
            None,
            vec![PeerConfig {
                ip: "127.0.0.1".into(),
                port: addr.port(),
                key: "wrong".into(),
            }],
        )
        .unwrap();

    wait_until("auth reject", || {
        server.metrics().snapshot().auth_rejects >= 1
    });
    assert!(!server.has_route(5));
    assert!(server_sink.joined.lock().is_empty());

    // Forwarding at the server toward the rejected client drops cleanly.
    let frame = WireFrame::encode(5, 21, &[]).unwrap();
    server.forward(5, frame);
    assert!(server.metrics().snapshot().no_route_drops >= 1);

    client.stop();
    server.stop();
}

#[test]
fn double_stop_is_a_no_op() {
    let engine = NetEngine::new(EngineConfig::default());
    let sink = Arc::new(TestSink::default());
    engine.start(sink, vec![], None, vec![]).unwrap();
    engine.stop();
    engine.stop();
}
