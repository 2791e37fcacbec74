//! Sessions Cast contre un récepteur scripté sur loopback (TCP sans TLS).

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pmocast::namespaces::{CONNECTION, HEARTBEAT, MEDIA, RECEIVER, RECEIVER_ID};
use pmocast::{
    CastError, CastMessage, CastSession, DEFAULT_MEDIA_RECEIVER_APP_ID, DefaultMediaReceiver,
    FrameDecoder, MediaRequest, SessionConfig, TransportConfig, encode_frame,
};
use serde_json::{Value, json};

const TEST_NS: &str = "urn:x-cast:com.example.test";

#[derive(Debug, Clone)]
struct Received {
    namespace: String,
    destination: String,
    payload: Value,
}

impl Received {
    fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }
}

struct FakeDevice {
    log: Arc<Mutex<Vec<Received>>>,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    fn received(&self) -> Vec<Received> {
        self.log.lock().clone()
    }

    fn join(self) -> Vec<Received> {
        self.handle.join().unwrap();
        self.log.lock().clone()
    }
}

/// Démarre un récepteur dont `script` produit les réponses à chaque message.
///
/// Les réponses partent sur le namespace de la requête et reprennent son
/// `requestId` quand elles n'en portent pas.
fn spawn_device<F>(mut script: F) -> (FakeDevice, TcpStream)
where
    F: FnMut(&str, &Value) -> Vec<Value> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let device_log = Arc::clone(&log);

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];

        loop {
            match stream.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => decoder.extend(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
                Err(_) => return,
            }

            while let Ok(Some(message)) = decoder.next_frame() {
                let payload = message.payload_json().unwrap();
                device_log.lock().push(Received {
                    namespace: message.namespace.clone(),
                    destination: message.destination_id.clone(),
                    payload: payload.clone(),
                });

                for mut reply in script(&message.namespace, &payload) {
                    if reply.get("requestId").is_none() {
                        if let Some(id) = payload.get("requestId") {
                            reply["requestId"] = id.clone();
                        }
                    }
                    let out = CastMessage::json(
                        &message.destination_id,
                        &message.source_id,
                        &message.namespace,
                        &reply,
                    );
                    if stream.write_all(&encode_frame(&out).unwrap()).is_err() {
                        return;
                    }
                }
            }
        }
    });

    let client = TcpStream::connect(addr).unwrap();
    (FakeDevice { log, handle }, client)
}

fn transport_config() -> TransportConfig {
    TransportConfig {
        request_timeout: Duration::from_millis(2000),
        heartbeat_interval: Duration::from_secs(60),
        poll_timeout: Duration::from_millis(20),
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        poll_attempts: 5,
        poll_interval: Duration::from_millis(10),
        load_timeout: Duration::from_millis(1000),
    }
}

fn open_session(stream: TcpStream, transport: TransportConfig) -> CastSession {
    CastSession::handshake(Box::new(stream), transport, session_config()).unwrap()
}

fn receiver_status(apps: Value) -> Value {
    json!({"type": "RECEIVER_STATUS", "status": {"applications": apps}})
}

fn available(app_id: &str, state: &str) -> Value {
    let mut availability = serde_json::Map::new();
    availability.insert(app_id.to_string(), json!(state));
    json!({
        "responseType": "GET_APP_AVAILABILITY",
        "availability": availability
    })
}

fn media_app() -> Value {
    json!([{
        "appId": DEFAULT_MEDIA_RECEIVER_APP_ID,
        "sessionId": "session-42",
        "transportId": "web-5",
        "namespaces": [{"name": MEDIA}]
    }])
}

/// Récepteur standard : l'application apparaît au `ready_after`-ième
/// `GET_STATUS` suivant le `LAUNCH` et `load_reply` répond au `LOAD`.
fn launcher_script(
    ready_after: Option<u32>,
    load_reply: Value,
    polls: Arc<AtomicU32>,
) -> impl FnMut(&str, &Value) -> Vec<Value> + Send + 'static {
    let mut launched = false;
    move |namespace: &str, payload: &Value| {
        let kind = payload.get("type").and_then(Value::as_str).unwrap_or_default();
        match (namespace, kind) {
            (RECEIVER, "GET_APP_AVAILABILITY") => {
                vec![available(DEFAULT_MEDIA_RECEIVER_APP_ID, "APP_AVAILABLE")]
            }
            (RECEIVER, "LAUNCH") => {
                launched = true;
                vec![]
            }
            (RECEIVER, "GET_STATUS") if launched => {
                let poll = polls.fetch_add(1, Ordering::SeqCst) + 1;
                match ready_after {
                    Some(ready) if poll >= ready => vec![receiver_status(media_app())],
                    _ => vec![receiver_status(json!([]))],
                }
            }
            (RECEIVER, "GET_STATUS") => vec![receiver_status(json!([]))],
            (MEDIA, "LOAD") => vec![load_reply.clone()],
            _ => vec![],
        }
    }
}

#[test]
fn test_handshake_connects_and_pings() {
    let (device, stream) = spawn_device(|namespace, payload| {
        match payload.get("type").and_then(Value::as_str) {
            Some("GET_STATUS") if namespace == RECEIVER => vec![receiver_status(json!([]))],
            _ => vec![],
        }
    });

    let session = open_session(stream, transport_config());
    assert!(session.is_connected());
    thread::sleep(Duration::from_millis(100));
    drop(session);

    let log = device.join();
    assert_eq!(log[0].namespace, CONNECTION);
    assert_eq!(log[0].kind(), Some("CONNECT"));
    assert_eq!(log[0].destination, RECEIVER_ID);
    assert!(log.iter().any(|m| m.namespace == HEARTBEAT && m.kind() == Some("PING")));
}

#[test]
fn test_launch_app_found_on_third_poll() {
    let polls = Arc::new(AtomicU32::new(0));
    let (device, stream) = spawn_device(launcher_script(
        Some(3),
        json!({"type": "MEDIA_STATUS", "status": []}),
        Arc::clone(&polls),
    ));
    let session = open_session(stream, transport_config());

    let media = MediaRequest::new("http://192.168.1.10:8080/movie.mp4", "video/mp4");
    let details = DefaultMediaReceiver::new(&session).load(&media).unwrap();

    assert_eq!(polls.load(Ordering::SeqCst), 3);
    assert_eq!(details.transport_id, "web-5");
    assert_eq!(details.session_id, "session-42");
    assert_eq!(session.active_app(), Some(details));

    let log = device.received();
    assert!(
        log.iter()
            .any(|m| m.namespace == CONNECTION && m.kind() == Some("CONNECT") && m.destination == "web-5")
    );
    let load = log.iter().find(|m| m.kind() == Some("LOAD")).unwrap();
    assert_eq!(load.namespace, MEDIA);
    assert_eq!(load.destination, "web-5");
    assert!(load.payload["requestId"].is_u64());
    assert_eq!(load.payload["media"]["contentId"], "http://192.168.1.10:8080/movie.mp4");
    assert_eq!(load.payload["media"]["contentType"], "video/mp4");

    drop(session);
    device.join();
}

#[test]
fn test_launch_app_gives_up_after_bounded_polls() {
    let polls = Arc::new(AtomicU32::new(0));
    let (device, stream) = spawn_device(launcher_script(
        None,
        json!({"type": "MEDIA_STATUS"}),
        Arc::clone(&polls),
    ));
    let session = open_session(stream, transport_config());

    let result = session.launch_app(DEFAULT_MEDIA_RECEIVER_APP_ID, json!({"type": "LOAD"}));

    assert!(matches!(result, Err(CastError::LaunchTimeout { polls: 5 })));
    assert_eq!(polls.load(Ordering::SeqCst), 5);
    assert!(session.active_app().is_none());
    assert!(!device.received().iter().any(|m| m.kind() == Some("LOAD")));
    assert!(session.is_connected());

    drop(session);
    device.join();
}

#[test]
fn test_unavailable_app_is_not_launched() {
    let (device, stream) = spawn_device(|namespace, payload| {
        match (namespace, payload.get("type").and_then(Value::as_str)) {
            (RECEIVER, Some("GET_STATUS")) => vec![receiver_status(json!([]))],
            (RECEIVER, Some("GET_APP_AVAILABILITY")) => {
                vec![available(DEFAULT_MEDIA_RECEIVER_APP_ID, "APP_UNAVAILABLE")]
            }
            _ => vec![],
        }
    });
    let session = open_session(stream, transport_config());

    assert!(!session.app_available(DEFAULT_MEDIA_RECEIVER_APP_ID).unwrap());
    let result = session.launch_app(DEFAULT_MEDIA_RECEIVER_APP_ID, json!({"type": "LOAD"}));
    assert!(matches!(result, Err(CastError::AppUnavailable(id)) if id == DEFAULT_MEDIA_RECEIVER_APP_ID));
    assert!(!device.received().iter().any(|m| m.kind() == Some("LAUNCH")));

    drop(session);
    device.join();
}

#[test]
fn test_availability_requires_exact_literal() {
    let (device, stream) = spawn_device(|namespace, payload| {
        match (namespace, payload.get("type").and_then(Value::as_str)) {
            (RECEIVER, Some("GET_STATUS")) => vec![receiver_status(json!([]))],
            (RECEIVER, Some("GET_APP_AVAILABILITY")) => {
                let app = payload["appId"][0].as_str().unwrap_or_default().to_string();
                let state = if app == "CC1AD845" { "APP_AVAILABLE" } else { "app_available" };
                vec![available(&app, state)]
            }
            _ => vec![],
        }
    });
    let session = open_session(stream, transport_config());

    assert!(session.app_available("CC1AD845").unwrap());
    assert!(!session.app_available("233637DE").unwrap());

    drop(session);
    let log = device.join();
    let query = log.iter().find(|m| m.kind() == Some("GET_APP_AVAILABILITY")).unwrap();
    assert_eq!(query.payload["appId"], json!(["CC1AD845"]));
}

#[test]
fn test_rejected_load_clears_active_app() {
    let polls = Arc::new(AtomicU32::new(0));
    let (device, stream) = spawn_device(launcher_script(
        Some(1),
        json!({"type": "LOAD_FAILED"}),
        polls,
    ));
    let session = open_session(stream, transport_config());

    let media = MediaRequest::new("http://192.168.1.10:8080/song.flac", "audio/flac");
    let result = DefaultMediaReceiver::new(&session).load(&media);

    assert!(matches!(result, Err(CastError::LoadRejected(kind)) if kind == "LOAD_FAILED"));
    assert!(session.active_app().is_none());

    drop(session);
    device.join();
}

#[test]
fn test_close_app() {
    let polls = Arc::new(AtomicU32::new(0));
    let (device, stream) = spawn_device(launcher_script(
        Some(1),
        json!({"type": "MEDIA_STATUS"}),
        polls,
    ));
    let session = open_session(stream, transport_config());

    assert!(matches!(session.close_app(), Err(CastError::NoActiveApp)));

    let media = MediaRequest::new("http://192.168.1.10:8080/song.flac", "audio/flac");
    DefaultMediaReceiver::new(&session).load(&media).unwrap();
    session.close_app().unwrap();
    assert!(session.active_app().is_none());
    assert!(matches!(session.close_app(), Err(CastError::NoActiveApp)));

    drop(session);
    let log = device.join();
    assert!(
        log.iter()
            .any(|m| m.namespace == CONNECTION && m.kind() == Some("CLOSE") && m.destination == "web-5")
    );
}

#[test]
fn test_out_of_order_replies_reach_their_callers() {
    let mut held: Option<Value> = None;
    let (device, stream) = spawn_device(move |namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        TEST_NS => match held.take() {
            None => {
                held = Some(payload.clone());
                vec![]
            }
            Some(first) => vec![
                json!({"tag": payload["tag"], "requestId": payload["requestId"]}),
                json!({"tag": first["tag"], "requestId": first["requestId"]}),
            ],
        },
        _ => vec![],
    });
    let session = open_session(stream, transport_config());
    let transport = session.transport();

    thread::scope(|scope| {
        let callers: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|tag| {
                scope.spawn(move || {
                    let reply = transport
                        .send_recv(TEST_NS, json!({"type": "ECHO", "tag": tag}), RECEIVER_ID)
                        .unwrap();
                    assert_eq!(reply["tag"], tag);
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }
    });
    assert_eq!(transport.pending_requests(), 0);

    drop(session);
    let log = device.join();
    let ids: Vec<u64> = log
        .iter()
        .filter(|m| m.namespace == TEST_NS)
        .filter_map(|m| m.payload["requestId"].as_u64())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_unanswered_request_times_out_alone() {
    let (device, stream) = spawn_device(|namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        TEST_NS if payload["type"] == "ECHO" => vec![json!({"type": "ECHOED"})],
        _ => vec![],
    });
    let session = open_session(stream, transport_config());
    let transport = session.transport();
    let timeout = Duration::from_millis(600);

    thread::scope(|scope| {
        let silent = scope.spawn(|| {
            transport.send_recv_timeout(TEST_NS, json!({"type": "SILENT"}), RECEIVER_ID, timeout)
        });

        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        let reply = transport
            .send_recv(TEST_NS, json!({"type": "ECHO"}), RECEIVER_ID)
            .unwrap();
        assert_eq!(reply["type"], "ECHOED");
        assert!(started.elapsed() < timeout);

        let result = silent.join().unwrap();
        assert!(matches!(result, Err(CastError::Timeout { timeout: t, .. }) if t == timeout));
    });
    assert_eq!(transport.pending_requests(), 0);

    drop(session);
    device.join();
}

#[test]
fn test_send_recv_requires_object_payload() {
    let (device, stream) = spawn_device(|namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        _ => vec![],
    });
    let session = open_session(stream, transport_config());

    let result = session.transport().send_recv(TEST_NS, json!("GET_STATUS"), RECEIVER_ID);
    assert!(matches!(result, Err(CastError::InvalidPayload)));

    drop(session);
    device.join();
}

#[test]
fn test_disconnect_sends_close_last() {
    let (device, stream) = spawn_device(|namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        _ => vec![],
    });
    let session = open_session(stream, transport_config());

    session.disconnect();
    assert!(!session.is_connected());
    assert!(matches!(session.set_volume(0.5), Err(CastError::NotConnected)));

    drop(session);
    let log = device.join();
    let last = log.last().unwrap();
    assert_eq!(last.namespace, CONNECTION);
    assert_eq!(last.kind(), Some("CLOSE"));
    assert_eq!(last.destination, RECEIVER_ID);
    assert_eq!(log.iter().filter(|m| m.kind() == Some("CLOSE")).count(), 1);
}

#[test]
fn test_heartbeat_and_pong() {
    let mut pinged = false;
    let (device, stream) = spawn_device(move |namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        HEARTBEAT if payload["type"] == "PING" && !pinged => {
            pinged = true;
            vec![json!({"type": "PING"})]
        }
        _ => vec![],
    });
    let config = TransportConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..transport_config()
    };
    let session = open_session(stream, config);

    thread::sleep(Duration::from_millis(400));
    assert!(session.is_connected());
    drop(session);

    let log = device.join();
    let pings = log
        .iter()
        .filter(|m| m.namespace == HEARTBEAT && m.kind() == Some("PING"))
        .count();
    assert!(pings >= 3, "only {} PING sent", pings);
    assert!(log.iter().any(|m| m.namespace == HEARTBEAT && m.kind() == Some("PONG")));
}

#[test]
fn test_volume_messages() {
    let (device, stream) = spawn_device(|namespace, payload| match namespace {
        RECEIVER if payload["type"] == "GET_STATUS" => vec![receiver_status(json!([]))],
        _ => vec![],
    });
    let session = open_session(stream, transport_config());

    session.set_volume(1.7).unwrap();
    session.set_muted(true).unwrap();
    thread::sleep(Duration::from_millis(100));

    drop(session);
    let log = device.join();
    let volume: Vec<&Received> = log.iter().filter(|m| m.kind() == Some("SET_VOLUME")).collect();
    assert_eq!(volume.len(), 2);
    assert_eq!(volume[0].payload["volume"]["level"], 1.0);
    assert_eq!(volume[1].payload["volume"]["muted"], true);
    assert!(volume.iter().all(|m| m.namespace == RECEIVER && m.payload["requestId"].is_u64()));
}
