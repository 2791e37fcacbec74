//! Transport Cast : écriture des trames, boucle de réception, corrélation
//! des réponses par `requestId` et heartbeat.
//!
//! Deux threads vivent aussi longtemps que la connexion : la boucle de
//! réception et le heartbeat. Tous deux s'arrêtent sur le même drapeau
//! `connected`.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::channel::{CastMessage, FrameDecoder, encode_frame};
use crate::namespaces::{self, RECEIVER_ID, SENDER_ID};
use crate::{CastError, CastStream};

/// Pause de la boucle de réception quand rien n'est arrivé, flux relâché
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Granularité de l'attente du heartbeat entre deux PING
const HEARTBEAT_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Attente maximale d'une réponse dans [`CastTransport::send_recv`]
    pub request_timeout: Duration,
    /// Période des PING
    pub heartbeat_interval: Duration,
    /// Timeout de lecture de la boucle de réception
    pub poll_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_millis(4500),
            poll_timeout: Duration::from_millis(50),
        }
    }
}

struct Shared {
    stream: Mutex<Box<dyn CastStream>>,
    pending: Mutex<HashMap<u64, Sender<Value>>>,
    connected: AtomicBool,
    next_request_id: AtomicU64,
}

impl Shared {
    fn write_message(&self, namespace: &str, payload: &Value, destination: &str) -> Result<(), CastError> {
        let message = CastMessage::json(SENDER_ID, destination, namespace, payload);
        let frame = encode_frame(&message)?;

        let mut stream = self.stream.lock();
        stream.write_all(&frame)?;
        stream.flush()?;
        trace!("📤 {} -> {}: {}", namespace, destination, payload);
        Ok(())
    }

    /// Route une réponse vers l'appelant qui attend son `requestId`.
    fn dispatch(&self, message: CastMessage) {
        let payload = match message.payload_json() {
            Ok(payload) => payload,
            Err(e) => {
                trace!("Dropping unparsable payload on {}: {}", message.namespace, e);
                return;
            }
        };

        if message.namespace == namespaces::HEARTBEAT
            && payload.get("type").and_then(Value::as_str) == Some("PING")
        {
            if let Err(e) = self.write_message(namespaces::HEARTBEAT, &json!({"type": "PONG"}), &message.source_id) {
                debug!("Failed to answer PING: {}", e);
            }
            return;
        }

        let Some(request_id) = payload.get("requestId").and_then(Value::as_u64) else {
            trace!("📥 Uncorrelated message on {}: {}", message.namespace, payload);
            return;
        };

        match self.pending.lock().remove(&request_id) {
            Some(waiter) => {
                trace!("📥 Reply to request {} on {}", request_id, message.namespace);
                let _ = waiter.send(payload);
            }
            None => trace!("📥 Reply to unknown request {} dropped", request_id),
        }
    }
}

/// Connexion Cast établie.
pub struct CastTransport {
    shared: Arc<Shared>,
    config: TransportConfig,
    receiver: Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl CastTransport {
    /// Prend possession du flux et démarre la boucle de réception.
    pub fn start(stream: Box<dyn CastStream>, config: TransportConfig) -> Result<Self, CastError> {
        stream.set_poll_timeout(config.poll_timeout)?;

        let shared = Arc::new(Shared {
            stream: Mutex::new(stream),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            next_request_id: AtomicU64::new(1),
        });

        let loop_shared = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name("cast-receiver".to_string())
            .spawn(move || receive_loop(&loop_shared))?;

        Ok(Self {
            shared,
            config,
            receiver: Mutex::new(Some(receiver)),
            heartbeat: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Identifiant de requête suivant, propre à cette connexion.
    pub fn next_request_id(&self) -> u64 {
        self.shared.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Nombre de requêtes en attente de réponse
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Envoie un message sans attendre de réponse.
    pub fn send(&self, namespace: &str, payload: &Value, destination: &str) -> Result<(), CastError> {
        if !self.is_connected() {
            return Err(CastError::NotConnected);
        }
        self.shared.write_message(namespace, payload, destination)
    }

    /// Envoie `payload` avec un nouveau `requestId` et attend la réponse
    /// portant le même identifiant.
    pub fn send_recv(&self, namespace: &str, payload: Value, destination: &str) -> Result<Value, CastError> {
        self.send_recv_timeout(namespace, payload, destination, self.config.request_timeout)
    }

    pub fn send_recv_timeout(
        &self,
        namespace: &str,
        mut payload: Value,
        destination: &str,
        timeout: Duration,
    ) -> Result<Value, CastError> {
        let object = payload.as_object_mut().ok_or(CastError::InvalidPayload)?;
        let request_id = self.next_request_id();
        object.insert("requestId".to_string(), json!(request_id));

        let (tx, rx) = bounded(1);
        self.shared.pending.lock().insert(request_id, tx);

        if let Err(e) = self.send(namespace, &payload, destination) {
            self.shared.pending.lock().remove(&request_id);
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending.lock().remove(&request_id);
                debug!("⏱️ Request {} on {} timed out", request_id, namespace);
                Err(CastError::Timeout { request_id, timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(CastError::NotConnected),
        }
    }

    /// Démarre le heartbeat : un PING toutes les `heartbeat_interval`.
    ///
    /// Les PONG ne sont pas attendus.
    pub fn start_heartbeat(&self) -> Result<(), CastError> {
        let mut slot = self.heartbeat.lock();
        if slot.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.config.heartbeat_interval;
        let handle = thread::Builder::new()
            .name("cast-heartbeat".to_string())
            .spawn(move || heartbeat_loop(&shared, interval))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Ferme la connexion : baisse le drapeau, attend la boucle de réception
    /// puis le heartbeat, et envoie enfin un CLOSE au mieux.
    pub fn disconnect(&self) {
        let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);

        if let Some(handle) = self.receiver.lock().take() {
            if handle.join().is_err() {
                warn!("Cast receive loop panicked");
            }
        }
        if let Some(handle) = self.heartbeat.lock().take() {
            if handle.join().is_err() {
                warn!("Cast heartbeat panicked");
            }
        }

        // Les appelants encore en attente voient la déconnexion
        self.shared.pending.lock().clear();

        if was_connected {
            if let Err(e) = self.shared.write_message(namespaces::CONNECTION, &json!({"type": "CLOSE"}), RECEIVER_ID) {
                debug!("CLOSE not delivered: {}", e);
            }
            info!("🔌 Cast connection closed");
        }
    }
}

impl Drop for CastTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_loop(shared: &Shared) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 4096];

    while shared.connected.load(Ordering::SeqCst) {
        let read = shared.stream.lock().read(&mut chunk);

        match read {
            Ok(0) => {
                warn!("Cast device closed the connection");
                shared.connected.store(false, Ordering::SeqCst);
                shared.pending.lock().clear();
                break;
            }
            Ok(n) => {
                decoder.extend(&chunk[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(message)) => shared.dispatch(message),
                        Ok(None) => break,
                        Err(e) => warn!("Dropping cast frame: {}", e),
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                thread::sleep(IDLE_SLEEP);
            }
            Err(e) if matches!(
                e.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::UnexpectedEof
            ) =>
            {
                warn!("Cast connection lost: {}", e);
                shared.connected.store(false, Ordering::SeqCst);
                shared.pending.lock().clear();
                break;
            }
            Err(e) => {
                warn!("Cast read error: {}", e);
                thread::sleep(IDLE_SLEEP);
            }
        }
    }

    debug!("Cast receive loop stopped");
}

fn heartbeat_loop(shared: &Shared, interval: Duration) {
    while shared.connected.load(Ordering::SeqCst) {
        if let Err(e) = shared.write_message(namespaces::HEARTBEAT, &json!({"type": "PING"}), RECEIVER_ID) {
            warn!("Heartbeat PING failed: {}", e);
        }

        let mut waited = Duration::ZERO;
        while waited < interval && shared.connected.load(Ordering::SeqCst) {
            let step = HEARTBEAT_STEP.min(interval - waited);
            thread::sleep(step);
            waited += step;
        }
    }

    debug!("Cast heartbeat stopped");
}
