//! Cycle de vie des applications Cast au-dessus de [`CastTransport`].

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::namespaces::{CONNECTION, MEDIA, RECEIVER, RECEIVER_ID};
use crate::transport::{CastTransport, TransportConfig};
use crate::{CastError, CastStream, TlsIdentity, tls};

/// Application lancée sur le récepteur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastAppDetails {
    pub app_id: String,
    pub session_id: String,
    /// Destination des messages adressés à l'application
    pub transport_id: String,
    pub namespaces: Vec<String>,
}

impl CastAppDetails {
    /// Extrait l'application `app_id` d'un `RECEIVER_STATUS`.
    pub fn from_status(status: &Value, app_id: &str) -> Option<Self> {
        let applications = status.pointer("/status/applications")?.as_array()?;
        let app = applications
            .iter()
            .find(|app| app.get("appId").and_then(Value::as_str) == Some(app_id))?;

        let text = |key: &str| app.get(key).and_then(Value::as_str).map(str::to_string);
        let namespaces = app
            .get("namespaces")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|ns| ns.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            app_id: app_id.to_string(),
            session_id: text("sessionId")?,
            transport_id: text("transportId")?,
            namespaces,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Nombre maximal de `GET_STATUS` après un `LAUNCH`
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Attente du `MEDIA_STATUS` qui suit un `LOAD`
    pub load_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 20,
            poll_interval: Duration::from_millis(500),
            load_timeout: Duration::from_millis(10000),
        }
    }
}

/// Session avec un récepteur Cast : une connexion, au plus une application active.
pub struct CastSession {
    transport: CastTransport,
    config: SessionConfig,
    active_app: Mutex<Option<CastAppDetails>>,
}

impl CastSession {
    /// Ouvre la connexion TLS puis effectue la poignée de main Cast.
    pub fn connect(
        addr: SocketAddr,
        identity: &TlsIdentity,
        transport_config: TransportConfig,
        config: SessionConfig,
    ) -> Result<Self, CastError> {
        info!("🔗 Connecting to cast device {}", addr);
        let stream = tls::connect(addr, identity, transport_config.request_timeout)?;
        Self::handshake(Box::new(stream), transport_config, config)
    }

    /// Démarre le transport sur un flux déjà ouvert, envoie `CONNECT` au
    /// récepteur, lit son état initial puis lance le heartbeat.
    pub fn handshake(
        stream: Box<dyn CastStream>,
        transport_config: TransportConfig,
        config: SessionConfig,
    ) -> Result<Self, CastError> {
        let transport = CastTransport::start(stream, transport_config)?;
        transport.send(CONNECTION, &json!({"type": "CONNECT"}), RECEIVER_ID)?;

        let session = Self {
            transport,
            config,
            active_app: Mutex::new(None),
        };

        match session.get_status() {
            Ok(status) => debug!("Initial receiver status: {}", status),
            Err(CastError::Timeout { .. }) => warn!("Cast device did not report its status"),
            Err(e) => return Err(e),
        }

        session.transport.start_heartbeat()?;
        info!("✅ Cast session established");
        Ok(session)
    }

    pub fn transport(&self) -> &CastTransport {
        &self.transport
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn get_status(&self) -> Result<Value, CastError> {
        self.transport
            .send_recv(RECEIVER, json!({"type": "GET_STATUS"}), RECEIVER_ID)
    }

    /// Vrai seulement si le récepteur répond `APP_AVAILABLE` pour `app_id`.
    pub fn app_available(&self, app_id: &str) -> Result<bool, CastError> {
        let reply = self.transport.send_recv(
            RECEIVER,
            json!({"type": "GET_APP_AVAILABILITY", "appId": [app_id]}),
            RECEIVER_ID,
        )?;

        if reply.get("responseType").and_then(Value::as_str) != Some("GET_APP_AVAILABILITY") {
            debug!("Unexpected availability reply: {}", reply);
            return Ok(false);
        }

        let availability = reply
            .get("availability")
            .and_then(|a| a.get(app_id))
            .and_then(Value::as_str);
        debug!("Availability of {}: {:?}", app_id, availability);
        Ok(availability == Some("APP_AVAILABLE"))
    }

    /// Lance `app_id` puis lui envoie `payload` sur le namespace média.
    ///
    /// Séquence : disponibilité, `LAUNCH`, scrutation de `GET_STATUS` jusqu'à
    /// l'apparition de l'application, `CONNECT` vers son `transportId`, puis
    /// `payload` (typiquement un `LOAD`) dont la réponse doit être un
    /// `MEDIA_STATUS`. Tout échec après le lancement efface l'application
    /// active.
    pub fn launch_app(&self, app_id: &str, payload: Value) -> Result<CastAppDetails, CastError> {
        if !payload.is_object() {
            return Err(CastError::InvalidPayload);
        }
        if !self.app_available(app_id)? {
            warn!("❌ Application {} is not available", app_id);
            return Err(CastError::AppUnavailable(app_id.to_string()));
        }

        let launch = json!({
            "type": "LAUNCH",
            "appId": app_id,
            "requestId": self.transport.next_request_id(),
        });
        self.transport.send(RECEIVER, &launch, RECEIVER_ID)?;
        info!("🚀 LAUNCH {} sent", app_id);

        let details = self.wait_for_app(app_id)?;
        self.transport
            .send(CONNECTION, &json!({"type": "CONNECT"}), &details.transport_id)?;
        *self.active_app.lock() = Some(details.clone());

        let reply = self.transport.send_recv_timeout(
            MEDIA,
            payload,
            &details.transport_id,
            self.config.load_timeout,
        );

        match reply {
            Ok(reply) if reply.get("type").and_then(Value::as_str) == Some("MEDIA_STATUS") => {
                info!("✅ Media loaded by {} (session {})", app_id, details.session_id);
                Ok(details)
            }
            Ok(reply) => {
                self.active_app.lock().take();
                let kind = reply
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("untyped reply")
                    .to_string();
                warn!("❌ Media load rejected: {}", reply);
                Err(CastError::LoadRejected(kind))
            }
            Err(e) => {
                self.active_app.lock().take();
                warn!("❌ Media load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Chaque tentative compte, y compris celles restées sans réponse.
    fn wait_for_app(&self, app_id: &str) -> Result<CastAppDetails, CastError> {
        let attempts = self.config.poll_attempts;

        for poll in 1..=attempts {
            match self.get_status() {
                Ok(status) => {
                    if let Some(details) = CastAppDetails::from_status(&status, app_id) {
                        debug!(
                            "Application {} up after {} poll(s), transport {}",
                            app_id, poll, details.transport_id
                        );
                        return Ok(details);
                    }
                }
                Err(CastError::Timeout { .. }) => debug!("Status poll {} unanswered", poll),
                Err(e) => return Err(e),
            }

            if poll < attempts {
                thread::sleep(self.config.poll_interval);
            }
        }

        warn!("❌ Application {} did not start after {} polls", app_id, attempts);
        Err(CastError::LaunchTimeout { polls: attempts })
    }

    pub fn active_app(&self) -> Option<CastAppDetails> {
        self.active_app.lock().clone()
    }

    /// Ferme le canal virtuel de l'application active.
    pub fn close_app(&self) -> Result<(), CastError> {
        let details = self.active_app.lock().take().ok_or(CastError::NoActiveApp)?;
        self.transport
            .send(CONNECTION, &json!({"type": "CLOSE"}), &details.transport_id)?;
        info!("Application {} closed", details.app_id);
        Ok(())
    }

    /// `level` est ramené dans `0.0..=1.0`. La réponse n'est pas attendue.
    pub fn set_volume(&self, level: f32) -> Result<(), CastError> {
        let level = level.clamp(0.0, 1.0);
        self.transport.send(
            RECEIVER,
            &json!({
                "type": "SET_VOLUME",
                "volume": {"level": level},
                "requestId": self.transport.next_request_id(),
            }),
            RECEIVER_ID,
        )
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), CastError> {
        self.transport.send(
            RECEIVER,
            &json!({
                "type": "SET_VOLUME",
                "volume": {"muted": muted},
                "requestId": self.transport.next_request_id(),
            }),
            RECEIVER_ID,
        )
    }

    pub fn disconnect(&self) {
        self.active_app.lock().take();
        self.transport.disconnect();
    }
}
