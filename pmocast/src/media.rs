//! Application média par défaut du récepteur.

use serde::Serialize;
use serde_json::Value;

use crate::{CastAppDetails, CastError, CastSession};

/// Identifiant du Default Media Receiver
pub const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    #[default]
    Buffered,
    Live,
    None,
}

/// Média à lire : une URL servie par le serveur HTTP local et son type MIME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub url: String,
    pub mime_type: String,
    pub stream_type: StreamType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadPayload<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    autoplay: bool,
    current_time: f64,
    media: MediaInformation<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaInformation<'a> {
    content_id: &'a str,
    content_type: &'a str,
    stream_type: StreamType,
}

impl MediaRequest {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            stream_type: StreamType::default(),
        }
    }

    pub fn with_stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = stream_type;
        self
    }

    /// Message `LOAD` (sans `requestId`, ajouté à l'envoi).
    pub fn load_payload(&self) -> Result<Value, CastError> {
        let payload = LoadPayload {
            kind: "LOAD",
            autoplay: true,
            current_time: 0.0,
            media: MediaInformation {
                content_id: &self.url,
                content_type: &self.mime_type,
                stream_type: self.stream_type,
            },
        };
        Ok(serde_json::to_value(payload)?)
    }
}

/// Lecture d'une URL via le Default Media Receiver.
pub struct DefaultMediaReceiver<'a> {
    session: &'a CastSession,
}

impl<'a> DefaultMediaReceiver<'a> {
    pub fn new(session: &'a CastSession) -> Self {
        Self { session }
    }

    pub fn load(&self, media: &MediaRequest) -> Result<CastAppDetails, CastError> {
        self.session
            .launch_app(DEFAULT_MEDIA_RECEIVER_APP_ID, media.load_payload()?)
    }
}
