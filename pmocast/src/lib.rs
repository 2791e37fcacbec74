//! # pmocast - protocole Cast (CastV2)
//!
//! Pilotage d'un récepteur Google Cast : canal TLS, messages protobuf
//! encadrés, corrélation requête/réponse par `requestId`, heartbeat et cycle
//! de vie des applications.
//!
//! ## Architecture
//!
//! - [`channel`] : codec `CastMessage` et découpage en trames (longueur BE sur 4 octets)
//! - [`tls`] : connexion TLS au récepteur (certificats auto-signés acceptés)
//! - [`CastTransport`] : boucle de réception, table des requêtes en attente, heartbeat
//! - [`CastSession`] : disponibilité, lancement et fermeture d'applications, volume
//! - [`DefaultMediaReceiver`] : lecture d'une URL par l'application média par défaut
//!
//! ## Example
//!
//! ```ignore
//! use pmocast::{CastSession, DefaultMediaReceiver, MediaRequest, TlsIdentity};
//!
//! let session = CastSession::connect(addr, &TlsIdentity::default(), Default::default(), Default::default())?;
//! let receiver = DefaultMediaReceiver::new(&session);
//! receiver.load(&MediaRequest::new("http://192.168.1.10:8080/video.mp4", "video/mp4"))?;
//! ```

pub mod channel;
mod errors;
mod media;
pub mod namespaces;
mod session;
mod stream;
pub mod tls;
mod transport;

pub use channel::{CastMessage, CastPayload, FrameDecoder, encode_frame};
pub use errors::CastError;
pub use media::{DEFAULT_MEDIA_RECEIVER_APP_ID, DefaultMediaReceiver, MediaRequest, StreamType};
pub use session::{CastAppDetails, CastSession, SessionConfig};
pub use stream::CastStream;
pub use tls::TlsIdentity;
pub use transport::{CastTransport, TransportConfig};

/// Port du canal Cast
pub const CAST_PORT: u16 = 8009;
